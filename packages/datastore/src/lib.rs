//! docrest datastore layer
//!
//! The narrow contract the resource layer needs from a document datastore:
//! - `Key`: kind + id with an opaque URL-safe string form
//! - `Value` / `Entity`: typed properties of one stored document
//! - `Schema`: static property declarations for a kind
//! - `Query`: kind query with equality filters
//! - `Datastore`: get / put / delete / fetch by key or query
//!
//! `InMemoryDatastore` implements the contract for tests and embedding.
//!
//! # Example
//!
//! ```rust
//! use docrest_datastore::{Datastore, Entity, InMemoryDatastore, Query};
//!
//! let store = InMemoryDatastore::new();
//! store.put(&Entity::new("Note").with_property("published", true)).unwrap();
//!
//! let found = store.fetch(&Query::new("Note").filter("published", true), 10).unwrap();
//! assert_eq!(found.len(), 1);
//! ```

mod entity;
mod error;
mod in_memory;
mod key;
mod query;
mod schema;
mod traits;
mod value;

pub use entity::Entity;
pub use error::Error;
pub use in_memory::InMemoryDatastore;
pub use key::{Key, KeyId};
pub use query::{Filter, Query};
pub use schema::{PropertyDef, PropertyType, Schema};
pub use traits::Datastore;
pub use value::Value;
