//! docrest resource layer
//!
//! Exposes datastore entities as API resources:
//! - `mapper`: derives API fields from an entity [`Schema`](docrest_datastore::Schema)
//! - `fields`: scalar fields converting between JSON and property values
//! - `related`: to-one and to-many fields stored as datastore keys
//! - `resource`: list, get, create, update and delete against the datastore
//! - `api`: the registry that names resources and resolves their URIs
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use docrest_datastore::{InMemoryDatastore, PropertyDef, Schema};
//! use docrest_resource::{Api, ApiConfig, Bundle, Request, Resource, ResourceMeta};
//! use serde_json::json;
//!
//! let api = Api::new(ApiConfig::default(), Arc::new(InMemoryDatastore::new()));
//! let notes = api
//!     .register(
//!         ResourceMeta::new("notes").filtering(["published"]),
//!         Schema::new("Note")
//!             .property(PropertyDef::string("title").required())
//!             .property(PropertyDef::boolean("published").default(false)),
//!         Vec::new(),
//!     )
//!     .unwrap();
//!
//! let request = Arc::new(Request::new("/api/v1/notes/"));
//! let data = Bundle::data_from_json(json!({"title": "Hello", "published": true})).unwrap();
//! let created = notes
//!     .create_object(notes.build_bundle(None, data, request.clone()), None)
//!     .unwrap();
//!
//! let output = notes.full_dehydrate(&created).unwrap();
//! assert_eq!(output["title"], json!("Hello"));
//! assert_eq!(output["resource_uri"], json!(notes.resource_uri(&created.obj)));
//! ```

mod api;
mod bundle;
mod error;
mod fields;
mod json;
mod mapper;
mod related;
mod request;
mod resource;

pub use api::{Api, ApiConfig};
pub use bundle::{Bundle, BundleOrEntity, Data, ReferenceBundle};
pub use error::Error;
pub use fields::{
    ApiField, Attribute, AutoTimestamp, Field, FieldDefault, FieldOptions, FieldType, FromProperty,
    Resolver,
};
pub use json::{json_to_property, property_to_json};
pub use mapper::{api_field_type, derive_fields};
pub use related::{RelatedCollection, ToManyKeyField, ToOneKeyField, MAX_RELATED_FETCH};
pub use request::Request;
pub use resource::{DetailParams, DocumentResource, Resource, ResourceMeta};
