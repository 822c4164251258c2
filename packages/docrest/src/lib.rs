//! docrest: document datastore entities as hypermedia API resources.
//!
//! This crate bundles the two layers:
//! - [`datastore`]: keys, entities, schemas, queries and the `Datastore` trait
//! - [`resource`]: field mapping, relation fields and the resource adapter
//!
//! The most used types are re-exported at the top level.

pub use docrest_datastore as datastore;
pub use docrest_resource as resource;

pub use docrest_datastore::{
    Datastore, Entity, InMemoryDatastore, Key, PropertyDef, PropertyType, Query, Schema, Value,
};
pub use docrest_resource::{
    Api, ApiConfig, ApiField, Attribute, Bundle, DetailParams, DocumentResource, Error, Field,
    RelatedCollection, Request, Resource, ResourceMeta, ToManyKeyField, ToOneKeyField,
};
