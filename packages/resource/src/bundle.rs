//! Bundles: an entity travelling through hydrate/dehydrate with its request.

use std::sync::Arc;

use docrest_datastore::{Entity, Key};

use crate::{Error, Request};

/// Field name → JSON value, the shape of one API object.
pub type Data = serde_json::Map<String, serde_json::Value>;

/// An entity paired with inbound data and the request that carried it.
///
/// Bundles live for one API operation. `related_obj` and `related_name`
/// are set when the bundle was built for a nested object so hydration can
/// point the child back at its owner.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub obj: Entity,
    pub data: Data,
    pub request: Arc<Request>,
    pub related_obj: Option<Entity>,
    pub related_name: Option<String>,
}

impl Bundle {
    pub fn new(obj: Entity, request: Arc<Request>) -> Self {
        Self {
            obj,
            data: Data::new(),
            request,
            related_obj: None,
            related_name: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Data) -> Self {
        self.data = data;
        self
    }

    /// Convert a JSON request body into bundle data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] unless `body` is a JSON object.
    pub fn data_from_json(body: serde_json::Value) -> Result<Data, Error> {
        match body {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(Error::bad_request(format!(
                "expected a JSON object, got {}",
                other
            ))),
        }
    }
}

/// A related bundle whose entity was replaced by its key.
///
/// Only the reference is stored on the owning entity, never a copy of the
/// related document.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceBundle {
    pub key: Key,
    pub data: Data,
    pub request: Arc<Request>,
}

impl ReferenceBundle {
    /// Drop the bundle's entity, keeping only its key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ApiField`] if the entity was never saved.
    pub fn from_bundle(bundle: Bundle) -> Result<Self, Error> {
        let key = bundle.obj.key().cloned().ok_or_else(|| {
            Error::api_field(format!(
                "The related '{}' object has no key and can not be referenced.",
                bundle.obj.kind()
            ))
        })?;
        Ok(Self {
            key,
            data: bundle.data,
            request: bundle.request,
        })
    }
}

/// Either a bundle or a bare entity, for operations that accept both.
#[derive(Debug, Clone, Copy)]
pub enum BundleOrEntity<'a> {
    Bundle(&'a Bundle),
    Entity(&'a Entity),
}

impl<'a> BundleOrEntity<'a> {
    pub fn entity(&self) -> &'a Entity {
        match *self {
            BundleOrEntity::Bundle(bundle) => &bundle.obj,
            BundleOrEntity::Entity(entity) => entity,
        }
    }
}

impl<'a> From<&'a Bundle> for BundleOrEntity<'a> {
    fn from(bundle: &'a Bundle) -> Self {
        BundleOrEntity::Bundle(bundle)
    }
}

impl<'a> From<&'a Entity> for BundleOrEntity<'a> {
    fn from(entity: &'a Entity) -> Self {
        BundleOrEntity::Entity(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn data_from_json_requires_object() {
        let data = Bundle::data_from_json(json!({"title": "x"})).unwrap();
        assert_eq!(data["title"], json!("x"));

        assert!(matches!(
            Bundle::data_from_json(json!(["x"])),
            Err(Error::BadRequest { .. })
        ));
    }

    #[test]
    fn reference_bundle_needs_key() {
        let request = Arc::new(Request::default());
        let unsaved = Bundle::new(Entity::new("Note"), request.clone());
        assert!(ReferenceBundle::from_bundle(unsaved).is_err());

        let saved = Bundle::new(Entity::with_key(Key::with_id("Note", 4)), request);
        let reference = ReferenceBundle::from_bundle(saved).unwrap();
        assert_eq!(reference.key, Key::with_id("Note", 4));
    }

    #[test]
    fn bundle_or_entity_exposes_entity() {
        let entity = Entity::with_key(Key::with_id("Note", 1));
        let bundle = Bundle::new(entity.clone(), Arc::new(Request::default()));

        assert_eq!(BundleOrEntity::from(&bundle).entity(), &entity);
        assert_eq!(BundleOrEntity::from(&entity).entity(), &entity);
    }
}
