//! Key-reference relation fields.
//!
//! Relations are stored as datastore keys on the owning entity. In the API
//! they appear either as the related resource's URI or, for `full` fields,
//! as the nested related object.

use std::sync::Arc;

use docrest_datastore::{Datastore, Entity, Error as DatastoreError, Key, Query, Value};
use serde_json::Value as JsonValue;

use crate::fields::{option_builders, Attribute, FieldDefault, FieldOptions, FromProperty};
use crate::{Api, Bundle, DocumentResource, Error, ReferenceBundle, Request, Resource};

/// Upper bound on entities fetched for one to-many field.
pub const MAX_RELATED_FETCH: usize = 1000;

/// What a to-many attribute resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum RelatedCollection {
    /// Entities referenced by key, in order.
    Keys(Vec<Key>),
    /// Entities matching a query, such as a reverse relation.
    Query(Query),
}

impl RelatedCollection {
    pub fn is_empty(&self) -> bool {
        match self {
            RelatedCollection::Keys(keys) => keys.is_empty(),
            RelatedCollection::Query(_) => false,
        }
    }

    /// Fetch at most `limit` related entities. Keys with no stored entity
    /// are skipped.
    pub fn fetch(&self, datastore: &dyn Datastore, limit: usize) -> Result<Vec<Entity>, DatastoreError> {
        match self {
            RelatedCollection::Keys(keys) => {
                let keys = &keys[..keys.len().min(limit)];
                Ok(datastore.get_multi(keys)?.into_iter().flatten().collect())
            }
            RelatedCollection::Query(query) => datastore.fetch(query, limit),
        }
    }
}

impl FromProperty for RelatedCollection {
    fn from_property(name: &str, value: &Value) -> Result<Option<Self>, Error> {
        match value {
            Value::Null => Ok(None),
            Value::Key(key) => Ok(Some(RelatedCollection::Keys(vec![key.clone()]))),
            Value::List(items) => items
                .iter()
                .map(|item| match item {
                    Value::Key(key) => Ok(key.clone()),
                    other => Err(Error::api_field(format!(
                        "The attribute '{}' holds a {} item, not a key.",
                        name,
                        other.type_name()
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(|keys| Some(RelatedCollection::Keys(keys))),
            other => Err(Error::api_field(format!(
                "The attribute '{}' holds a {} value, not a list of keys.",
                name,
                other.type_name()
            ))),
        }
    }
}

/// A relation to a single entity, stored as its key.
#[derive(Debug, Clone)]
pub struct ToOneKeyField {
    name: String,
    to: String,
    attribute: Attribute<Key>,
    related_name: Option<String>,
    options: FieldOptions,
}

impl ToOneKeyField {
    /// A field named `name` pointing at the resource registered as `to`,
    /// stored in the property of the same name.
    pub fn new(name: impl Into<String>, to: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            attribute: Attribute::Named(name.clone()),
            name,
            to: to.into(),
            related_name: None,
            options: FieldOptions::default(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, attribute: Attribute<Key>) -> Self {
        self.attribute = attribute;
        self
    }

    /// Property on nested related objects that points back at the owner.
    #[must_use]
    pub fn with_related_name(mut self, related_name: impl Into<String>) -> Self {
        self.related_name = Some(related_name.into());
        self
    }

    option_builders!();

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the target resource.
    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn attribute(&self) -> &Attribute<Key> {
        &self.attribute
    }

    pub fn attribute_name(&self) -> Option<&str> {
        self.attribute.name()
    }

    pub fn related_name(&self) -> Option<&str> {
        self.related_name.as_deref()
    }

    /// The related object as a URI or nested object, or null.
    pub fn dehydrate(&self, bundle: &Bundle, api: &Api) -> Result<JsonValue, Error> {
        let entity = match self.attribute.resolve(bundle)? {
            Some(key) => api.datastore().get(&key)?,
            None => None,
        };

        match entity {
            Some(entity) => {
                let target = api.resource(&self.to)?;
                dehydrate_related(&target, Bundle::new(entity, Arc::clone(&bundle.request)), self.options.full)
            }
            None if self.options.null => Ok(JsonValue::Null),
            None => Err(Error::api_field(format!(
                "The model '{}' has an empty attribute '{}' and doesn't allow a null value.",
                bundle.obj.kind(),
                self.attribute
            ))),
        }
    }

    /// Resolve inbound data to the key of the related entity.
    ///
    /// `Ok(None)` means there is nothing to store: the field is readonly,
    /// the data is null, or the field is blank and absent.
    pub fn hydrate(&self, bundle: &Bundle, api: &Api) -> Result<Option<ReferenceBundle>, Error> {
        if self.options.readonly {
            return Ok(None);
        }

        match bundle.data.get(&self.name) {
            Some(JsonValue::Null) => Ok(None),
            Some(value) => self.build(value, bundle, api).map(Some),
            None => self.hydrate_missing(bundle, api),
        }
    }

    fn hydrate_missing(&self, bundle: &Bundle, api: &Api) -> Result<Option<ReferenceBundle>, Error> {
        if let (Some(owner), Some(related_name)) = (&bundle.related_obj, &bundle.related_name) {
            let points_back = Some(related_name.as_str()) == self.attribute_name()
                || *related_name == self.name;
            if points_back {
                return Ok(owner.key().map(|key| self.reference(key.clone(), bundle)));
            }
        }
        if self.options.blank {
            return Ok(None);
        }
        if let Some(existing) = self.attribute.resolve(bundle)? {
            return Ok(Some(self.reference(existing, bundle)));
        }
        if let Some(FieldDefault::Value(default)) = &self.options.default {
            if !default.is_null() {
                return self.build(default, bundle, api).map(Some);
            }
        }
        if self.options.null {
            return Ok(None);
        }
        Err(Error::api_field(format!(
            "The '{}' field has no data and doesn't allow a default or null value.",
            self.name
        )))
    }

    fn build(&self, value: &JsonValue, bundle: &Bundle, api: &Api) -> Result<ReferenceBundle, Error> {
        let target = api.resource(&self.to)?;
        let owner = self
            .related_name
            .as_deref()
            .map(|related_name| (&bundle.obj, related_name));
        let related = build_related_resource(value, &target, &bundle.request, owner, &self.name, api)?;
        ReferenceBundle::from_bundle(related)
    }

    fn reference(&self, key: Key, bundle: &Bundle) -> ReferenceBundle {
        ReferenceBundle {
            key,
            data: Default::default(),
            request: Arc::clone(&bundle.request),
        }
    }
}

/// A relation to many entities, stored as a list of keys or computed as a
/// query.
#[derive(Debug, Clone)]
pub struct ToManyKeyField {
    name: String,
    to: String,
    attribute: Attribute<RelatedCollection>,
    related_name: Option<String>,
    options: FieldOptions,
}

impl ToManyKeyField {
    pub fn new(name: impl Into<String>, to: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            attribute: Attribute::Named(name.clone()),
            name,
            to: to.into(),
            related_name: None,
            options: FieldOptions::default(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, attribute: Attribute<RelatedCollection>) -> Self {
        self.attribute = attribute;
        self
    }

    #[must_use]
    pub fn with_related_name(mut self, related_name: impl Into<String>) -> Self {
        self.related_name = Some(related_name.into());
        self
    }

    option_builders!();

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn attribute(&self) -> &Attribute<RelatedCollection> {
        &self.attribute
    }

    pub fn attribute_name(&self) -> Option<&str> {
        self.attribute.name()
    }

    pub fn related_name(&self) -> Option<&str> {
        self.related_name.as_deref()
    }

    /// The related objects, at most [`MAX_RELATED_FETCH`] of them, in
    /// fetch order.
    pub fn dehydrate(&self, bundle: &Bundle, api: &Api) -> Result<JsonValue, Error> {
        if !bundle.obj.has_key() {
            if self.options.null {
                return Ok(JsonValue::Array(Vec::new()));
            }
            return Err(Error::api_field(format!(
                "The model '{}' does not have a primary key and can not be used in a ToMany context.",
                bundle.obj.kind()
            )));
        }

        let collection = match self.attribute.resolve(bundle)? {
            Some(collection) if !collection.is_empty() => collection,
            _ if self.options.null => return Ok(JsonValue::Array(Vec::new())),
            _ => {
                return Err(Error::api_field(format!(
                    "The model '{}' has an empty attribute '{}' and doesn't allow a null value.",
                    bundle.obj.kind(),
                    self.attribute
                )))
            }
        };

        let target = api.resource(&self.to)?;
        let entities = collection.fetch(api.datastore(), MAX_RELATED_FETCH)?;
        log::debug!("Dehydrating {} related {} objects for {}", entities.len(), self.to, self.name);

        entities
            .into_iter()
            .map(|entity| {
                dehydrate_related(&target, Bundle::new(entity, Arc::clone(&bundle.request)), self.options.full)
            })
            .collect::<Result<Vec<_>, _>>()
            .map(JsonValue::Array)
    }

    /// To-many values are not written by plain hydration; see
    /// [`ToManyKeyField::hydrate_many`].
    pub fn hydrate(&self, _bundle: &Bundle) {}

    /// Resolve every inbound item to the key of its related entity, in
    /// input order. Null items are skipped.
    pub fn hydrate_many(&self, bundle: &Bundle, api: &Api) -> Result<Option<Vec<ReferenceBundle>>, Error> {
        if self.options.readonly {
            return Ok(None);
        }

        let items = match bundle.data.get(&self.name) {
            None | Some(JsonValue::Null) => {
                if self.options.blank || self.options.null {
                    return Ok(Some(Vec::new()));
                }
                return Err(Error::api_field(format!(
                    "The '{}' field has no data and doesn't allow a null value.",
                    self.name
                )));
            }
            Some(JsonValue::Array(items)) => items,
            Some(other) => {
                return Err(Error::api_field(format!(
                    "The '{}' field expects a list of related resources, got {}.",
                    self.name, other
                )))
            }
        };

        let target = api.resource(&self.to)?;
        let owner = self
            .related_name
            .as_deref()
            .map(|related_name| (&bundle.obj, related_name));

        items
            .iter()
            .filter(|item| !item.is_null())
            .map(|item| {
                build_related_resource(item, &target, &bundle.request, owner, &self.name, api)
                    .and_then(ReferenceBundle::from_bundle)
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}

/// Turn one inbound related value into a bundle of the target resource.
///
/// A string is a resource URI of `target`. An object carrying
/// `resource_uri` updates the referenced entity in memory. Any other object
/// creates a new entity, which is saved so that it has a key to reference.
/// `owner` is the owning entity and the property on the related entity
/// that points back at it.
pub(crate) fn build_related_resource(
    value: &JsonValue,
    target: &DocumentResource,
    request: &Arc<Request>,
    owner: Option<(&Entity, &str)>,
    field_name: &str,
    api: &Api,
) -> Result<Bundle, Error> {
    match value {
        JsonValue::String(uri) => {
            let entity = fetch_by_uri(uri, target, api)?;
            Ok(Bundle::new(entity, Arc::clone(request)))
        }
        JsonValue::Object(data) => {
            let existing = match data.get("resource_uri") {
                Some(JsonValue::String(uri)) => Some(fetch_by_uri(uri, target, api)?),
                _ => None,
            };
            let is_new = existing.is_none();
            let entity = existing.unwrap_or_else(|| Entity::new(target.kind()));

            let mut bundle = Bundle::new(entity, Arc::clone(request)).with_data(data.clone());
            if let Some((owner, related_name)) = owner {
                bundle.related_obj = Some(owner.clone());
                bundle.related_name = Some(related_name.to_string());
            }

            let mut bundle = target.full_hydrate(bundle)?;
            if !is_new {
                return Ok(bundle);
            }

            if let Some((owner, related_name)) = owner {
                if let Some(key) = owner.key() {
                    bundle.obj.set(related_name, key.clone());
                }
            }
            if !bundle.obj.has_key() {
                log::debug!("Saving nested {} for {}", target.kind(), field_name);
                target.save(&mut bundle)?;
            }
            Ok(bundle)
        }
        other => Err(Error::api_field(format!(
            "The '{}' field was given data that was not a URI or an object: {}.",
            field_name, other
        ))),
    }
}

fn fetch_by_uri(uri: &str, target: &DocumentResource, api: &Api) -> Result<Entity, Error> {
    let not_a_link =
        || Error::not_found(format!("The URL provided '{}' was not a link to a valid resource.", uri));

    let (resource, params) = api.resolve_uri(uri).map_err(|_| not_a_link())?;
    if resource.name() != target.name() {
        return Err(not_a_link());
    }
    target.get_object(&params)
}

/// Serialize a related bundle: the nested object when `full`, otherwise
/// its resource URI.
pub(crate) fn dehydrate_related(
    target: &DocumentResource,
    bundle: Bundle,
    full: bool,
) -> Result<JsonValue, Error> {
    if full {
        target.full_dehydrate(&bundle).map(JsonValue::Object)
    } else {
        Ok(JsonValue::String(target.resource_uri(&bundle.obj)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrest_datastore::InMemoryDatastore;

    #[test]
    fn key_list_resolves_to_collection() {
        let keys = vec![Key::with_id("Tag", 1), Key::with_id("Tag", 2)];
        let value = Value::from(keys.clone());
        assert_eq!(
            RelatedCollection::from_property("tags", &value).unwrap(),
            Some(RelatedCollection::Keys(keys))
        );
        assert_eq!(RelatedCollection::from_property("tags", &Value::Null).unwrap(), None);
        assert!(RelatedCollection::from_property("tags", &Value::from(vec![1i64])).is_err());
    }

    #[test]
    fn fetch_skips_missing_and_caps() {
        let store = InMemoryDatastore::new();
        let mut keys = Vec::new();
        for i in 0..5 {
            keys.push(store.put(&Entity::new("Tag").with_property("n", i)).unwrap());
        }
        keys.insert(1, Key::with_id("Tag", 999));

        let all = RelatedCollection::Keys(keys.clone()).fetch(&store, 100).unwrap();
        assert_eq!(all.len(), 5);

        let capped = RelatedCollection::Keys(keys).fetch(&store, 3).unwrap();
        assert_eq!(capped.len(), 2);
    }

    #[test]
    fn query_collection_is_never_empty() {
        let collection = RelatedCollection::Query(Query::new("Tag"));
        assert!(!collection.is_empty());
        assert!(RelatedCollection::Keys(Vec::new()).is_empty());
    }
}
