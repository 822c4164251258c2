//! Datastore-backed API resources.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Weak};

use chrono::Utc;
use docrest_datastore::{Datastore, Entity, Key, PropertyType, Query, Schema, Value};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::fields::{parse_date, parse_datetime, parse_time, Field};
use crate::mapper::derive_fields;
use crate::{Api, Bundle, BundleOrEntity, Data, Error, Request};

fn default_max_limit() -> usize {
    1000
}

fn default_include_resource_uri() -> bool {
    true
}

/// Per-resource configuration.
///
/// ```rust
/// use docrest_resource::ResourceMeta;
///
/// let meta = ResourceMeta::from_json(r#"{"resource_name": "notes", "filtering": ["published"]}"#).unwrap();
/// assert_eq!(meta.max_limit, 1000);
/// assert!(meta.filtering.contains("published"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMeta {
    /// Registry name and URI segment of the resource.
    pub resource_name: String,

    /// Properties to derive fields for. Empty means all of them.
    #[serde(default)]
    pub fields: Vec<String>,

    /// Properties never derived.
    #[serde(default)]
    pub excludes: Vec<String>,

    /// Maximum entities fetched for a list.
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,

    /// Properties that may be used as query-string filters.
    #[serde(default)]
    pub filtering: BTreeSet<String>,

    #[serde(default = "default_include_resource_uri")]
    pub include_resource_uri: bool,
}

impl ResourceMeta {
    pub fn new(resource_name: impl Into<String>) -> Self {
        Self {
            resource_name: resource_name.into(),
            fields: Vec::new(),
            excludes: Vec::new(),
            max_limit: default_max_limit(),
            filtering: BTreeSet::new(),
            include_resource_uri: default_include_resource_uri(),
        }
    }

    #[must_use]
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn excludes<I, S>(mut self, excludes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes = excludes.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn max_limit(mut self, max_limit: usize) -> Self {
        self.max_limit = max_limit;
        self
    }

    #[must_use]
    pub fn filtering<I, S>(mut self, filtering: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filtering = filtering.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn include_resource_uri(mut self, include: bool) -> Self {
        self.include_resource_uri = include;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Identifies one object in a detail request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailParams {
    /// URL-safe key of the entity.
    pub pk: String,
}

impl DetailParams {
    pub fn new(pk: impl Into<String>) -> Self {
        Self { pk: pk.into() }
    }
}

/// The operations the REST framework calls on a resource.
///
/// # Object Safety
///
/// This trait is object-safe: you can use `Arc<dyn Resource>`.
pub trait Resource: Send + Sync {
    /// The field mapping computed at registration.
    fn get_fields(&self) -> &BTreeMap<String, Field>;

    /// Detail parameters addressing a saved entity.
    fn detail_key_params(&self, target: BundleOrEntity<'_>) -> Result<DetailParams, Error>;

    /// The unfiltered list query.
    fn list_query(&self, request: &Request) -> Query;

    /// Add an equality filter per allowed query-string parameter.
    ///
    /// Parameters that do not name a schema property, or that are not
    /// allowlisted, are ignored.
    fn apply_filters(&self, query: Query, filters: &BTreeMap<String, String>) -> Query;

    /// Entities matching the request's filters, at most `max_limit`.
    fn list_objects(&self, bundle: &Bundle) -> Result<Vec<Entity>, Error>;

    /// # Errors
    ///
    /// [`Error::NotFound`] for any failure: an unparsable key, a key of
    /// another kind, a datastore fault or a missing entity.
    fn get_object(&self, params: &DetailParams) -> Result<Entity, Error>;

    /// Hydrate the bundle into an entity and save it, under the key in
    /// `params` when one is given.
    fn create_object(&self, bundle: Bundle, params: Option<&DetailParams>) -> Result<Bundle, Error>;

    /// Replace the entity under `params` with the hydrated bundle.
    fn update_object(&self, bundle: Bundle, params: &DetailParams) -> Result<Bundle, Error> {
        self.create_object(bundle, Some(params))
    }

    /// Delete every entity [`Resource::list_objects`] returns.
    ///
    /// Deletes are issued in order and stop at the first failure; entities
    /// deleted before it stay deleted.
    fn delete_object_list(&self, bundle: &Bundle) -> Result<(), Error>;

    fn delete_object(&self, params: &DetailParams) -> Result<(), Error>;

    /// The datastore has no transactions to roll back.
    fn rollback(&self, _bundles: &[Bundle]) {}
}

impl<T: Resource + ?Sized> Resource for Arc<T> {
    fn get_fields(&self) -> &BTreeMap<String, Field> {
        (**self).get_fields()
    }

    fn detail_key_params(&self, target: BundleOrEntity<'_>) -> Result<DetailParams, Error> {
        (**self).detail_key_params(target)
    }

    fn list_query(&self, request: &Request) -> Query {
        (**self).list_query(request)
    }

    fn apply_filters(&self, query: Query, filters: &BTreeMap<String, String>) -> Query {
        (**self).apply_filters(query, filters)
    }

    fn list_objects(&self, bundle: &Bundle) -> Result<Vec<Entity>, Error> {
        (**self).list_objects(bundle)
    }

    fn get_object(&self, params: &DetailParams) -> Result<Entity, Error> {
        (**self).get_object(params)
    }

    fn create_object(&self, bundle: Bundle, params: Option<&DetailParams>) -> Result<Bundle, Error> {
        (**self).create_object(bundle, params)
    }

    fn update_object(&self, bundle: Bundle, params: &DetailParams) -> Result<Bundle, Error> {
        (**self).update_object(bundle, params)
    }

    fn delete_object_list(&self, bundle: &Bundle) -> Result<(), Error> {
        (**self).delete_object_list(bundle)
    }

    fn delete_object(&self, params: &DetailParams) -> Result<(), Error> {
        (**self).delete_object(params)
    }

    fn rollback(&self, bundles: &[Bundle]) {
        (**self).rollback(bundles)
    }
}

/// A resource exposing one entity kind.
///
/// Created by [`Api::register`], which derives the fields from the schema
/// and fixes the resource's URI.
pub struct DocumentResource {
    meta: ResourceMeta,
    schema: Schema,
    fields: BTreeMap<String, Field>,
    datastore: Arc<dyn Datastore>,
    api: Weak<Api>,
    base_uri: String,
}

impl fmt::Debug for DocumentResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentResource")
            .field("meta", &self.meta)
            .field("kind", &self.schema.kind())
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("base_uri", &self.base_uri)
            .finish()
    }
}

impl DocumentResource {
    pub(crate) fn new(
        meta: ResourceMeta,
        schema: Schema,
        declared: Vec<Field>,
        datastore: Arc<dyn Datastore>,
        api: Weak<Api>,
        base_uri: String,
    ) -> Result<Self, Error> {
        let mut fields = BTreeMap::new();
        for field in declared {
            let name = field.name().to_string();
            if fields.insert(name.clone(), field).is_some() {
                return Err(Error::configuration(format!(
                    "The field '{}' is declared twice on '{}'.",
                    name, meta.resource_name
                )));
            }
        }

        let declared: BTreeSet<String> = fields.keys().cloned().collect();
        fields.extend(derive_fields(&schema, &declared, &meta.fields, &meta.excludes));

        Ok(Self {
            meta,
            schema,
            fields,
            datastore,
            api,
            base_uri,
        })
    }

    pub fn name(&self) -> &str {
        &self.meta.resource_name
    }

    /// Entity kind served by this resource.
    pub fn kind(&self) -> &str {
        self.schema.kind()
    }

    pub fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// URI of the resource's list endpoint.
    pub fn list_uri(&self) -> &str {
        &self.base_uri
    }

    /// URI of a saved entity; empty for an unsaved one.
    pub fn resource_uri(&self, entity: &Entity) -> String {
        match entity.key() {
            Some(key) => format!("{}{}/", self.base_uri, key.urlsafe()),
            None => String::new(),
        }
    }

    /// A bundle around `obj`, or around a new entity of this kind.
    pub fn build_bundle(&self, obj: Option<Entity>, data: Data, request: Arc<Request>) -> Bundle {
        let obj = obj.unwrap_or_else(|| Entity::new(self.kind()));
        Bundle::new(obj, request).with_data(data)
    }

    fn api(&self) -> Result<Arc<Api>, Error> {
        self.api.upgrade().ok_or_else(|| {
            Error::configuration(format!("The API serving '{}' has been dropped.", self.name()))
        })
    }

    fn not_found(&self, pk: &str, reason: impl fmt::Display) -> Error {
        Error::not_found(format!(
            "Couldn't find an instance of {} with pk '{}': {}",
            self.kind(),
            pk,
            reason
        ))
    }

    /// Write inbound data onto the bundle's entity through every writable
    /// field. To-many fields are handled at save time.
    pub fn full_hydrate(&self, mut bundle: Bundle) -> Result<Bundle, Error> {
        let api = self.api()?;

        for field in self.fields.values() {
            if field.options().readonly {
                continue;
            }

            match field {
                Field::Api(field) => {
                    let Some(attribute) = field.attribute_name() else {
                        continue;
                    };
                    if let Some(value) = field.hydrate(&bundle)? {
                        bundle.obj.set(attribute, value);
                    }
                }
                Field::ToOne(field) => {
                    let Some(attribute) = field.attribute_name() else {
                        continue;
                    };
                    match field.hydrate(&bundle, &api)? {
                        Some(reference) => bundle.obj.set(attribute, reference.key),
                        None if field.options().blank => {}
                        None if field.options().null => bundle.obj.set(attribute, Value::Null),
                        None => {}
                    }
                }
                Field::ToMany(field) => field.hydrate(&bundle),
            }
        }

        Ok(bundle)
    }

    /// Serialize the bundle's entity through every field.
    pub fn full_dehydrate(&self, bundle: &Bundle) -> Result<Data, Error> {
        let api = self.api()?;
        let mut data = Data::new();

        for (name, field) in &self.fields {
            let value = match field {
                Field::Api(field) => field.dehydrate(bundle)?,
                Field::ToOne(field) => field.dehydrate(bundle, &api)?,
                Field::ToMany(field) => field.dehydrate(bundle, &api)?,
            };
            data.insert(name.clone(), value);
        }

        if self.meta.include_resource_uri {
            data.insert(
                "resource_uri".to_string(),
                JsonValue::String(self.resource_uri(&bundle.obj)),
            );
        }

        Ok(data)
    }

    /// Resolve save-time defaults, validate and put the bundle's entity.
    pub fn save(&self, bundle: &mut Bundle) -> Result<Key, Error> {
        self.schema.prepare_for_put(&mut bundle.obj, Utc::now())?;
        let key = self.datastore.put(&bundle.obj)?;
        bundle.obj.set_key(key.clone())?;
        log::debug!("Saved {} {}", self.kind(), key);
        Ok(key)
    }

    /// Resolve every to-many field present in the data. Named attributes
    /// store the resulting keys; computed ones only create the nested
    /// objects.
    fn hydrate_to_many(&self, bundle: &mut Bundle, api: &Api) -> Result<(), Error> {
        for field in self.fields.values() {
            let Field::ToMany(field) = field else {
                continue;
            };
            let present = bundle.data.contains_key(field.name());
            if !present && (field.options().blank || field.attribute_name().is_none()) {
                continue;
            }

            // Nested objects point back at the owner, which needs a key first.
            if field.related_name().is_some() && present && !bundle.obj.has_key() {
                self.save(bundle)?;
            }

            let references = field.hydrate_many(bundle, api)?;
            if let (Some(attribute), Some(references)) = (field.attribute_name(), references) {
                let keys = references.into_iter().map(|r| Value::Key(r.key)).collect();
                bundle.obj.set(attribute, Value::List(keys));
            }
        }
        Ok(())
    }
}

impl Resource for DocumentResource {
    fn get_fields(&self) -> &BTreeMap<String, Field> {
        &self.fields
    }

    fn detail_key_params(&self, target: BundleOrEntity<'_>) -> Result<DetailParams, Error> {
        let entity = target.entity();
        entity
            .key()
            .map(|key| DetailParams::new(key.urlsafe()))
            .ok_or_else(|| {
                Error::bad_request(format!(
                    "The {} object has not been saved and has no key.",
                    entity.kind()
                ))
            })
    }

    fn list_query(&self, _request: &Request) -> Query {
        Query::new(self.kind())
    }

    fn apply_filters(&self, mut query: Query, filters: &BTreeMap<String, String>) -> Query {
        for (name, raw) in filters {
            let Some(def) = self.schema.get(name) else {
                log::trace!("Ignoring filter {}: not a property of {}", name, self.kind());
                continue;
            };
            if !self.meta.filtering.contains(name) {
                log::trace!("Ignoring filter {}: not allowed on {}", name, self.name());
                continue;
            }

            let value = match def.ty {
                PropertyType::Boolean => Value::Bool(raw.trim().to_lowercase() == "true"),
                PropertyType::Integer => raw
                    .trim()
                    .parse::<i64>()
                    .map(Value::Integer)
                    .unwrap_or_else(|_| Value::from(raw.as_str())),
                PropertyType::Float => raw
                    .trim()
                    .parse::<f64>()
                    .map(Value::Float)
                    .unwrap_or_else(|_| Value::from(raw.as_str())),
                PropertyType::Key { .. } => Key::from_urlsafe(raw)
                    .map(Value::Key)
                    .unwrap_or_else(|_| Value::from(raw.as_str())),
                PropertyType::Date => parse_date(raw)
                    .map(Value::Date)
                    .unwrap_or_else(|| Value::from(raw.as_str())),
                PropertyType::DateTime => parse_datetime(raw)
                    .map(Value::DateTime)
                    .unwrap_or_else(|| Value::from(raw.as_str())),
                PropertyType::Time => parse_time(raw)
                    .map(Value::Time)
                    .unwrap_or_else(|| Value::from(raw.as_str())),
                _ => Value::from(raw.as_str()),
            };
            query = query.filter(name.clone(), value);
        }
        query
    }

    fn list_objects(&self, bundle: &Bundle) -> Result<Vec<Entity>, Error> {
        let query = self.apply_filters(self.list_query(&bundle.request), &bundle.request.query);
        let objects = self.datastore.fetch(&query, self.meta.max_limit)?;
        log::debug!("Listed {} {} entities", objects.len(), self.kind());
        Ok(objects)
    }

    fn get_object(&self, params: &DetailParams) -> Result<Entity, Error> {
        let key = Key::from_urlsafe(&params.pk).map_err(|e| self.not_found(&params.pk, e))?;
        if key.kind() != self.kind() {
            return Err(self.not_found(&params.pk, format!("the key is for kind {}", key.kind())));
        }

        log::debug!("Reading {}", key);
        match self.datastore.get(&key) {
            Ok(Some(entity)) => Ok(entity),
            Ok(None) => Err(self.not_found(&params.pk, "no such entity")),
            Err(e) => Err(self.not_found(&params.pk, e)),
        }
    }

    fn create_object(&self, bundle: Bundle, params: Option<&DetailParams>) -> Result<Bundle, Error> {
        let api = self.api()?;
        let mut bundle = self.full_hydrate(bundle)?;

        if let Some(params) = params {
            let key = Key::from_urlsafe(&params.pk).map_err(|e| self.not_found(&params.pk, e))?;
            bundle
                .obj
                .set_key(key)
                .map_err(|e| self.not_found(&params.pk, e))?;
        }

        self.hydrate_to_many(&mut bundle, &api)?;
        self.save(&mut bundle)?;
        Ok(bundle)
    }

    fn delete_object_list(&self, bundle: &Bundle) -> Result<(), Error> {
        let keys: Vec<Key> = self
            .list_objects(bundle)?
            .iter()
            .filter_map(|entity| entity.key().cloned())
            .collect();

        log::debug!("Deleting {} {} entities", keys.len(), self.kind());
        self.datastore.delete_multi(&keys)?;
        Ok(())
    }

    fn delete_object(&self, params: &DetailParams) -> Result<(), Error> {
        let entity = self.get_object(params)?;
        if let Some(key) = entity.key() {
            log::debug!("Deleting {}", key);
            self.datastore.delete(key)?;
        }
        Ok(())
    }
}
