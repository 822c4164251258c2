//! The resource registry.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use docrest_datastore::{Datastore, Schema};
use serde::{Deserialize, Serialize};

use crate::fields::Field;
use crate::resource::{DetailParams, DocumentResource, ResourceMeta};
use crate::Error;

fn default_api_name() -> String {
    "v1".to_string()
}

fn default_url_prefix() -> String {
    "api".to_string()
}

/// Naming of an API's URIs: `/{url_prefix}/{api_name}/{resource}/{pk}/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_name")]
    pub api_name: String,

    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_name: default_api_name(),
            url_prefix: default_url_prefix(),
        }
    }
}

impl ApiConfig {
    pub fn new(api_name: impl Into<String>) -> Self {
        Self {
            api_name: api_name.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_url_prefix(mut self, url_prefix: impl Into<String>) -> Self {
        self.url_prefix = url_prefix.into();
        self
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Resources sharing one datastore and one URI space.
///
/// Relation fields name their target resource; the API resolves the name
/// when the field is used, so resources may refer to each other in any
/// registration order.
///
/// ```rust
/// use std::sync::Arc;
/// use docrest_datastore::{InMemoryDatastore, PropertyDef, Schema};
/// use docrest_resource::{Api, ApiConfig, ResourceMeta};
///
/// let api = Api::new(ApiConfig::default(), Arc::new(InMemoryDatastore::new()));
/// let notes = api
///     .register(
///         ResourceMeta::new("notes"),
///         Schema::new("Note").property(PropertyDef::string("title")),
///         Vec::new(),
///     )
///     .unwrap();
/// assert_eq!(notes.list_uri(), "/api/v1/notes/");
/// ```
pub struct Api {
    config: ApiConfig,
    datastore: Arc<dyn Datastore>,
    resources: RwLock<BTreeMap<String, Arc<DocumentResource>>>,
}

impl fmt::Debug for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Api")
            .field("config", &self.config)
            .field("resources", &self.resource_names())
            .finish()
    }
}

impl Api {
    pub fn new(config: ApiConfig, datastore: Arc<dyn Datastore>) -> Arc<Self> {
        Arc::new(Self {
            config,
            datastore,
            resources: RwLock::new(BTreeMap::new()),
        })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn datastore(&self) -> &dyn Datastore {
        self.datastore.as_ref()
    }

    /// Common prefix of every resource URI, e.g. `/api/v1/`.
    pub fn base_uri(&self) -> String {
        let prefix = self.config.url_prefix.trim_matches('/');
        if prefix.is_empty() {
            format!("/{}/", self.config.api_name)
        } else {
            format!("/{}/{}/", prefix, self.config.api_name)
        }
    }

    /// Create a resource for `schema` and add it to the registry.
    ///
    /// Fields in `declared` are used as given; the rest are derived from
    /// the schema according to `meta`.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if the name is taken or a field is declared
    /// twice.
    pub fn register(
        self: &Arc<Self>,
        meta: ResourceMeta,
        schema: Schema,
        declared: Vec<Field>,
    ) -> Result<Arc<DocumentResource>, Error> {
        let name = meta.resource_name.clone();
        let base_uri = format!("{}{}/", self.base_uri(), name);

        let mut resources = self
            .resources
            .write()
            .map_err(|_| Error::configuration("resource registry lock poisoned"))?;
        if resources.contains_key(&name) {
            return Err(Error::configuration(format!(
                "A resource named '{}' is already registered.",
                name
            )));
        }

        let resource = Arc::new(DocumentResource::new(
            meta,
            schema,
            declared,
            Arc::clone(&self.datastore),
            Arc::downgrade(self),
            base_uri,
        )?);
        log::debug!("Registered {} at {}", name, resource.list_uri());
        resources.insert(name, Arc::clone(&resource));

        Ok(resource)
    }

    pub fn resource(&self, name: &str) -> Result<Arc<DocumentResource>, Error> {
        let resources = self
            .resources
            .read()
            .map_err(|_| Error::configuration("resource registry lock poisoned"))?;
        resources
            .get(name)
            .cloned()
            .ok_or_else(|| Error::configuration(format!("No resource named '{}' is registered.", name)))
    }

    pub fn resource_names(&self) -> Vec<String> {
        match self.resources.read() {
            Ok(resources) => resources.keys().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Split a detail URI into its resource and detail parameters.
    ///
    /// The URI may carry a scheme and host in front of the API prefix, but
    /// nothing else.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] unless the URI has the shape
    /// `/{prefix}/{api_name}/{resource}/{pk}/` and names a registered
    /// resource.
    pub fn resolve_uri(&self, uri: &str) -> Result<(Arc<DocumentResource>, DetailParams), Error> {
        let not_found = || Error::not_found(format!("'{}' is not a resource URI of this API.", uri));

        // An absolute URL contributes only its path.
        let path = match uri.split_once("://") {
            Some((_, rest)) => rest.find('/').map(|i| &rest[i..]).ok_or_else(not_found)?,
            None => uri,
        };
        let base = self.base_uri();
        let rest = path.strip_prefix(base.as_str()).ok_or_else(not_found)?;
        let mut parts = rest.trim_end_matches('/').split('/');

        let (Some(name), Some(pk), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(not_found());
        };
        if name.is_empty() || pk.is_empty() {
            return Err(not_found());
        }

        let resource = self.resource(name).map_err(|_| not_found())?;
        Ok((resource, DetailParams::new(pk)))
    }
}
