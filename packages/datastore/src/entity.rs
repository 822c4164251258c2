//! Entities: a kind, an optional key and a set of named properties.

use std::collections::BTreeMap;

use crate::{Error, Key, Value};

/// A document stored in (or about to be stored in) a datastore.
///
/// An entity has no key until it is put for the first time, unless the
/// caller assigns one explicitly.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    kind: String,
    key: Option<Key>,
    properties: BTreeMap<String, Value>,
}

impl Entity {
    /// Create an unsaved entity of the given kind.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            key: None,
            properties: BTreeMap::new(),
        }
    }

    /// Create an entity that already carries `key`.
    pub fn with_key(key: Key) -> Self {
        Self {
            kind: key.kind().to_string(),
            key: Some(key),
            properties: BTreeMap::new(),
        }
    }

    /// Builder-style property assignment.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    /// Whether the entity has an identity (was saved or given a key).
    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }

    /// Assign the entity's key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KindMismatch`] if the key belongs to another kind.
    pub fn set_key(&mut self, key: Key) -> Result<(), Error> {
        if key.kind() != self.kind {
            return Err(Error::KindMismatch {
                expected: self.kind.clone(),
                found: key.kind().to_string(),
            });
        }
        self.key = Some(key);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.properties.remove(name)
    }

    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }
}
