//! In-memory datastore.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::{Datastore, Entity, Error, Key, KeyId, Query};

/// A datastore that keeps every entity in a process-local map.
///
/// Entities are returned from queries in key order. Numeric ids are
/// allocated from a single counter shared by all kinds, and never collide
/// with ids chosen by callers.
///
/// # Example
///
/// ```rust
/// use docrest_datastore::{Datastore, Entity, InMemoryDatastore};
///
/// let store = InMemoryDatastore::new();
/// let key = store.put(&Entity::new("Note").with_property("title", "hi")).unwrap();
///
/// let stored = store.get(&key).unwrap().unwrap();
/// assert_eq!(stored.key(), Some(&key));
/// ```
pub struct InMemoryDatastore {
    inner: Mutex<Inner>,
}

struct Inner {
    entities: BTreeMap<Key, Entity>,
    /// `None` once an id of `i64::MAX` has been handed out or stored.
    next_id: Option<i64>,
}

impl InMemoryDatastore {
    /// Create a new empty datastore.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entities: BTreeMap::new(),
                next_id: Some(1),
            }),
        }
    }

    /// Number of stored entities across all kinds.
    pub fn len(&self) -> usize {
        self.lock().map(|inner| inner.entities.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, Error> {
        self.inner.lock().map_err(|_| Error::Unavailable {
            message: "in-memory datastore lock poisoned".to_string(),
        })
    }
}

impl Default for InMemoryDatastore {
    fn default() -> Self {
        Self::new()
    }
}

impl Datastore for InMemoryDatastore {
    fn get(&self, key: &Key) -> Result<Option<Entity>, Error> {
        log::debug!("Getting {}...", key);
        Ok(self.lock()?.entities.get(key).cloned())
    }

    fn put(&self, entity: &Entity) -> Result<Key, Error> {
        let mut inner = self.lock()?;

        let key = match entity.key() {
            Some(key) => {
                if let (KeyId::Id(id), Some(next)) = (key.id(), inner.next_id) {
                    if *id >= next {
                        inner.next_id = id.checked_add(1);
                    }
                }
                key.clone()
            }
            None => {
                let id = inner.next_id.ok_or_else(|| Error::Other {
                    message: "id space exhausted".to_string(),
                })?;
                inner.next_id = id.checked_add(1);
                Key::with_id(entity.kind(), id)
            }
        };

        log::debug!("Putting {}...", key);
        let mut stored = entity.clone();
        stored.set_key(key.clone())?;
        inner.entities.insert(key.clone(), stored);
        Ok(key)
    }

    fn delete(&self, key: &Key) -> Result<(), Error> {
        log::debug!("Deleting {}...", key);
        self.lock()?.entities.remove(key);
        Ok(())
    }

    fn fetch(&self, query: &Query, limit: usize) -> Result<Vec<Entity>, Error> {
        let inner = self.lock()?;
        let found: Vec<Entity> = inner
            .entities
            .values()
            .filter(|entity| query.matches(entity))
            .take(limit)
            .cloned()
            .collect();
        log::debug!(
            "Fetched {} {} entities (limit {})",
            found.len(),
            query.kind(),
            limit
        );
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;
    use collection_literals::btree;

    #[test]
    fn put_allocates_ids() {
        let store = InMemoryDatastore::new();
        let a = store.put(&Entity::new("Note")).unwrap();
        let b = store.put(&Entity::new("Note")).unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn put_with_key_overwrites() {
        let store = InMemoryDatastore::new();
        let key = store
            .put(&Entity::new("Note").with_property("title", "first"))
            .unwrap();

        let mut replacement = Entity::new("Note").with_property("title", "second");
        replacement.set_key(key.clone()).unwrap();
        assert_eq!(store.put(&replacement).unwrap(), key);

        let stored = store.get(&key).unwrap().unwrap();
        assert_eq!(stored.get("title"), Some(&Value::from("second")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn explicit_ids_are_not_reallocated() {
        let store = InMemoryDatastore::new();
        store.put(&Entity::with_key(Key::with_id("Note", 10))).unwrap();
        let allocated = store.put(&Entity::new("Note")).unwrap();
        assert_eq!(allocated, Key::with_id("Note", 11));
    }

    #[test]
    fn exhausted_ids_fail_without_clobbering() {
        let store = InMemoryDatastore::new();
        let last = Key::with_id("Note", i64::MAX);
        store
            .put(&Entity::with_key(last.clone()).with_property("title", "last"))
            .unwrap();

        assert!(matches!(
            store.put(&Entity::new("Note")),
            Err(Error::Other { .. })
        ));

        let stored = store.get(&last).unwrap().unwrap();
        assert_eq!(stored.get("title"), Some(&Value::from("last")));
        assert_eq!(store.len(), 1);

        store.put(&Entity::with_key(Key::with_id("Note", 5))).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn fetch_filters_by_kind_and_limit() {
        let store = InMemoryDatastore::new();
        for i in 0..5 {
            store
                .put(&Entity::new("Note").with_property("n", i))
                .unwrap();
        }
        store.put(&Entity::new("Author")).unwrap();

        assert_eq!(store.fetch(&Query::new("Note"), 100).unwrap().len(), 5);
        assert_eq!(store.fetch(&Query::new("Note"), 3).unwrap().len(), 3);
        assert_eq!(store.fetch(&Query::new("Author"), 100).unwrap().len(), 1);
    }

    #[test]
    fn fetch_keeps_key_order() {
        let store = InMemoryDatastore::new();
        let keys: Vec<Key> = (0..3)
            .map(|_| store.put(&Entity::new("Note")).unwrap())
            .collect();
        let fetched: Vec<Key> = store
            .fetch(&Query::new("Note"), 10)
            .unwrap()
            .iter()
            .filter_map(|e| e.key().cloned())
            .collect();
        assert_eq!(fetched, keys);
    }

    #[test]
    fn stored_properties_roundtrip() {
        let store = InMemoryDatastore::new();
        let properties = btree! {
            "title".to_string() => Value::from("hello"),
            "views".to_string() => Value::from(3),
        };
        let mut entity = Entity::new("Note");
        for (name, value) in &properties {
            entity.set(name.clone(), value.clone());
        }
        let key = store.put(&entity).unwrap();
        assert_eq!(store.get(&key).unwrap().unwrap().properties(), &properties);
    }

    #[test]
    fn delete_missing_is_ok() {
        let store = InMemoryDatastore::new();
        assert!(store.delete(&Key::with_id("Note", 1)).is_ok());
        assert!(store.is_empty());
    }
}
