//! The Datastore trait.

use std::sync::Arc;

use crate::{Entity, Error, Key, Query};

/// Key-based access to stored entities.
///
/// This is the whole surface the resource layer needs from a document
/// datastore: fetch and delete by key, put, and bounded query execution.
///
/// # Object Safety
///
/// This trait is object-safe: you can use `Arc<dyn Datastore>`.
pub trait Datastore: Send + Sync {
    /// Fetch an entity by key.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - No entity is stored under the key.
    /// * `Ok(Some(entity))` - The stored entity, with its key set.
    /// * `Err(Error)` - The datastore failed.
    fn get(&self, key: &Key) -> Result<Option<Entity>, Error>;

    /// Fetch several entities, one slot per key in input order.
    fn get_multi(&self, keys: &[Key]) -> Result<Vec<Option<Entity>>, Error> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    /// Store an entity and return its key.
    ///
    /// An entity without a key receives a newly allocated numeric id. An
    /// entity with a key overwrites whatever is stored under it.
    fn put(&self, entity: &Entity) -> Result<Key, Error>;

    /// Delete the entity stored under `key`. Deleting a missing key is not an error.
    fn delete(&self, key: &Key) -> Result<(), Error>;

    /// Delete several entities.
    ///
    /// Deletes run in order and stop at the first failure. Earlier deletes
    /// stay committed; there is no rollback.
    fn delete_multi(&self, keys: &[Key]) -> Result<(), Error> {
        for key in keys {
            self.delete(key)?;
        }
        Ok(())
    }

    /// Run `query` and return at most `limit` matching entities.
    fn fetch(&self, query: &Query, limit: usize) -> Result<Vec<Entity>, Error>;
}

// Blanket implementations for references and smart pointers

impl<T: Datastore + ?Sized> Datastore for &T {
    fn get(&self, key: &Key) -> Result<Option<Entity>, Error> {
        (**self).get(key)
    }

    fn get_multi(&self, keys: &[Key]) -> Result<Vec<Option<Entity>>, Error> {
        (**self).get_multi(keys)
    }

    fn put(&self, entity: &Entity) -> Result<Key, Error> {
        (**self).put(entity)
    }

    fn delete(&self, key: &Key) -> Result<(), Error> {
        (**self).delete(key)
    }

    fn delete_multi(&self, keys: &[Key]) -> Result<(), Error> {
        (**self).delete_multi(keys)
    }

    fn fetch(&self, query: &Query, limit: usize) -> Result<Vec<Entity>, Error> {
        (**self).fetch(query, limit)
    }
}

impl<T: Datastore + ?Sized> Datastore for Box<T> {
    fn get(&self, key: &Key) -> Result<Option<Entity>, Error> {
        self.as_ref().get(key)
    }

    fn get_multi(&self, keys: &[Key]) -> Result<Vec<Option<Entity>>, Error> {
        self.as_ref().get_multi(keys)
    }

    fn put(&self, entity: &Entity) -> Result<Key, Error> {
        self.as_ref().put(entity)
    }

    fn delete(&self, key: &Key) -> Result<(), Error> {
        self.as_ref().delete(key)
    }

    fn delete_multi(&self, keys: &[Key]) -> Result<(), Error> {
        self.as_ref().delete_multi(keys)
    }

    fn fetch(&self, query: &Query, limit: usize) -> Result<Vec<Entity>, Error> {
        self.as_ref().fetch(query, limit)
    }
}

impl<T: Datastore + ?Sized> Datastore for Arc<T> {
    fn get(&self, key: &Key) -> Result<Option<Entity>, Error> {
        self.as_ref().get(key)
    }

    fn get_multi(&self, keys: &[Key]) -> Result<Vec<Option<Entity>>, Error> {
        self.as_ref().get_multi(keys)
    }

    fn put(&self, entity: &Entity) -> Result<Key, Error> {
        self.as_ref().put(entity)
    }

    fn delete(&self, key: &Key) -> Result<(), Error> {
        self.as_ref().delete(key)
    }

    fn delete_multi(&self, keys: &[Key]) -> Result<(), Error> {
        self.as_ref().delete_multi(keys)
    }

    fn fetch(&self, query: &Query, limit: usize) -> Result<Vec<Entity>, Error> {
        self.as_ref().fetch(query, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Minimal datastore relying on the provided default methods.
    struct MapDatastore {
        data: Mutex<HashMap<Key, Entity>>,
    }

    impl Datastore for MapDatastore {
        fn get(&self, key: &Key) -> Result<Option<Entity>, Error> {
            Ok(self.data.lock().unwrap().get(key).cloned())
        }

        fn put(&self, entity: &Entity) -> Result<Key, Error> {
            let key = entity.key().cloned().unwrap_or(Key::with_id(entity.kind(), 1));
            self.data.lock().unwrap().insert(key.clone(), entity.clone());
            Ok(key)
        }

        fn delete(&self, key: &Key) -> Result<(), Error> {
            self.data.lock().unwrap().remove(key);
            Ok(())
        }

        fn fetch(&self, query: &Query, limit: usize) -> Result<Vec<Entity>, Error> {
            Ok(self
                .data
                .lock()
                .unwrap()
                .values()
                .filter(|e| query.matches(e))
                .take(limit)
                .cloned()
                .collect())
        }
    }

    #[test]
    fn default_multi_methods_delegate() {
        let store = MapDatastore {
            data: Mutex::new(HashMap::new()),
        };
        let key = store.put(&Entity::new("Note")).unwrap();

        let found = store.get_multi(&[key.clone(), Key::with_id("Note", 9)]).unwrap();
        assert!(found[0].is_some());
        assert!(found[1].is_none());

        store.delete_multi(&[key.clone()]).unwrap();
        assert!(store.get(&key).unwrap().is_none());
    }

    #[test]
    fn object_safety_works() {
        let store: Arc<dyn Datastore> = Arc::new(MapDatastore {
            data: Mutex::new(HashMap::new()),
        });
        let key = store.put(&Entity::new("Note")).unwrap();
        assert!(store.get(&key).unwrap().is_some());
    }
}
