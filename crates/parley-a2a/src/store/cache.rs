//! Two-tier record cache: a concurrent map in front of a [`KvStore`].
//!
//! Writes go to the backend first and reach the memory tier only once the
//! backend accepted them, so the memory tier never holds a value the backend
//! lacks. Reads hit memory, then fall back to the backend and populate memory.
//! Entries are never evicted.
//!
//! [`WriteThroughCache::update`] holds the map shard's write lock while the
//! backend write runs. With [`parley_core::FileStore`] that write is a
//! synchronous rewrite of the whole file on the calling tokio worker, and it
//! stalls every id hashed to the same shard. The file backend is intended for
//! single-node and development use.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parley_core::{KvStore, StoreKey};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::error::{A2aError, A2aResult};

type Encode<T> = fn(&T) -> A2aResult<String>;
type Decode<T> = fn(&str) -> A2aResult<T>;

/// Write-through cache for one record namespace.
pub struct WriteThroughCache<T> {
    namespace: &'static str,
    memory: DashMap<String, T>,
    backend: Arc<dyn KvStore>,
    encode: Encode<T>,
    decode: Decode<T>,
}

impl<T> WriteThroughCache<T>
where
    T: Clone + Send + Sync,
{
    /// Create a cache with a custom record codec.
    pub fn with_codec(
        namespace: &'static str,
        backend: Arc<dyn KvStore>,
        encode: Encode<T>,
        decode: Decode<T>,
    ) -> Self {
        Self {
            namespace,
            memory: DashMap::new(),
            backend,
            encode,
            decode,
        }
    }

    /// Create a cache storing plain JSON records.
    pub fn json(namespace: &'static str, backend: Arc<dyn KvStore>) -> Self
    where
        T: Serialize + DeserializeOwned,
    {
        Self::with_codec(
            namespace,
            backend,
            |value| Ok(serde_json::to_string(value)?),
            |raw| Ok(serde_json::from_str(raw)?),
        )
    }

    fn key(&self, id: &str) -> A2aResult<StoreKey> {
        StoreKey::namespaced(self.namespace, id)
            .map_err(|e| A2aError::invalid_params(format!("invalid {} id: {e}", self.namespace)))
    }

    fn load(&self, key: &StoreKey) -> A2aResult<Option<T>> {
        match self.backend.get(key)? {
            Some(raw) => Ok(Some((self.decode)(&raw)?)),
            None => Ok(None),
        }
    }

    fn write(&self, key: &StoreKey, value: &T) -> A2aResult<()> {
        let raw = (self.encode)(value)?;
        self.backend.put(key, raw)?;
        Ok(())
    }

    /// Look up `id`. Ids that cannot form a valid key are simply absent.
    pub fn get(&self, id: &str) -> A2aResult<Option<T>> {
        if let Some(hit) = self.memory.get(id) {
            return Ok(Some(hit.value().clone()));
        }
        let Ok(key) = self.key(id) else {
            return Ok(None);
        };
        match self.load(&key)? {
            Some(loaded) => Ok(Some(
                self.memory.entry(id.to_string()).or_insert(loaded).value().clone(),
            )),
            None => Ok(None),
        }
    }

    /// Whether `id` is present in either tier.
    pub fn contains(&self, id: &str) -> A2aResult<bool> {
        Ok(self.get(id)?.is_some())
    }

    /// Insert or replace `id`.
    pub fn put(&self, id: &str, value: T) -> A2aResult<()> {
        self.update(id, |_| Ok(Some(value))).map(|_| ())
    }

    /// Atomically read-modify-write one entry.
    ///
    /// `f` sees the current value and returns the next value to persist, or
    /// `None` to leave the entry untouched. It runs while the entry is
    /// locked and must not call back into this cache.
    pub fn update<F>(&self, id: &str, f: F) -> A2aResult<Option<T>>
    where
        F: FnOnce(Option<&T>) -> A2aResult<Option<T>>,
    {
        let key = self.key(id)?;
        match self.memory.entry(id.to_string()) {
            Entry::Occupied(mut occupied) => {
                let Some(next) = f(Some(occupied.get()))? else {
                    return Ok(None);
                };
                self.write(&key, &next)?;
                occupied.insert(next.clone());
                Ok(Some(next))
            }
            Entry::Vacant(vacant) => {
                let loaded = self.load(&key)?;
                let Some(next) = f(loaded.as_ref())? else {
                    if let Some(loaded) = loaded {
                        vacant.insert(loaded);
                    }
                    return Ok(None);
                };
                self.write(&key, &next)?;
                vacant.insert(next.clone());
                Ok(Some(next))
            }
        }
    }

    /// Remove `id` from both tiers. Returns `true` when it existed.
    pub fn delete(&self, id: &str) -> A2aResult<bool> {
        let Ok(key) = self.key(id) else {
            return Ok(false);
        };
        match self.memory.entry(id.to_string()) {
            Entry::Occupied(occupied) => {
                self.backend.delete(&key)?;
                occupied.remove();
                Ok(true)
            }
            Entry::Vacant(_) => Ok(self.backend.delete(&key)?),
        }
    }

    /// All records of this namespace, ordered by id.
    pub fn list(&self) -> A2aResult<Vec<(String, T)>> {
        let prefix = format!("{}:", self.namespace);
        let mut records = Vec::new();
        for key in self.backend.list_keys(&prefix)? {
            let Some(id) = key.strip_namespace(self.namespace) else {
                continue;
            };
            if let Some(value) = self.get(id)? {
                records.push((id.to_string(), value));
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::InMemoryStore;

    fn cache() -> (WriteThroughCache<String>, InMemoryStore) {
        let backend = InMemoryStore::new();
        (
            WriteThroughCache::json("note", Arc::new(backend.clone())),
            backend,
        )
    }

    #[test]
    fn writes_reach_backend() {
        let (cache, backend) = cache();
        cache.put("a", "one".to_string()).unwrap();
        let key = StoreKey::new("note:a").unwrap();
        assert_eq!(backend.get(&key).unwrap(), Some("\"one\"".to_string()));
    }

    #[test]
    fn reads_fall_back_to_backend() {
        let (cache, backend) = cache();
        backend
            .put(&StoreKey::new("note:b").unwrap(), "\"two\"".to_string())
            .unwrap();
        assert_eq!(cache.get("b").unwrap(), Some("two".to_string()));
        assert_eq!(cache.get("missing").unwrap(), None);
        assert_eq!(cache.get("").unwrap(), None);
    }

    #[test]
    fn update_can_decline() {
        let (cache, _) = cache();
        cache.put("a", "one".to_string()).unwrap();
        let result = cache.update("a", |_| Ok(None)).unwrap();
        assert_eq!(result, None);
        assert_eq!(cache.get("a").unwrap(), Some("one".to_string()));
    }

    #[test]
    fn update_errors_leave_entry_untouched() {
        let (cache, _) = cache();
        cache.put("a", "one".to_string()).unwrap();
        let err = cache
            .update("a", |_| Err(A2aError::invalid_params("nope")))
            .unwrap_err();
        assert!(matches!(err, A2aError::InvalidParams { .. }));
        assert_eq!(cache.get("a").unwrap(), Some("one".to_string()));
    }

    #[test]
    fn delete_and_list() {
        let (cache, _) = cache();
        cache.put("b", "2".to_string()).unwrap();
        cache.put("a", "1".to_string()).unwrap();
        let ids: Vec<_> = cache.list().unwrap().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["a", "b"]);

        assert!(cache.delete("a").unwrap());
        assert!(!cache.delete("a").unwrap());
        assert_eq!(cache.list().unwrap().len(), 1);
    }

    #[test]
    fn concurrent_updates_over_file_store_all_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let cache: WriteThroughCache<String> =
            WriteThroughCache::json("note", Arc::new(parley_core::FileStore::open(&path)));

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let cache = &cache;
                scope.spawn(move || {
                    for n in 0..8 {
                        cache.put(&format!("w{worker}-{n}"), n.to_string()).unwrap();
                    }
                });
            }
        });

        let reopened: WriteThroughCache<String> =
            WriteThroughCache::json("note", Arc::new(parley_core::FileStore::open(&path)));
        assert_eq!(reopened.list().unwrap().len(), 32);
        assert_eq!(reopened.get("w3-7").unwrap(), Some("7".to_string()));
    }
}
