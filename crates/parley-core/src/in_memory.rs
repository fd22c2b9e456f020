use dashmap::DashMap;
use std::sync::Arc;

use crate::error::{StoreBackend, StoreResult};
use crate::key::StoreKey;
use crate::store::KvStore;

/// Fast, transient key-value store backed by a concurrent map.
///
/// Suitable for development, tests and deployments where tasks need not
/// survive a restart. Cloning shares the underlying map.
///
/// # Example
///
/// ```rust
/// use parley_core::{InMemoryStore, KvStore, StoreKey};
///
/// let store = InMemoryStore::new();
/// let key = StoreKey::new("push:t1").unwrap();
/// store.put(&key, "{\"url\":\"https://x/webhook\"}".to_string()).unwrap();
/// assert!(store.delete(&key).unwrap());
/// assert!(!store.delete(&key).unwrap());
/// ```
#[derive(Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<DashMap<StoreKey, String>>,
}

impl InMemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvStore for InMemoryStore {
    fn get(&self, key: &StoreKey) -> StoreResult<Option<String>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn put(&self, key: &StoreKey, value: String) -> StoreResult<()> {
        self.entries.insert(key.clone(), value);
        Ok(())
    }

    fn delete(&self, key: &StoreKey) -> StoreResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    fn list_keys(&self, prefix: &str) -> StoreResult<Vec<StoreKey>> {
        let mut keys: Vec<StoreKey> = self
            .entries
            .iter()
            .filter(|entry| entry.key().as_str().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn backend(&self) -> StoreBackend {
        StoreBackend::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> StoreKey {
        StoreKey::new(s).unwrap()
    }

    #[test]
    fn test_put_get_replace() {
        let store = InMemoryStore::new();
        store.put(&key("task:a"), "1".to_string()).unwrap();
        store.put(&key("task:a"), "2".to_string()).unwrap();
        assert_eq!(store.get(&key("task:a")).unwrap(), Some("2".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_missing_is_none() {
        let store = InMemoryStore::new();
        assert_eq!(store.get(&key("task:missing")).unwrap(), None);
    }

    #[test]
    fn test_list_keys_filters_and_sorts() {
        let store = InMemoryStore::new();
        for k in ["task:b", "push:a", "task:a"] {
            store.put(&key(k), String::new()).unwrap();
        }
        let keys = store.list_keys("task:").unwrap();
        assert_eq!(keys, vec![key("task:a"), key("task:b")]);
    }

    #[test]
    fn test_clones_share_entries() {
        let store = InMemoryStore::new();
        let other = store.clone();
        store.put(&key("task:a"), "x".to_string()).unwrap();
        assert_eq!(other.get(&key("task:a")).unwrap(), Some("x".to_string()));
    }
}
