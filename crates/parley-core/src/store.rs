//! The key-value persistence contract.

use crate::error::{StoreBackend, StoreResult};
use crate::key::StoreKey;

/// Minimal durable map from key to JSON-encoded record.
///
/// Implementations must be safe to share across request workers: every
/// method takes `&self` and synchronises internally. Values are opaque
/// strings; encoding and decoding is the caller's concern.
pub trait KvStore: Send + Sync {
    /// Load the value stored under `key`, or `None` when absent.
    fn get(&self, key: &StoreKey) -> StoreResult<Option<String>>;

    /// Insert or replace the value stored under `key`.
    fn put(&self, key: &StoreKey, value: String) -> StoreResult<()>;

    /// Remove `key`. Returns `true` when a value existed.
    fn delete(&self, key: &StoreKey) -> StoreResult<bool>;

    /// List every key starting with `prefix`, in ascending order.
    fn list_keys(&self, prefix: &str) -> StoreResult<Vec<StoreKey>>;

    /// Backend identifier for logging and error reporting.
    fn backend(&self) -> StoreBackend;
}
