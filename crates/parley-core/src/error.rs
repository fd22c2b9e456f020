//! Storage errors.
//!
//! Every failure carries the backend it happened on and, where one exists,
//! the key that was being accessed.

use std::fmt;

use thiserror::Error;

use crate::key::InvalidStoreKey;

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage backend identifiers used in error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreBackend {
    /// Process-local concurrent map
    Memory,
    /// JSON file on local disk
    File,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Memory => write!(f, "memory"),
            StoreBackend::File => write!(f, "file"),
        }
    }
}

/// Errors that can occur in key-value storage operations
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Failed to read a key
    #[error("Failed to load key '{key}' from {backend} backend: {reason}")]
    LoadFailed {
        key: String,
        backend: StoreBackend,
        reason: String,
    },

    /// Failed to write a key
    #[error("Failed to store key '{key}' on {backend} backend: {reason}")]
    StoreFailed {
        key: String,
        backend: StoreBackend,
        reason: String,
    },

    /// Failed to delete a key
    #[error("Failed to delete key '{key}' from {backend} backend: {reason}")]
    DeleteFailed {
        key: String,
        backend: StoreBackend,
        reason: String,
    },

    /// Failed to enumerate keys
    #[error("Failed to list keys with prefix '{prefix}' on {backend} backend: {reason}")]
    ListFailed {
        prefix: String,
        backend: StoreBackend,
        reason: String,
    },

    /// A key failed validation
    #[error("Invalid store key: {0}")]
    InvalidKey(#[from] InvalidStoreKey),
}

impl StoreError {
    /// Backend the failure happened on, if known.
    pub fn backend(&self) -> Option<StoreBackend> {
        match self {
            StoreError::LoadFailed { backend, .. }
            | StoreError::StoreFailed { backend, .. }
            | StoreError::DeleteFailed { backend, .. }
            | StoreError::ListFailed { backend, .. } => Some(*backend),
            StoreError::InvalidKey(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_backend_and_key() {
        let err = StoreError::StoreFailed {
            key: "task:t1".to_string(),
            backend: StoreBackend::File,
            reason: "disk full".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to store key 'task:t1' on file backend: disk full"
        );
        assert_eq!(err.backend(), Some(StoreBackend::File));
    }

    #[test]
    fn test_invalid_key_has_no_backend() {
        let err: StoreError = InvalidStoreKey::Empty.into();
        assert_eq!(err.backend(), None);
    }
}
