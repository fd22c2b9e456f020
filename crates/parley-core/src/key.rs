//! Validated storage keys.

use std::fmt;

/// Validated key for the key-value store.
///
/// Keys are namespaced by convention (`task:<id>`, `push:<id>`) so that
/// [`KvStore::list_keys`](crate::KvStore::list_keys) can enumerate one record
/// family by prefix. Identifiers inside a key are opaque, caller-supplied
/// strings, so validation only rejects what no backend can store faithfully.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreKey(String);

/// Errors that can occur when creating a [`StoreKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidStoreKey {
    /// Key is empty or contains only whitespace.
    Empty,
    /// Key exceeds [`StoreKey::MAX_LENGTH`] bytes.
    TooLong(usize),
    /// Key contains control characters.
    ControlChars(String),
}

impl fmt::Display for InvalidStoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidStoreKey::Empty => write!(f, "Store key cannot be empty"),
            InvalidStoreKey::TooLong(len) => write!(
                f,
                "Store key too long: {} bytes (max {})",
                len,
                StoreKey::MAX_LENGTH
            ),
            InvalidStoreKey::ControlChars(key) => {
                write!(f, "Store key contains control characters: {:?}", key)
            }
        }
    }
}

impl std::error::Error for InvalidStoreKey {}

impl StoreKey {
    /// Maximum allowed key length in bytes.
    pub const MAX_LENGTH: usize = 512;

    /// Create a new validated key.
    ///
    /// # Validation Rules
    ///
    /// - Must not be empty or only whitespace
    /// - Must not exceed [`Self::MAX_LENGTH`] bytes
    /// - Must not contain control characters
    pub fn new(key: &str) -> Result<Self, InvalidStoreKey> {
        if key.trim().is_empty() {
            return Err(InvalidStoreKey::Empty);
        }
        if key.len() > Self::MAX_LENGTH {
            return Err(InvalidStoreKey::TooLong(key.len()));
        }
        if key.chars().any(char::is_control) {
            return Err(InvalidStoreKey::ControlChars(key.to_string()));
        }
        Ok(StoreKey(key.to_string()))
    }

    /// Build a namespaced key: `<namespace>:<id>`.
    pub fn namespaced(namespace: &str, id: &str) -> Result<Self, InvalidStoreKey> {
        Self::new(&format!("{namespace}:{id}"))
    }

    /// Get the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Strip a namespace prefix, returning the identifier part.
    pub fn strip_namespace(&self, namespace: &str) -> Option<&str> {
        self.0
            .strip_prefix(namespace)
            .and_then(|rest| rest.strip_prefix(':'))
    }

    /// Convert into the underlying string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for StoreKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for StoreKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for StoreKey {
    type Error = InvalidStoreKey;

    fn try_from(key: &str) -> Result<Self, Self::Error> {
        StoreKey::new(key)
    }
}

impl TryFrom<String> for StoreKey {
    type Error = InvalidStoreKey;

    fn try_from(key: String) -> Result<Self, Self::Error> {
        StoreKey::new(&key)
    }
}
