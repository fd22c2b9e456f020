//! # Parley Core
//!
//! Persistence contract for the Parley A2A engine.
//!
//! The protocol layer never talks to a database directly. It consumes the
//! minimal [`KvStore`] contract (get / put / delete / list-by-prefix) and
//! stores JSON-encoded records under validated [`StoreKey`]s. Two backends
//! ship with the crate:
//!
//! - [`InMemoryStore`]: concurrent map, lost on process exit
//! - [`FileStore`]: a single JSON document rewritten atomically on every write
//!
//! ## Example
//!
//! ```rust
//! use parley_core::{InMemoryStore, KvStore, StoreKey};
//!
//! let store = InMemoryStore::new();
//! let key = StoreKey::new("task:t1").unwrap();
//! store.put(&key, "{}".to_string()).unwrap();
//!
//! assert_eq!(store.get(&key).unwrap(), Some("{}".to_string()));
//! assert_eq!(store.list_keys("task:").unwrap(), vec![key]);
//! ```

pub mod error;
pub mod file_store;
pub mod in_memory;
pub mod key;
pub mod store;

pub use error::{StoreBackend, StoreError, StoreResult};
pub use file_store::FileStore;
pub use in_memory::InMemoryStore;
pub use key::{InvalidStoreKey, StoreKey};
pub use store::KvStore;
