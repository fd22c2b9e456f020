use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{StoreBackend, StoreError, StoreResult};
use crate::key::StoreKey;
use crate::store::KvStore;

/// A persistent key-value store that syncs to a single JSON file.
///
/// # File Access Patterns
///
/// Reads are served from an in-process copy loaded at construction. Every
/// write (`put`, `delete`) rewrites the whole document through a temporary
/// file followed by an atomic rename, so a crash never leaves a half-written
/// file behind. If the rewrite fails the in-process copy is rolled back and
/// the error is returned.
///
/// # Concurrent File Access
///
/// One `FileStore` per path. Multiple instances pointing at the same file
/// will overwrite each other's changes.
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`, loading existing entries.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = Self::load_entries(&path).unwrap_or_default();
        Self {
            path,
            entries: RwLock::new(entries),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_entries(path: &Path) -> Option<BTreeMap<String, String>> {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<BTreeMap<String, String>>(&contents) {
                Ok(entries) => {
                    tracing::debug!(path = ?path, entries = entries.len(), "Loaded store file");
                    Some(entries)
                }
                Err(e) => {
                    tracing::error!(
                        path = ?path,
                        error = %e,
                        "Failed to parse store file, starting fresh"
                    );
                    if let Some(parent) = path.parent() {
                        let backup = parent.join(format!(
                            "{}.corrupted.{}",
                            path.file_name().unwrap_or_default().to_string_lossy(),
                            chrono::Utc::now().timestamp()
                        ));
                        let _ = fs::copy(path, backup);
                    }
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = ?path, "Store file not found, starting fresh");
                None
            }
            Err(e) => {
                tracing::warn!(path = ?path, error = %e, "Failed to read store file");
                None
            }
        }
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), String> {
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| format!("Failed to serialize entries: {e}"))?;

        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, json).map_err(|e| {
            tracing::error!(path = ?tmp_path, error = %e, "Failed to write store file");
            format!("Failed to write to {}: {e}", tmp_path.display())
        })?;

        fs::rename(&tmp_path, &self.path).map_err(|e| {
            tracing::error!(
                from = ?tmp_path,
                to = ?self.path,
                error = %e,
                "Failed to atomically rename store file"
            );
            format!(
                "Failed to rename {} to {}: {e}",
                tmp_path.display(),
                self.path.display()
            )
        })
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &StoreKey) -> StoreResult<Option<String>> {
        let entries = self.entries.read().map_err(|e| StoreError::LoadFailed {
            key: key.to_string(),
            backend: StoreBackend::File,
            reason: format!("Lock poisoned: {e}"),
        })?;
        Ok(entries.get(key.as_str()).cloned())
    }

    fn put(&self, key: &StoreKey, value: String) -> StoreResult<()> {
        let mut entries = self.entries.write().map_err(|e| StoreError::StoreFailed {
            key: key.to_string(),
            backend: StoreBackend::File,
            reason: format!("Lock poisoned: {e}"),
        })?;

        let previous = entries.insert(key.to_string(), value);
        if let Err(reason) = self.persist(&entries) {
            match previous {
                Some(old) => entries.insert(key.to_string(), old),
                None => entries.remove(key.as_str()),
            };
            return Err(StoreError::StoreFailed {
                key: key.to_string(),
                backend: StoreBackend::File,
                reason,
            });
        }
        Ok(())
    }

    fn delete(&self, key: &StoreKey) -> StoreResult<bool> {
        let mut entries = self.entries.write().map_err(|e| StoreError::DeleteFailed {
            key: key.to_string(),
            backend: StoreBackend::File,
            reason: format!("Lock poisoned: {e}"),
        })?;

        let Some(previous) = entries.remove(key.as_str()) else {
            return Ok(false);
        };
        if let Err(reason) = self.persist(&entries) {
            entries.insert(key.to_string(), previous);
            return Err(StoreError::DeleteFailed {
                key: key.to_string(),
                backend: StoreBackend::File,
                reason,
            });
        }
        Ok(true)
    }

    fn list_keys(&self, prefix: &str) -> StoreResult<Vec<StoreKey>> {
        let entries = self.entries.read().map_err(|e| StoreError::ListFailed {
            prefix: prefix.to_string(),
            backend: StoreBackend::File,
            reason: format!("Lock poisoned: {e}"),
        })?;
        entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .map(|k| StoreKey::new(k).map_err(StoreError::from))
            .collect()
    }

    fn backend(&self) -> StoreBackend {
        StoreBackend::File
    }
}
