//! On-device fallback store.
//!
//! A string-keyed text-blob store backed by a single JSON file, rewritten
//! whole on every change. This is the last-resort persistence target when
//! the remote store is unreachable or no learner id is known.

use std::collections::HashMap;
use std::path::PathBuf;

use parking_lot::RwLock;

use super::{StoreError, StoreResult};

pub struct LocalStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl LocalStore {
    /// Open the store file, creating parent directories as needed. A file
    /// that fails to parse is discarded and replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<HashMap<String, String>>(&raw) {
                Ok(entries) => entries,
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        path = %path.display(),
                        "discarding malformed local store file"
                    );
                    HashMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(StoreError::Io(err)),
        };
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    /// Replace the value under `key` and rewrite the backing file.
    pub fn set(&self, key: &str, value: String) -> StoreResult<()> {
        let mut entries = self.entries.write();
        entries.insert(key.to_string(), value);
        let serialized = serde_json::to_string_pretty(&*entries)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;
        std::fs::write(&self.path, serialized)?;
        Ok(())
    }
}
