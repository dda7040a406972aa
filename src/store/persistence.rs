//! Sled-backed persistent store.

use crate::error::StorageError;
use crate::store::KeyValueStore;
use async_trait::async_trait;
use directories::ProjectDirs;
use sled;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

fn sled_io_error(context: &str, err: sled::Error) -> StorageError {
    StorageError::IoError(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("{}: {}", context, err),
    ))
}

/// Sled-based implementation of KeyValueStore
///
/// Values are stored as UTF-8 strings; non-UTF-8 content under a key is
/// treated as corrupt and surfaced as an I/O error.
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    /// Open a store at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(|e| sled_io_error("Failed to open sled database", e))?;
        Ok(Self { db })
    }

    /// Open a store at the default per-user data location
    pub fn open_default() -> Result<Self, StorageError> {
        Self::new(Self::default_path()?)
    }

    /// Default database location under the platform data directory
    pub fn default_path() -> Result<PathBuf, StorageError> {
        let dirs = ProjectDirs::from("dev", "ensemble", "ensemble").ok_or_else(|| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine a per-user data directory",
            ))
        })?;
        Ok(dirs.data_dir().join("store"))
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db
            .flush()
            .map_err(|e| sled_io_error("Failed to flush database", e))?;
        Ok(())
    }

    fn read_value(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self
            .db
            .get(key.as_bytes())
            .map_err(|e| sled_io_error("Failed to read key", e))?
        {
            Some(value) => {
                let text = String::from_utf8(value.to_vec()).map_err(|e| {
                    StorageError::IoError(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!("Stored value for '{}' is not UTF-8: {}", key, e),
                    ))
                })?;
                Ok(Some(text))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl KeyValueStore for SledStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.read_value(key)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.db
            .insert(key.as_bytes(), value.as_bytes())
            .map_err(|e| sled_io_error("Failed to write key", e))?;
        Ok(())
    }

    async fn get_multiple(
        &self,
        keys: &[&str],
    ) -> Result<HashMap<String, String>, StorageError> {
        let mut values = HashMap::new();
        for key in keys {
            if let Some(value) = self.read_value(key)? {
                values.insert((*key).to_string(), value);
            }
        }
        Ok(values)
    }

    async fn set_multiple(&self, values: &HashMap<String, String>) -> Result<(), StorageError> {
        let mut batch = sled::Batch::default();
        for (key, value) in values {
            batch.insert(key.as_bytes(), value.as_bytes());
        }
        self.db
            .apply_batch(batch)
            .map_err(|e| sled_io_error("Failed to apply batch", e))?;
        Ok(())
    }
}
