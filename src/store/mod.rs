//! Persistent key-value store boundary.
//!
//! The core persists every document (context list, always-active set,
//! options) as a whole JSON string under a well-known key. Values are
//! replaced wholesale on write; there is no partial merge of a stored
//! value.

pub mod persistence;

pub use persistence::SledStore;

use crate::error::StorageError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Storage key for the serialized context list.
pub const KEY_CONTEXTS: &str = "contexts";

/// Storage key for the serialized always-active id list.
pub const KEY_ALWAYS_ACTIVE: &str = "always_active";

/// Persistent store interface
///
/// All operations are asynchronous and carry whole-value replace semantics.
/// A missing key reads as `None`, never as an error.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    async fn get_multiple(
        &self,
        keys: &[&str],
    ) -> Result<HashMap<String, String>, StorageError>;

    async fn set_multiple(&self, values: &HashMap<String, String>) -> Result<(), StorageError>;
}

/// Volatile in-memory store
///
/// Backs short-lived surfaces and tests; contents are lost when the
/// process exits.
#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_multiple(
        &self,
        keys: &[&str],
    ) -> Result<HashMap<String, String>, StorageError> {
        let values = self.values.read();
        Ok(keys
            .iter()
            .filter_map(|key| values.get(*key).map(|v| ((*key).to_string(), v.clone())))
            .collect())
    }

    async fn set_multiple(&self, values: &HashMap<String, String>) -> Result<(), StorageError> {
        let mut stored = self.values.write();
        for (key, value) in values {
            stored.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}
