//! Backup Codec
//!
//! Serializes the whole configuration to a single opaque string (base64
//! over canonical JSON) safe for copy/paste or third-party sync channels,
//! and restores it again. Import replaces the context list and the
//! always-active set; unit ids that are referenced but no longer installed
//! are reported, not fatal.

use crate::config::{ConfigStore, NewUnitPolicy, FORMAT_VERSION};
use crate::directory::{Context, ContextDirectory};
use crate::error::{ImportError, StorageError};
use crate::inventory::UnitInventory;
use crate::types::UnitId;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Top-level fields every backup document must carry.
const REQUIRED_FIELDS: &[&str] = &[
    "version",
    "contexts",
    "alwaysActive",
    "nameDictionary",
    "options",
];

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackupDocument {
    /// Present for forward compatibility; the value is not validated.
    version: u32,
    contexts: Vec<Context>,
    always_active: Vec<UnitId>,
    /// Best-known display name per referenced id; empty when unknown.
    name_dictionary: BTreeMap<UnitId, String>,
    options: BackupOptions,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackupOptions {
    apps_supported: bool,
    new_unit_policy: NewUnitPolicy,
    show_activate_all_control: bool,
}

/// Successful import summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Ids referenced by the imported configuration that are not present
    /// in the current unit inventory.
    pub missing_unit_ids: Vec<UnitId>,
}

pub struct BackupCodec {
    config: Arc<ConfigStore>,
    directory: Arc<Mutex<ContextDirectory>>,
    inventory: Arc<Mutex<UnitInventory>>,
}

impl BackupCodec {
    pub fn new(
        config: Arc<ConfigStore>,
        directory: Arc<Mutex<ContextDirectory>>,
        inventory: Arc<Mutex<UnitInventory>>,
    ) -> Self {
        Self {
            config,
            directory,
            inventory,
        }
    }

    /// Export the whole configuration as one opaque string.
    pub async fn export(&self) -> Result<String, StorageError> {
        let directory = self.directory.lock().await;
        let inventory = self.inventory.lock().await;
        let options = self.config.options();

        let contexts = directory.contexts().to_vec();
        let always_active = inventory.always_active_ids().to_vec();

        let mut name_dictionary = BTreeMap::new();
        for id in contexts
            .iter()
            .flat_map(|context| context.members.iter())
            .chain(always_active.iter())
        {
            let name = inventory
                .by_id(id)
                .map(|unit| unit.name.clone())
                .unwrap_or_default();
            name_dictionary.insert(id.clone(), name);
        }

        let document = BackupDocument {
            version: FORMAT_VERSION,
            contexts,
            always_active,
            name_dictionary,
            options: BackupOptions {
                apps_supported: options.apps_supported,
                new_unit_policy: options.new_unit_policy,
                show_activate_all_control: options.show_activate_all_control,
            },
        };

        let raw = serde_json::to_string(&document)?;
        Ok(BASE64.encode(raw))
    }

    /// Restore a previously exported configuration.
    ///
    /// Any decode or parse failure returns an error before a single
    /// mutation; on success the context list and always-active set are
    /// replaced and persisted.
    pub async fn import(&self, blob: &str) -> Result<ImportReport, ImportError> {
        let document = Self::parse(blob)?;

        let mut directory = self.directory.lock().await;
        let mut inventory = self.inventory.lock().await;

        directory.set_all(document.contexts);
        if let Err(e) = directory.save().await {
            warn!(error = %e, "Failed to persist imported context list");
        }
        inventory.set_always_active(document.always_active);
        if let Err(e) = inventory.save().await {
            warn!(error = %e, "Failed to persist imported always-active list");
        }

        let missing_unit_ids: Vec<UnitId> = {
            let mut seen = BTreeMap::new();
            for id in directory
                .contexts()
                .iter()
                .flat_map(|context| context.members.iter())
                .chain(inventory.always_active_ids().iter())
            {
                if inventory.by_id(id).is_none() {
                    seen.entry(id.clone()).or_insert(());
                }
            }
            seen.into_keys().collect()
        };

        info!(
            contexts = directory.contexts().len(),
            missing = missing_unit_ids.len(),
            "Imported configuration backup"
        );
        Ok(ImportReport { missing_unit_ids })
    }

    fn parse(blob: &str) -> Result<BackupDocument, ImportError> {
        let bytes = BASE64.decode(blob.trim())?;
        let text = String::from_utf8(bytes)
            .map_err(|e| ImportError::Parse(format!("not UTF-8: {}", e)))?;
        let value: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| ImportError::Parse(e.to_string()))?;

        let object = value
            .as_object()
            .ok_or_else(|| ImportError::Parse("top level is not an object".to_string()))?;
        for field in REQUIRED_FIELDS {
            if !object.contains_key(*field) {
                return Err(ImportError::MissingField(field));
            }
        }

        serde_json::from_value(value).map_err(|e| ImportError::Parse(e.to_string()))
    }
}
