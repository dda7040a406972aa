//! Unit Inventory
//!
//! Cached snapshot of the unit universe as this crate sees it: the
//! registry's list minus the managing unit itself and all theme-kind
//! units, sorted by name. App-kind units stay in the snapshot and are
//! filtered at toggle time instead. Also owns the always-active id set.

use crate::error::{RegistryError, StorageError};
use crate::registry::UnitRegistry;
use crate::store::{KeyValueStore, KEY_ALWAYS_ACTIVE};
use crate::types::{Unit, UnitId, UnitKind};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct UnitInventory {
    registry: Arc<dyn UnitRegistry>,
    store: Arc<dyn KeyValueStore>,
    own_id: UnitId,
    units: Vec<Unit>,
    always_active: Vec<UnitId>,
}

impl UnitInventory {
    pub fn new(
        registry: Arc<dyn UnitRegistry>,
        store: Arc<dyn KeyValueStore>,
        own_id: UnitId,
    ) -> Self {
        Self {
            registry,
            store,
            own_id,
            units: Vec::new(),
            always_active: Vec::new(),
        }
    }

    /// Rebuild the snapshot from the registry and reload the always-active
    /// set from the store.
    ///
    /// Registry enumeration failure aborts the refresh; always-active
    /// storage problems fall back to the last known/empty list.
    pub async fn refresh(&mut self) -> Result<(), RegistryError> {
        let listed = self.registry.list_units().await?;
        let mut units: Vec<Unit> = listed
            .into_iter()
            .filter(|unit| unit.id != self.own_id && unit.kind != UnitKind::Theme)
            .collect();
        // Stable sort keeps registry order for equal names.
        units.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(count = units.len(), "Refreshed unit inventory");
        self.units = units;

        match self.store.get(KEY_ALWAYS_ACTIVE).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<UnitId>>(&raw) {
                Ok(ids) => self.always_active = ids,
                Err(e) => {
                    warn!(error = %e, "Stored always-active list is unreadable, starting empty");
                    self.always_active = Vec::new();
                }
            },
            Ok(None) => self.always_active = Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read always-active list, keeping current values");
            }
        }

        Ok(())
    }

    /// Persist the always-active id list only
    pub async fn save(&self) -> Result<(), StorageError> {
        let raw = serde_json::to_string(&self.always_active)?;
        self.store.set(KEY_ALWAYS_ACTIVE, &raw).await
    }

    pub fn list(&self) -> &[Unit] {
        &self.units
    }

    pub fn by_id(&self, id: &str) -> Option<&Unit> {
        self.units.iter().find(|unit| unit.id == id)
    }

    pub fn is_always_active(&self, id: &str) -> bool {
        self.always_active.iter().any(|member| member == id)
    }

    /// Add an id to the always-active set; no-op if present.
    pub fn add_always_active(&mut self, id: &str) {
        if !self.is_always_active(id) {
            self.always_active.push(id.to_string());
        }
    }

    /// Remove an id from the always-active set; no-op if absent.
    pub fn remove_always_active(&mut self, id: &str) {
        self.always_active.retain(|member| member != id);
    }

    /// Replace the whole always-active set (backup import path)
    pub fn set_always_active(&mut self, ids: Vec<UnitId>) {
        self.always_active = ids;
    }

    pub fn always_active_ids(&self) -> &[UnitId] {
        &self.always_active
    }
}
