//! Command surface
//!
//! [`Ensemble`] is the single long-lived facade an embedding host talks
//! to: it owns the configuration store, context directory, unit
//! inventory, reconciliation engine, lifecycle reactor, and backup codec,
//! and wires them to one registry and one persistent store. Construct one
//! instance per process and pass it by reference to command handlers;
//! there are no ambient globals.

use crate::backup::{BackupCodec, ImportReport};
use crate::config::ConfigStore;
use crate::directory::{ContextDirectory, ContextStatus};
use crate::engine::{ReconcileRequest, ReconcileReport, ReconciliationEngine};
use crate::error::{EngineError, ImportError, RegistryError, StorageError};
use crate::events::{CoreEvent, EventBus, FeedbackKind};
use crate::inventory::UnitInventory;
use crate::reactor::LifecycleReactor;
use crate::registry::UnitRegistry;
use crate::store::KeyValueStore;
use crate::types::{Unit, UnitId};
use std::collections::HashSet;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

pub struct Ensemble {
    registry: Arc<dyn UnitRegistry>,
    config: Arc<ConfigStore>,
    directory: Arc<Mutex<ContextDirectory>>,
    inventory: Arc<Mutex<UnitInventory>>,
    engine: ReconciliationEngine,
    reactor: LifecycleReactor,
    codec: BackupCodec,
    events: EventBus,
}

impl Ensemble {
    /// Wire up the core against a unit registry and a persistent store.
    ///
    /// `own_id` is the managing unit's own registry id; it is excluded
    /// from the inventory and never toggled. The returned receiver
    /// carries the host-facing [`CoreEvent`] stream.
    pub fn new(
        registry: Arc<dyn UnitRegistry>,
        store: Arc<dyn KeyValueStore>,
        own_id: UnitId,
    ) -> (Self, Receiver<CoreEvent>) {
        let (events, receiver) = EventBus::new_pair();
        let config = Arc::new(ConfigStore::new(store.clone()));
        let directory = Arc::new(Mutex::new(ContextDirectory::new(store.clone())));
        let inventory = Arc::new(Mutex::new(UnitInventory::new(
            registry.clone(),
            store,
            own_id.clone(),
        )));

        let engine = ReconciliationEngine::new(
            registry.clone(),
            config.clone(),
            directory.clone(),
            inventory.clone(),
            events.clone(),
            own_id,
        );
        let reactor = LifecycleReactor::new(
            config.clone(),
            directory.clone(),
            inventory.clone(),
            events.clone(),
        );
        let codec = BackupCodec::new(config.clone(), directory.clone(), inventory.clone());

        (
            Self {
                registry,
                config,
                directory,
                inventory,
                engine,
                reactor,
                codec,
                events,
            },
            receiver,
        )
    }

    /// Load persisted state into memory.
    ///
    /// Storage problems fall back to defaults; a registry enumeration
    /// failure leaves the inventory empty until the next refresh. Neither
    /// is fatal.
    pub async fn init(&self) {
        // A load failure is already logged and leaves defaults in place.
        let _ = self.config.load().await;
        self.directory.lock().await.load().await;
        if let Err(e) = self.inventory.lock().await.refresh().await {
            warn!(error = %e, "Initial inventory refresh failed");
        }
    }

    /// Enable the named context's members plus always-active units and
    /// disable everything else.
    pub async fn switch_context(&self, name: &str) -> Result<ReconcileReport, EngineError> {
        self.engine
            .reconcile(ReconcileRequest::Switch(name.to_string()))
            .await
    }

    /// Enable the named context's members without disabling anything.
    pub async fn activate_context(&self, name: &str) -> Result<ReconcileReport, EngineError> {
        self.engine
            .reconcile(ReconcileRequest::ActivateOnly(name.to_string()))
            .await
    }

    /// Disable the named context's members, sparing always-active units.
    pub async fn deactivate_context(&self, name: &str) -> Result<ReconcileReport, EngineError> {
        self.engine
            .reconcile(ReconcileRequest::DeactivateOnly(name.to_string()))
            .await
    }

    pub async fn enable_all(&self) -> Result<ReconcileReport, EngineError> {
        self.engine.reconcile(ReconcileRequest::EnableAll).await
    }

    pub async fn disable_all(&self) -> Result<ReconcileReport, EngineError> {
        self.engine.reconcile(ReconcileRequest::DisableAll).await
    }

    /// Forward a unit-installed notification from the registry.
    pub async fn handle_installed(&self, unit: Unit) {
        self.reactor.on_installed(unit).await;
    }

    /// Forward a unit-uninstalled notification from the registry.
    pub async fn handle_uninstalled(&self, id: &UnitId) {
        self.reactor.on_uninstalled(id).await;
    }

    /// Most recently surfaced install awaiting a user decision.
    pub async fn pending_install(&self) -> Option<Unit> {
        self.reactor.pending_install().await
    }

    /// Reload configuration, directory, and inventory after an external
    /// surface persisted changes.
    pub async fn notify_configuration_changed(&self) {
        // A load failure is already logged and keeps the cached options.
        let _ = self.config.load().await;
        self.directory.lock().await.load().await;
        if let Err(e) = self.inventory.lock().await.refresh().await {
            warn!(error = %e, "Inventory refresh failed after configuration change");
        }
        self.events.emit(CoreEvent::Feedback(FeedbackKind::ConfigUpdated));
    }

    /// Classify every context against the registry's live enabled states.
    pub async fn context_statuses(
        &self,
    ) -> Result<Vec<(String, ContextStatus)>, RegistryError> {
        let units = self.registry.list_units().await?;
        let enabled: HashSet<UnitId> = units
            .into_iter()
            .filter(|unit| unit.enabled)
            .map(|unit| unit.id)
            .collect();
        Ok(self.directory.lock().await.statuses(&enabled))
    }

    /// True exactly once: on the first call of the process's first run.
    ///
    /// Clears and persists the flag so every later call returns false.
    pub async fn take_first_run(&self) -> bool {
        let mut options = self.config.options();
        if !options.first_run {
            return false;
        }
        options.first_run = false;
        self.config.set_options(options);
        if let Err(e) = self.config.save().await {
            warn!(error = %e, "Failed to persist cleared first-run flag");
        }
        true
    }

    pub async fn export_backup(&self) -> Result<String, StorageError> {
        self.codec.export().await
    }

    pub async fn import_backup(&self, blob: &str) -> Result<ImportReport, ImportError> {
        self.codec.import(blob).await
    }

    /// Shared handle to the context directory (editor surfaces)
    pub fn directory(&self) -> Arc<Mutex<ContextDirectory>> {
        self.directory.clone()
    }

    /// Shared handle to the unit inventory (editor surfaces)
    pub fn inventory(&self) -> Arc<Mutex<UnitInventory>> {
        self.inventory.clone()
    }

    /// Shared handle to the configuration store
    pub fn config(&self) -> Arc<ConfigStore> {
        self.config.clone()
    }
}
