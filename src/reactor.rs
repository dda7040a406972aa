//! Lifecycle Reactor
//!
//! Keeps the persisted configuration consistent when the unit universe
//! changes underneath us. Install events run the configured new-unit
//! policy; uninstall events scrub the departed id from every context and
//! from the always-active set. No toggle calls are ever issued from here.

use crate::config::{ConfigStore, NewUnitPolicy, FALLBACK_UNIT_ICON};
use crate::directory::ContextDirectory;
use crate::events::{CoreEvent, EventBus, FeedbackKind};
use crate::inventory::UnitInventory;
use crate::types::{Unit, UnitId, UnitKind};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct LifecycleReactor {
    config: Arc<ConfigStore>,
    directory: Arc<Mutex<ContextDirectory>>,
    inventory: Arc<Mutex<UnitInventory>>,
    events: EventBus,
    pending_install: Mutex<Option<Unit>>,
}

impl LifecycleReactor {
    pub fn new(
        config: Arc<ConfigStore>,
        directory: Arc<Mutex<ContextDirectory>>,
        inventory: Arc<Mutex<UnitInventory>>,
        events: EventBus,
    ) -> Self {
        Self {
            config,
            directory,
            inventory,
            events,
            pending_install: Mutex::new(None),
        }
    }

    /// Handle a unit-installed notification from the registry.
    pub async fn on_installed(&self, unit: Unit) {
        if unit.kind == UnitKind::Theme {
            return;
        }
        let options = self.config.options();
        if unit.kind == UnitKind::App && !options.apps_supported {
            return;
        }
        // A known id means the registry re-announced an update, not an
        // install.
        if self.inventory.lock().await.by_id(&unit.id).is_some() {
            debug!(unit = %unit.id, "Install event for known unit, treating as update");
            return;
        }

        match options.new_unit_policy {
            NewUnitPolicy::AddToAll => {
                let added = {
                    let mut directory = self.directory.lock().await;
                    if directory.is_empty() {
                        false
                    } else {
                        directory.add_member_to_all(&unit.id);
                        if let Err(e) = directory.save().await {
                            warn!(error = %e, "Failed to persist context list after install");
                        }
                        true
                    }
                };
                if added {
                    info!(unit = %unit.id, "Added new unit to every context");
                    self.refresh_all().await;
                    self.events.emit(CoreEvent::Feedback(FeedbackKind::ConfigUpdated));
                }
            }
            NewUnitPolicy::AddToAlwaysActive => {
                {
                    let mut inventory = self.inventory.lock().await;
                    inventory.add_always_active(&unit.id);
                    if let Err(e) = inventory.save().await {
                        warn!(error = %e, "Failed to persist always-active list after install");
                    }
                }
                info!(unit = %unit.id, "Added new unit to the always-active set");
                self.refresh_all().await;
                self.events.emit(CoreEvent::Feedback(FeedbackKind::ConfigUpdated));
            }
            NewUnitPolicy::Ask => {
                let icon = unit
                    .best_icon()
                    .unwrap_or(FALLBACK_UNIT_ICON)
                    .to_string();
                let event = CoreEvent::DecisionRequested {
                    id: unit.id.clone(),
                    name: unit.name.clone(),
                    icon,
                };
                *self.pending_install.lock().await = Some(unit);
                self.events.emit(event);
            }
        }
    }

    /// Handle a unit-uninstalled notification from the registry.
    ///
    /// Safe to call repeatedly for the same id; the second call finds
    /// nothing left to remove.
    pub async fn on_uninstalled(&self, id: &UnitId) {
        {
            let mut directory = self.directory.lock().await;
            directory.remove_member_from_all(id);
            if let Err(e) = directory.save().await {
                warn!(error = %e, "Failed to persist context list after uninstall");
            }
        }
        {
            let mut inventory = self.inventory.lock().await;
            inventory.remove_always_active(id);
            if let Err(e) = inventory.save().await {
                warn!(error = %e, "Failed to persist always-active list after uninstall");
            }
            if let Err(e) = inventory.refresh().await {
                warn!(error = %e, "Failed to refresh inventory after uninstall");
            }
        }
        info!(unit = %id, "Removed uninstalled unit from configuration");
    }

    /// Most recently surfaced install awaiting a user decision, if any.
    pub async fn pending_install(&self) -> Option<Unit> {
        self.pending_install.lock().await.clone()
    }

    async fn refresh_all(&self) {
        if let Err(e) = self.inventory.lock().await.refresh().await {
            warn!(error = %e, "Failed to refresh inventory");
        }
        self.directory.lock().await.load().await;
    }
}
