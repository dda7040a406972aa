//! Reconciliation Engine
//!
//! Computes which units must be turned on or off for a requested
//! operation and applies those changes against the unit registry. One
//! reconciliation episode runs at a time per process; the disable phase
//! always completes before the first enable call, toggles are issued
//! strictly sequentially, and a fixed delay separates consecutive calls.
//!
//! Toggle calls that fail or are refused by the registry are logged and
//! skipped, never retried; callers that need stronger guarantees poll the
//! inventory afterwards.

use crate::config::ConfigStore;
use crate::directory::{Context, ContextDirectory};
use crate::error::EngineError;
use crate::events::{CoreEvent, EventBus, FeedbackKind};
use crate::inventory::UnitInventory;
use crate::registry::UnitRegistry;
use crate::types::{Unit, UnitId, UnitKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// A requested reconciliation operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileRequest {
    /// Enable the named context's members (plus always-active units),
    /// disable everything else.
    Switch(String),
    /// Enable the named context's members without touching the rest.
    ActivateOnly(String),
    /// Disable the named context's members, except always-active units.
    DeactivateOnly(String),
    /// Enable every unit.
    EnableAll,
    /// Disable every unit.
    DisableAll,
}

impl ReconcileRequest {
    fn context_name(&self) -> Option<&str> {
        match self {
            ReconcileRequest::Switch(name)
            | ReconcileRequest::ActivateOnly(name)
            | ReconcileRequest::DeactivateOnly(name) => Some(name),
            ReconcileRequest::EnableAll | ReconcileRequest::DisableAll => None,
        }
    }
}

/// Toggle lists for one reconciliation episode, already filtered down to
/// calls that will actually be issued. Disable is applied in full before
/// enable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TogglePlan {
    pub disable: Vec<Unit>,
    pub enable: Vec<Unit>,
}

/// Counts of toggle calls issued during one episode
///
/// Refused or failed calls are not distinguished from successful ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub disabled: usize,
    pub enabled: usize,
}

/// Whether a toggle call for this unit would be issued at all.
///
/// Mirrors the registry-side policy: themes are untouchable, apps only
/// with app support, the managing unit never toggles itself, and a call
/// that would not change the unit's current state is dropped.
pub fn permits_toggle(unit: &Unit, enable: bool, own_id: &str, apps_supported: bool) -> bool {
    if unit.kind == UnitKind::Theme {
        return false;
    }
    if unit.kind == UnitKind::App && !apps_supported {
        return false;
    }
    if unit.id == own_id {
        return false;
    }
    if enable {
        !unit.enabled
    } else {
        unit.enabled && unit.may_disable
    }
}

/// Compute the toggle plan for a request over the unit universe `units`.
///
/// `context` is the resolved target context, if the request names one; a
/// request naming a context that does not exist yields an empty plan.
pub fn compute_plan(
    request: &ReconcileRequest,
    units: &[Unit],
    context: Option<&Context>,
    always_active: &[UnitId],
    own_id: &str,
    apps_supported: bool,
) -> TogglePlan {
    let is_always_active = |unit: &Unit| always_active.iter().any(|id| *id == unit.id);

    let (enable_set, disable_set): (Vec<&Unit>, Vec<&Unit>) = match request {
        ReconcileRequest::Switch(_) => {
            let Some(context) = context else {
                return TogglePlan::default();
            };
            units
                .iter()
                .partition(|unit| is_always_active(unit) || context.is_member(&unit.id))
        }
        ReconcileRequest::ActivateOnly(_) => {
            let Some(context) = context else {
                return TogglePlan::default();
            };
            (
                units
                    .iter()
                    .filter(|unit| is_always_active(unit) || context.is_member(&unit.id))
                    .collect(),
                Vec::new(),
            )
        }
        ReconcileRequest::DeactivateOnly(_) => {
            let Some(context) = context else {
                return TogglePlan::default();
            };
            (
                Vec::new(),
                units
                    .iter()
                    .filter(|unit| context.is_member(&unit.id) && !is_always_active(unit))
                    .collect(),
            )
        }
        ReconcileRequest::EnableAll => (units.iter().collect(), Vec::new()),
        ReconcileRequest::DisableAll => (Vec::new(), units.iter().collect()),
    };

    TogglePlan {
        disable: disable_set
            .into_iter()
            .filter(|unit| permits_toggle(unit, false, own_id, apps_supported))
            .cloned()
            .collect(),
        enable: enable_set
            .into_iter()
            .filter(|unit| permits_toggle(unit, true, own_id, apps_supported))
            .cloned()
            .collect(),
    }
}

/// The reconciliation core
///
/// One long-lived instance per process, holding references to the
/// directory and inventory it reconciles over.
pub struct ReconciliationEngine {
    registry: Arc<dyn UnitRegistry>,
    config: Arc<ConfigStore>,
    directory: Arc<Mutex<ContextDirectory>>,
    inventory: Arc<Mutex<UnitInventory>>,
    events: EventBus,
    own_id: UnitId,
    flight: Mutex<()>,
}

impl ReconciliationEngine {
    pub fn new(
        registry: Arc<dyn UnitRegistry>,
        config: Arc<ConfigStore>,
        directory: Arc<Mutex<ContextDirectory>>,
        inventory: Arc<Mutex<UnitInventory>>,
        events: EventBus,
        own_id: UnitId,
    ) -> Self {
        Self {
            registry,
            config,
            directory,
            inventory,
            events,
            own_id,
            flight: Mutex::new(()),
        }
    }

    /// Run one reconciliation episode.
    ///
    /// Returns [`EngineError::Busy`] immediately if another episode is in
    /// flight. A request naming an unknown context succeeds trivially.
    pub async fn reconcile(
        &self,
        request: ReconcileRequest,
    ) -> Result<ReconcileReport, EngineError> {
        let _guard = self.flight.try_lock().map_err(|_| EngineError::Busy)?;

        self.events.emit(CoreEvent::Feedback(FeedbackKind::Reconciling));
        debug!(?request, "Reconciliation started");

        // Step 1: refresh the unit snapshot and reload the directory so
        // the plan is computed against current state.
        self.inventory.lock().await.refresh().await?;
        self.directory.lock().await.load().await;

        let options = self.config.options();

        // Step 2 + 3: compute the filtered toggle plan.
        let plan = {
            let directory = self.directory.lock().await;
            let inventory = self.inventory.lock().await;
            let context = request
                .context_name()
                .and_then(|name| directory.get(name));
            if request.context_name().is_some() && context.is_none() {
                debug!(?request, "Requested context does not exist, nothing to do");
            }
            compute_plan(
                &request,
                inventory.list(),
                context,
                inventory.always_active_ids(),
                &self.own_id,
                options.apps_supported,
            )
        };

        // Step 4: disable phase fully precedes enable phase; strictly
        // sequential with a fixed delay between consecutive calls.
        let report = ReconcileReport {
            disabled: plan.disable.len(),
            enabled: plan.enable.len(),
        };
        let delay = Duration::from_millis(options.toggle_delay_ms);
        let calls = plan
            .disable
            .iter()
            .map(|unit| (unit, false))
            .chain(plan.enable.iter().map(|unit| (unit, true)));

        let mut first = true;
        for (unit, enable) in calls {
            if !first {
                sleep(delay).await;
            }
            first = false;
            if let Err(e) = self.registry.set_enabled(&unit.id, enable).await {
                warn!(unit = %unit.id, enable, error = %e, "Toggle call failed, continuing");
            }
        }

        info!(
            disabled = report.disabled,
            enabled = report.enabled,
            "Reconciliation finished"
        );
        Ok(report)
    }
}
