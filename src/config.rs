//! Configuration System
//!
//! Typed option struct backed by the persistent key-value store. Every
//! option has exactly one storage key; the enumerated key/default table
//! below exists only at the (de)serialization boundary, so the rest of the
//! crate reads typed fields instead of string-keyed lookups.

use crate::error::StorageError;
use crate::store::KeyValueStore;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

/// Version written into exported backup documents.
///
/// Import requires the field to be present but accepts any value.
pub const FORMAT_VERSION: u32 = 1;

/// Icon used for a freshly installed unit that reports no icons of its own.
pub const FALLBACK_UNIT_ICON: &str = "icons/unit-default.png";

/// What to do when a previously unknown unit is installed
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewUnitPolicy {
    /// Add the unit to every existing context
    AddToAll,
    /// Add the unit to the always-active set
    AddToAlwaysActive,
    /// Surface a decision request and leave the configuration alone
    Ask,
}

impl NewUnitPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            NewUnitPolicy::AddToAll => "add_to_all",
            NewUnitPolicy::AddToAlwaysActive => "add_to_always_active",
            NewUnitPolicy::Ask => "ask",
        }
    }
}

impl fmt::Display for NewUnitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NewUnitPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add_to_all" => Ok(NewUnitPolicy::AddToAll),
            "add_to_always_active" => Ok(NewUnitPolicy::AddToAlwaysActive),
            "ask" => Ok(NewUnitPolicy::Ask),
            _ => Err(()),
        }
    }
}

/// Storage keys for the option table
pub mod keys {
    pub const APPS_SUPPORTED: &str = "apps_supported";
    pub const NEW_UNIT_POLICY: &str = "new_unit_policy";
    pub const SHOW_ACTIVATE_ALL: &str = "show_activate_all";
    pub const TOGGLE_DELAY_MS: &str = "toggle_delay_ms";
    pub const FIRST_RUN: &str = "first_run";
    pub const HIGHLIGHT_UNGROUPED: &str = "highlight_ungrouped";
}

/// Key/default table used only when options cross the storage boundary.
pub const OPTION_DEFAULTS: &[(&str, &str)] = &[
    (keys::APPS_SUPPORTED, "false"),
    (keys::NEW_UNIT_POLICY, "ask"),
    (keys::SHOW_ACTIVATE_ALL, "true"),
    (keys::TOGGLE_DELAY_MS, "200"),
    (keys::FIRST_RUN, "true"),
    (keys::HIGHLIGHT_UNGROUPED, "false"),
];

/// User-tunable behavior options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Whether app-kind units participate in toggling
    pub apps_supported: bool,
    /// Reaction to a newly installed unit
    pub new_unit_policy: NewUnitPolicy,
    /// Whether quick-access surfaces show the enable-all control
    pub show_activate_all_control: bool,
    /// Delay between consecutive toggle calls during reconciliation
    pub toggle_delay_ms: u64,
    /// Set until the host has shown its first-run experience once
    pub first_run: bool,
    /// Editor hint: highlight units that belong to no context
    pub highlight_ungrouped: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            apps_supported: false,
            new_unit_policy: NewUnitPolicy::Ask,
            show_activate_all_control: true,
            toggle_delay_ms: 200,
            first_run: true,
            highlight_ungrouped: false,
        }
    }
}

fn parse_bool(key: &str, raw: &str, default: bool) -> bool {
    match raw {
        "true" => true,
        "false" => false,
        _ => {
            warn!(key, raw, "Unparseable stored option, using default");
            default
        }
    }
}

impl Options {
    /// Build options from stored entries, falling back to defaults for
    /// missing or unparseable values.
    pub fn from_entries(entries: &HashMap<String, String>) -> Self {
        let defaults = Options::default();
        let raw = |key: &str| entries.get(key).map(String::as_str);

        let apps_supported = raw(keys::APPS_SUPPORTED)
            .map(|v| parse_bool(keys::APPS_SUPPORTED, v, defaults.apps_supported))
            .unwrap_or(defaults.apps_supported);

        let new_unit_policy = raw(keys::NEW_UNIT_POLICY)
            .map(|v| {
                v.parse().unwrap_or_else(|_| {
                    warn!(
                        key = keys::NEW_UNIT_POLICY,
                        raw = v,
                        "Unparseable stored option, using default"
                    );
                    defaults.new_unit_policy
                })
            })
            .unwrap_or(defaults.new_unit_policy);

        let show_activate_all_control = raw(keys::SHOW_ACTIVATE_ALL)
            .map(|v| parse_bool(keys::SHOW_ACTIVATE_ALL, v, defaults.show_activate_all_control))
            .unwrap_or(defaults.show_activate_all_control);

        let toggle_delay_ms = raw(keys::TOGGLE_DELAY_MS)
            .map(|v| {
                v.parse().unwrap_or_else(|_| {
                    warn!(
                        key = keys::TOGGLE_DELAY_MS,
                        raw = v,
                        "Unparseable stored option, using default"
                    );
                    defaults.toggle_delay_ms
                })
            })
            .unwrap_or(defaults.toggle_delay_ms);

        let first_run = raw(keys::FIRST_RUN)
            .map(|v| parse_bool(keys::FIRST_RUN, v, defaults.first_run))
            .unwrap_or(defaults.first_run);

        let highlight_ungrouped = raw(keys::HIGHLIGHT_UNGROUPED)
            .map(|v| parse_bool(keys::HIGHLIGHT_UNGROUPED, v, defaults.highlight_ungrouped))
            .unwrap_or(defaults.highlight_ungrouped);

        Self {
            apps_supported,
            new_unit_policy,
            show_activate_all_control,
            toggle_delay_ms,
            first_run,
            highlight_ungrouped,
        }
    }

    /// Serialize every option to its storage entry.
    pub fn to_entries(&self) -> HashMap<String, String> {
        let mut entries = HashMap::new();
        entries.insert(
            keys::APPS_SUPPORTED.to_string(),
            self.apps_supported.to_string(),
        );
        entries.insert(
            keys::NEW_UNIT_POLICY.to_string(),
            self.new_unit_policy.to_string(),
        );
        entries.insert(
            keys::SHOW_ACTIVATE_ALL.to_string(),
            self.show_activate_all_control.to_string(),
        );
        entries.insert(
            keys::TOGGLE_DELAY_MS.to_string(),
            self.toggle_delay_ms.to_string(),
        );
        entries.insert(keys::FIRST_RUN.to_string(), self.first_run.to_string());
        entries.insert(
            keys::HIGHLIGHT_UNGROUPED.to_string(),
            self.highlight_ungrouped.to_string(),
        );
        entries
    }
}

/// In-memory options cache over the persistent store
///
/// The cache lock is never held across an await point; load and save copy
/// the options in and out around the store calls.
pub struct ConfigStore {
    store: Arc<dyn KeyValueStore>,
    options: RwLock<Options>,
}

impl ConfigStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            options: RwLock::new(Options::default()),
        }
    }

    /// Reload all options from the store
    ///
    /// A storage failure leaves the current cache in place and is reported
    /// to the caller after being logged; callers are free to ignore it.
    pub async fn load(&self) -> Result<(), StorageError> {
        let keys: Vec<&str> = OPTION_DEFAULTS.iter().map(|(key, _)| *key).collect();
        match self.store.get_multiple(&keys).await {
            Ok(entries) => {
                *self.options.write() = Options::from_entries(&entries);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to load options, keeping current values");
                Err(e)
            }
        }
    }

    /// Persist the full option table
    pub async fn save(&self) -> Result<(), StorageError> {
        let entries = self.options.read().to_entries();
        self.store.set_multiple(&entries).await
    }

    /// Snapshot of the current options
    pub fn options(&self) -> Options {
        self.options.read().clone()
    }

    /// Replace the cached options; callers persist via `save`.
    pub fn set_options(&self, options: Options) {
        *self.options.write() = options;
    }
}
