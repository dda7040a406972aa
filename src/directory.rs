//! Context Directory
//!
//! CRUD over the ordered list of named contexts and their unit membership.
//! Mutations touch memory only; every mutation must be followed by an
//! explicit `save()` to survive a process restart. Member ids may dangle
//! (the unit was uninstalled later) and are tolerated everywhere.

use crate::error::{DirectoryError, StorageError};
use crate::store::{KeyValueStore, KEY_CONTEXTS};
use crate::types::UnitId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

/// A named group of unit ids
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    pub name: String,
    /// Host-interpreted image reference shown next to the name
    pub image: String,
    /// Whether quick-access surfaces show the image for this context
    #[serde(default)]
    pub show_icon: bool,
    #[serde(default)]
    pub members: Vec<UnitId>,
}

impl Context {
    pub fn new(name: impl Into<String>, image: impl Into<String>, show_icon: bool) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            show_icon,
            members: Vec::new(),
        }
    }

    pub fn is_member(&self, id: &str) -> bool {
        self.members.iter().any(|member| member == id)
    }
}

/// Activation state of a context relative to the live unit universe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextStatus {
    /// Every member is currently enabled
    Enabled,
    /// No member is currently enabled
    Disabled,
    /// Some members are enabled, some are not
    Partial,
}

/// Ordered collection of contexts backed by the persistent store
pub struct ContextDirectory {
    store: Arc<dyn KeyValueStore>,
    contexts: Vec<Context>,
}

impl ContextDirectory {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            contexts: Vec::new(),
        }
    }

    /// Reload the context list from the store
    ///
    /// A missing key or unreadable document starts the directory empty;
    /// storage problems are logged, never fatal.
    pub async fn load(&mut self) {
        match self.store.get(KEY_CONTEXTS).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Context>>(&raw) {
                Ok(contexts) => self.contexts = contexts,
                Err(e) => {
                    warn!(error = %e, "Stored context list is unreadable, starting empty");
                    self.contexts = Vec::new();
                }
            },
            Ok(None) => self.contexts = Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read context list, starting empty");
                self.contexts = Vec::new();
            }
        }
    }

    /// Persist the full context list as one document
    pub async fn save(&self) -> Result<(), StorageError> {
        let raw = serde_json::to_string(&self.contexts)?;
        self.store.set(KEY_CONTEXTS, &raw).await
    }

    /// Append a new, empty context
    pub fn create(
        &mut self,
        name: impl Into<String>,
        image: impl Into<String>,
        show_icon: bool,
    ) -> Result<(), DirectoryError> {
        let name = name.into();
        if self.exists(&name) {
            return Err(DirectoryError::DuplicateName(name));
        }
        self.contexts.push(Context::new(name, image, show_icon));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Context> {
        self.contexts.iter().find(|context| context.name == name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Add a unit to a context; no-op if already a member or the context
    /// does not exist.
    pub fn add_member(&mut self, name: &str, id: &str) {
        if let Some(context) = self.contexts.iter_mut().find(|c| c.name == name) {
            if !context.is_member(id) {
                context.members.push(id.to_string());
            }
        }
    }

    /// Remove a unit from a context; no-op if absent.
    pub fn remove_member(&mut self, name: &str, id: &str) {
        if let Some(context) = self.contexts.iter_mut().find(|c| c.name == name) {
            context.members.retain(|member| member != id);
        }
    }

    pub fn is_member(&self, name: &str, id: &str) -> bool {
        self.get(name).is_some_and(|context| context.is_member(id))
    }

    /// Add a unit to every context (idempotent per context).
    pub fn add_member_to_all(&mut self, id: &str) {
        for context in &mut self.contexts {
            if !context.is_member(id) {
                context.members.push(id.to_string());
            }
        }
    }

    /// Remove a unit from every context's membership (idempotent).
    pub fn remove_member_from_all(&mut self, id: &str) {
        for context in &mut self.contexts {
            context.members.retain(|member| member != id);
        }
    }

    /// Replace the whole ordered list (editor bulk-commit path)
    pub fn set_all(&mut self, contexts: Vec<Context>) {
        self.contexts = contexts;
    }

    pub fn contexts(&self) -> &[Context] {
        &self.contexts
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Classify every context against the set of currently enabled ids.
    ///
    /// Dangling member ids count as inactive. A context with no members
    /// reports `Enabled`.
    pub fn statuses(&self, enabled_ids: &HashSet<UnitId>) -> Vec<(String, ContextStatus)> {
        self.contexts
            .iter()
            .map(|context| {
                let active = context
                    .members
                    .iter()
                    .filter(|member| enabled_ids.contains(*member))
                    .count();
                let status = if active == context.members.len() {
                    ContextStatus::Enabled
                } else if active == 0 {
                    ContextStatus::Disabled
                } else {
                    ContextStatus::Partial
                };
                (context.name.clone(), status)
            })
            .collect()
    }
}
