//! In-process event bus for host-facing side effects.
//!
//! The original surfaces (icon animation, desktop notifications) are out of
//! scope here; the core publishes the triggering events instead and the
//! embedding host renders whatever it likes.

use std::sync::mpsc::{channel, Receiver, Sender};

use crate::types::UnitId;
use tracing::debug;

/// Visual feedback hook kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackKind {
    /// A reconciliation episode started
    Reconciling,
    /// The persisted configuration changed and surfaces should reload
    ConfigUpdated,
}

/// Events published by the core for the host to render
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    /// A new unit was installed under the `ask` policy; the host should
    /// prompt the user for a grouping decision.
    DecisionRequested {
        id: UnitId,
        name: String,
        icon: String,
    },
    /// Visual feedback hook
    Feedback(FeedbackKind),
}

#[derive(Clone)]
pub struct EventBus {
    sender: Sender<CoreEvent>,
}

impl EventBus {
    pub fn new_pair() -> (Self, Receiver<CoreEvent>) {
        let (sender, receiver) = channel();
        (Self { sender }, receiver)
    }

    /// Publish an event; a disconnected receiver is tolerated.
    pub fn emit(&self, event: CoreEvent) {
        if self.sender.send(event).is_err() {
            debug!("Event receiver dropped, discarding event");
        }
    }
}
