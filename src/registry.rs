//! Unit registry boundary.
//!
//! The registry owns the universe of installed units and is the only party
//! that actually flips a unit on or off. Install and uninstall
//! notifications are delivered by the host calling the corresponding
//! handler methods on the [`crate::api::Ensemble`] facade.

use crate::error::RegistryError;
use crate::types::{Unit, UnitId};
use async_trait::async_trait;

/// External unit registry contract
///
/// `set_enabled` may be refused or silently no-op on the registry side;
/// callers must not assume the requested state was reached.
#[async_trait]
pub trait UnitRegistry: Send + Sync {
    /// Enumerate all installed units with their current attributes.
    async fn list_units(&self) -> Result<Vec<Unit>, RegistryError>;

    /// Request that a unit be enabled or disabled.
    async fn set_enabled(&self, id: &UnitId, enable: bool) -> Result<(), RegistryError>;
}
