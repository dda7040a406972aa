//! Core data model for externally managed units.
//!
//! Units are owned by the unit registry; this crate reads their attributes
//! and requests toggles but never mutates them directly.

use serde::{Deserialize, Serialize};

/// Opaque, stable identifier assigned to a unit by its registry.
pub type UnitId = String;

/// Kind of a toggleable unit.
///
/// Themes are never toggled by this crate; apps are toggled only when app
/// support is enabled in the options.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Ordinary,
    App,
    Theme,
}

/// Reference to one icon rendition of a unit, ordered smallest to largest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IconRef {
    pub url: String,
}

/// A toggleable unit as reported by the unit registry.
///
/// `enabled` is authoritative only at the registry; the copy held here is a
/// snapshot taken at the last inventory refresh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Unit {
    pub id: UnitId,
    pub name: String,
    #[serde(default)]
    pub icon_refs: Vec<IconRef>,
    pub kind: UnitKind,
    pub enabled: bool,
    pub may_disable: bool,
}

impl Unit {
    /// Best available icon: the last (largest) rendition, if any.
    pub fn best_icon(&self) -> Option<&str> {
        self.icon_refs.last().map(|icon| icon.url.as_str())
    }
}
