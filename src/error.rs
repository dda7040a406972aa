//! Error types for the context-driven activation core.

use thiserror::Error;

/// Storage-related errors
///
/// Failures at the persistent store boundary are logged and the affected
/// component falls back to defaults; they are never fatal to the process.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Stored value is not valid JSON: {0}")]
    InvalidValue(#[from] serde_json::Error),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Unit registry errors
///
/// Only enumeration failures propagate; toggle failures are logged and
/// skipped by the reconciliation engine.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Unit not found: {0}")]
    UnitNotFound(String),

    #[error("Registry call failed: {0}")]
    CallFailed(String),
}

/// Context directory errors
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("A context named '{0}' already exists")]
    DuplicateName(String),
}

/// Reconciliation engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("A reconciliation is already in progress")]
    Busy,

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Backup import errors
///
/// Any of these leaves the configuration untouched.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Backup string is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Backup document is not valid JSON: {0}")]
    Parse(String),

    #[error("Backup document is missing required field '{0}'")]
    MissingField(&'static str),
}
