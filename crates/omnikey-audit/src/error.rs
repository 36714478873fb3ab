//! Error types for the audit log.

use omnikey_core::ErrorKind;
use thiserror::Error;

/// Errors that can occur while writing or reading the audit log.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Event serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// The connection lock was poisoned by a panicking writer.
    #[error("audit log lock poisoned")]
    Poisoned,
}

impl AuditError {
    /// Audit failures are never the caller's fault.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }
}

/// Result type for audit operations.
pub type Result<T> = std::result::Result<T, AuditError>;
