//! Error types for Omnikey deployments.

use omnikey_audit::AuditError;
use omnikey_core::{CoreError, ErrorKind};
use omnikey_keystore::KeyStoreError;
use omnikey_permitter::PermitterError;
use omnikey_registry::RegistryError;
use thiserror::Error;

/// Errors that can occur while wiring or driving a deployment.
#[derive(Debug, Error)]
pub enum OmnikeyError {
    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Registry error.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Permitter error.
    #[error("permitter error: {0}")]
    Permitter(#[from] PermitterError),

    /// Key store error.
    #[error("key store error: {0}")]
    KeyStore(#[from] KeyStoreError),

    /// Audit log error.
    #[error("audit error: {0}")]
    Audit(#[from] AuditError),

    /// Configuration could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    /// A gateway call failed for reasons outside the registry.
    #[error("gateway error: {0}")]
    Gateway(String),
}

impl OmnikeyError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            OmnikeyError::Core(e) => e.kind(),
            OmnikeyError::Registry(e) => e.kind(),
            OmnikeyError::Permitter(e) => e.kind(),
            OmnikeyError::KeyStore(e) => e.kind(),
            OmnikeyError::Audit(e) => e.kind(),
            OmnikeyError::Config(_) => ErrorKind::Input,
            OmnikeyError::Gateway(_) => ErrorKind::Internal,
        }
    }

    /// Whether retrying the same call may succeed.
    ///
    /// Authorization failures and conflicts never change on retry.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Internal
    }
}

impl From<serde_json::Error> for OmnikeyError {
    fn from(e: serde_json::Error) -> Self {
        OmnikeyError::Config(e.to_string())
    }
}

impl From<std::io::Error> for OmnikeyError {
    fn from(e: std::io::Error) -> Self {
        OmnikeyError::Config(e.to_string())
    }
}

/// Result type for deployment operations.
pub type Result<T> = std::result::Result<T, OmnikeyError>;
