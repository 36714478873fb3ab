//! Error types for permitters.

use omnikey_core::{Address, CoreError, ErrorKind};
use omnikey_registry::RegistryError;
use thiserror::Error;

/// Errors that can occur while acquiring, releasing or migrating permits.
#[derive(Debug, Error)]
pub enum PermitterError {
    /// Caller is not the permitter owner.
    #[error("not owner: {0}")]
    NotOwner(Address),

    /// Caller is not an allow-listed relayer.
    #[error("not a relayer: {0}")]
    NotRelayer(Address),

    /// The attestation verifier rejected the proof.
    #[error("attestation rejected")]
    AttestationRejected,

    /// The attested measurements do not match the expected selector.
    #[error("measurement mismatch")]
    MeasurementMismatch,

    /// Upstream answers neither the registry nor the permitter probe.
    #[error("unsupported upstream at {0}")]
    UnsupportedUpstream(Address),

    /// Walking the upstream chain did not reach a registry in time.
    #[error("no registry within {hops} upstream hops")]
    UpstreamCycle { hops: usize },

    /// Empty batch, non-positive duration and the like.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Registry rejected the call.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

impl PermitterError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PermitterError::NotOwner(_)
            | PermitterError::NotRelayer(_)
            | PermitterError::AttestationRejected
            | PermitterError::MeasurementMismatch => ErrorKind::Authorization,
            PermitterError::UnsupportedUpstream(_) | PermitterError::UpstreamCycle { .. } => {
                ErrorKind::CapabilityMismatch
            }
            PermitterError::InvalidArgument(_) => ErrorKind::Input,
            PermitterError::Registry(e) => e.kind(),
            PermitterError::Core(e) => e.kind(),
        }
    }
}

/// Result type for permitter operations.
pub type Result<T> = std::result::Result<T, PermitterError>;
