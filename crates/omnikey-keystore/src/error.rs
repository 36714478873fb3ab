//! Error types for the key store.

use omnikey_core::{Address, CoreError, ErrorKind};
use omnikey_registry::RegistryError;
use thiserror::Error;

/// Errors that can occur during key store operations.
#[derive(Debug, Error)]
pub enum KeyStoreError {
    /// Signer is neither the assignee nor a permit holder.
    #[error("not authorized: {0}")]
    NotAuthorized(Address),

    /// Signer differs from the declared requester.
    #[error("signer {signer} does not match requester {requester}")]
    SignerMismatch { signer: Address, requester: Address },

    /// The signer's permit has expired.
    #[error("permit expired at {expiry} (now {now})")]
    PermitExpired { expiry: i64, now: i64 },

    /// A secondary key is already provisioned.
    #[error("secondary key already provisioned for {0}")]
    SecondaryKeyExists(String),

    /// No secondary key is provisioned.
    #[error("no secondary key for {0}")]
    NoSecondaryKey(String),

    /// No primary key is stored.
    #[error("no key for {0}")]
    KeyNotProvisioned(String),

    /// Predecessor has no subject for the assignee.
    #[error("assignee unknown to predecessor")]
    UnknownAssignee,

    /// Auto migration was attempted without a predecessor.
    #[error("no predecessor configured")]
    NoPredecessor,

    /// Caller is neither the owner nor the attribute's vendor.
    #[error("not owner or vendor: {0}")]
    NotOwnerOrVendor(Address),

    /// The segment is already linked.
    #[error("segment already linked")]
    SegmentExists,

    /// The segment is not linked.
    #[error("segment not linked")]
    SegmentNotLinked,

    /// Malformed arguments.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Registry error.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Core error (signature, expiry, entropy).
    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

impl KeyStoreError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            KeyStoreError::NotAuthorized(_)
            | KeyStoreError::SignerMismatch { .. }
            | KeyStoreError::NotOwnerOrVendor(_) => ErrorKind::Authorization,
            KeyStoreError::PermitExpired { .. } => ErrorKind::Expired,
            KeyStoreError::SecondaryKeyExists(_) | KeyStoreError::SegmentExists => {
                ErrorKind::Conflict
            }
            KeyStoreError::NoSecondaryKey(_)
            | KeyStoreError::KeyNotProvisioned(_)
            | KeyStoreError::UnknownAssignee
            | KeyStoreError::SegmentNotLinked => ErrorKind::NotFound,
            KeyStoreError::NoPredecessor => ErrorKind::CapabilityMismatch,
            KeyStoreError::InvalidArgument(_) => ErrorKind::Input,
            KeyStoreError::Registry(e) => e.kind(),
            KeyStoreError::Core(e) => e.kind(),
        }
    }
}

/// Result type for key store operations.
pub type Result<T> = std::result::Result<T, KeyStoreError>;
