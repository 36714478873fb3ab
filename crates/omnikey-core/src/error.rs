//! Error types for Omnikey core primitives.

use thiserror::Error;

/// Coarse classification shared by every Omnikey error type.
///
/// Callers match on the kind to tell "already exists" apart from
/// "unauthorized" or "expired" without knowing which layer failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller is not allowed to invoke the entry point.
    Authorization,
    /// Resource already exists (or was already removed).
    Conflict,
    /// A component does not implement the interface it was wired as.
    CapabilityMismatch,
    /// A signature or permit timestamp has passed.
    Expired,
    /// Malformed arguments: mismatched batch lengths, zero lengths, bad encodings.
    Input,
    /// The referenced identity, attribute, or key does not exist.
    NotFound,
    /// Storage or encoding failure outside the caller's control.
    Internal,
}

/// Errors raised by core primitives.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("request expired at {expiry} (now {now})")]
    RequestExpired { expiry: i64, now: i64 },

    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("entropy request must be non-zero")]
    ZeroLengthEntropy,

    #[error("entropy source failure: {0}")]
    Entropy(String),

    #[error("encoding error: {0}")]
    Encoding(String),
}

impl CoreError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::InvalidSignature | CoreError::InvalidPublicKey => ErrorKind::Authorization,
            CoreError::RequestExpired { .. } => ErrorKind::Expired,
            CoreError::InvalidLength { .. } | CoreError::ZeroLengthEntropy => ErrorKind::Input,
            CoreError::Entropy(_) | CoreError::Encoding(_) => ErrorKind::Internal,
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
