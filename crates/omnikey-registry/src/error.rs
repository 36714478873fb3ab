//! Error types for the registry.

use omnikey_core::{Address, CoreError, ErrorKind};
use thiserror::Error;

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Caller is not the registry owner.
    #[error("not owner: {0}")]
    NotOwner(Address),

    /// Caller is not an allow-listed registrant.
    #[error("not a registrant: {0}")]
    NotRegistrant(Address),

    /// Caller is not an allow-listed permitter.
    #[error("not a permitter: {0}")]
    NotPermitter(Address),

    /// Entry point requires the registry to be paused.
    #[error("registry is not paused")]
    NotPaused,

    /// Component failed the capability probe.
    #[error("unsupported interface at {0}")]
    UnsupportedInterface(Address),

    /// No component is deployed at this address.
    #[error("no component at {0}")]
    UnknownComponent(Address),

    /// Another component is already wired at this address.
    #[error("address already in use: {0}")]
    AddressTaken(Address),

    /// The assignee already maps to a subject.
    #[error("assignee already registered")]
    AssigneeExists,

    /// The subject handle is already registered.
    #[error("subject already registered: {0}")]
    SubjectExists(String),

    /// The subject handle is not registered.
    #[error("subject not registered: {0}")]
    NotRegistered(String),

    /// The zero handle or zero holder was supplied.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Core error (entropy, encoding).
    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

impl RegistryError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::NotOwner(_)
            | RegistryError::NotRegistrant(_)
            | RegistryError::NotPermitter(_)
            | RegistryError::NotPaused => ErrorKind::Authorization,
            RegistryError::UnsupportedInterface(_) | RegistryError::UnknownComponent(_) => {
                ErrorKind::CapabilityMismatch
            }
            RegistryError::AddressTaken(_)
            | RegistryError::AssigneeExists
            | RegistryError::SubjectExists(_) => ErrorKind::Conflict,
            RegistryError::NotRegistered(_) => ErrorKind::NotFound,
            RegistryError::InvalidArgument(_) => ErrorKind::Input,
            RegistryError::Core(e) => e.kind(),
        }
    }
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
