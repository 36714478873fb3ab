//! # Omnikey Permitter
//!
//! Pluggable authorization in front of a registry.
//!
//! A [`Permitter`] pairs a [`PermitPolicy`] with a fixed upstream. The
//! upstream is either the registry itself or another permitter; the chain is
//! walked once at construction, bounded by
//! [`PermitterConfig::max_upstream_hops`], to find the terminal registry.
//!
//! ## Policies
//!
//! - [`TrustedRelayer`] - owner-managed relayer allow-list, plus batch
//!   migration with per-record outcomes
//! - [`Attested`] - remote attestation matching a [`MeasurementSelector`]

pub mod attested;
pub mod error;
pub mod permitter;
pub mod policy;
pub mod relayer;

pub use attested::{AttestationVerifier, Attested, MeasurementSelector, Verdict};
pub use error::{PermitterError, Result};
pub use permitter::{probe_upstream, resolve_registry, Permitter, PermitterConfig};
pub use policy::{PermitContext, PermitPolicy};
pub use relayer::{MigrationOutcome, MigrationRecord, TrustedRelayer};
