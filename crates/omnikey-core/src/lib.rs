//! # Omnikey Core
//!
//! Pure primitives for Omnikey: identifiers, signatures, signed key requests,
//! entropy and capability probing.
//!
//! This crate contains no registry state and no I/O beyond reading the OS
//! random number generator and the system clock.
//!
//! ## Key Types
//!
//! - [`Address`] - an account (Ed25519 verifying key) or component address
//! - [`IdentityId`] / [`AttributeId`] - registry subjects, see [`Subject`]
//! - [`SecretKey`] - key material, zeroized on drop
//! - [`SignedKeyRequest`] / [`RequestVerifier`] - domain-separated key requests
//! - [`EntropySource`] - [`OsEntropy`] or the public [`HashChainEntropy`] fallback
//! - [`Component`] - capability probe answered by registries and permitters

pub mod canonical;
pub mod capability;
pub mod clock;
pub mod crypto;
pub mod entropy;
pub mod error;
pub mod request;
pub mod types;

pub use capability::{Component, Interface, Upstream, UpstreamKind};
pub use clock::{Clock, ManualClock, SystemClock};
pub use crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature, Keypair};
pub use entropy::{EntropySource, HashChainEntropy, OsEntropy};
pub use error::{CoreError, ErrorKind, Result};
pub use request::{KeyRequest, RequestVerifier, SignedKeyRequest, SigningDomain};
pub use types::{Address, AssigneeHash, AttributeId, IdentityId, SecretKey, Subject};
