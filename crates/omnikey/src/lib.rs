//! # Omnikey
//!
//! Identity registry, permitter delegation and signed-request key release.
//!
//! ## Overview
//!
//! Omnikey issues secret keys bound to identities and releases them only to
//! the identity's assignee or to accounts holding an unexpired permit:
//!
//! - **Registry**: maps assignees to identity handles and stores permits
//! - **Permitters**: policies (relayer allow-list, attestation) that grant
//!   and revoke permits, possibly through a chain of other permitters
//! - **Key store**: derives keys on creation and releases them against
//!   signed, domain-separated requests
//! - **Audit**: every registry event, kept in memory or in SQLite
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use omnikey::{Deployment, OmnikeyConfig};
//! use omnikey::core::{Address, Clock, KeyRequest, Keypair, SystemClock};
//!
//! # fn example() -> omnikey::Result<()> {
//! let owner = Address::derive("owner");
//! let deployment = Deployment::new(owner, OmnikeyConfig::default(), Arc::new(SystemClock))?;
//! let store = deployment.keystore();
//!
//! // Allow a registrant and a relayer.
//! let registrant = Address::derive("registrant");
//! store.registry().set_registrant(&owner, registrant, true)?;
//! deployment.relayer().policy().set_relayer(&owner, registrant, true)?;
//!
//! // Create an identity for Alice and let Bob read its key for an hour.
//! let alice = Keypair::generate();
//! let bob = Keypair::generate();
//! let id = store.create_identity(&registrant, &alice.address(), b"alice")?;
//! deployment
//!     .relayer()
//!     .acquire(&registrant, &[id], bob.address(), 3_600_000, b"", b"")?;
//!
//! // Bob signs a request and gets the key.
//! let expiry = deployment.clock().now() + 60_000;
//! let request = KeyRequest::new(id, bob.address(), expiry)
//!     .sign(store.verifier().domain(), &bob)?;
//! let key = store.get_key(&request)?;
//! # let _ = key;
//! # Ok(())
//! # }
//! ```
//!
//! ## Re-exports
//!
//! - `omnikey::core` - primitives (ids, signatures, entropy, clocks)
//! - `omnikey::registry` - registry, permits, events, directory
//! - `omnikey::permitter` - permitter driver and policies
//! - `omnikey::keystore` - key store and segment linker
//! - `omnikey::audit` - audit logs

pub mod config;
pub mod deployment;
pub mod error;
pub mod relay;

pub use config::{AuditConfig, EntropyMode, OmnikeyConfig, RetryPolicy};
pub use deployment::{component_address, Deployment};
pub use error::{OmnikeyError, Result};
pub use relay::{ensure_identity, IdentityGateway, LocalGateway};

// Re-export component crates
pub use omnikey_audit as audit;
pub use omnikey_core as core;
pub use omnikey_keystore as keystore;
pub use omnikey_permitter as permitter;
pub use omnikey_registry as registry;

// Re-export commonly used types
pub use omnikey_core::{Address, AssigneeHash, IdentityId, KeyRequest, Keypair, SecretKey, SignedKeyRequest};
pub use omnikey_keystore::KeyStore;
pub use omnikey_permitter::{Permitter, TrustedRelayer};
