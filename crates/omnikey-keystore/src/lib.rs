//! # Omnikey Key Store
//!
//! Secret key material gated by signed requests.
//!
//! A [`KeyStore`] is a registry (see `omnikey-registry`) whose subjects carry
//! a primary key and optionally a secondary key. Keys are derived from the
//! store's entropy source on creation and wiped when the subject is
//! destroyed. [`SegmentLinker`] is the attribute variant with vendor-owned
//! segment keys.
//!
//! ## Release rules
//!
//! A signed key request is honored when it verifies under the store's
//! signing domain, has not expired, and either
//! - the signer is the subject's assignee, or
//! - the signer is the declared requester and holds an unexpired permit.

pub mod error;
pub mod keystore;
pub mod segment;
pub mod slots;

pub use error::{KeyStoreError, Result};
pub use keystore::{KeyStore, KeyStoreConfig, PredecessorStore};
pub use segment::SegmentLinker;
pub use slots::KeySlots;
