//! # Omnikey Testkit
//!
//! Testing utilities for Omnikey.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a wired [`TestWorld`] (key store, relayer permitter, audit
//!   log, manual clock) and deterministic accounts
//! - **Generators**: Proptest strategies for ids, keys and permit lifecycles
//!
//! ## Test Fixtures
//!
//! ```rust
//! use omnikey_testkit::{accounts, TestWorld};
//!
//! let world = TestWorld::new();
//! let parties = accounts(2);
//! let id = world.create_identity(&parties[0]);
//! world.grant(id, parties[1].address(), 60_000);
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use omnikey_testkit::PermitStep;
//!
//! proptest! {
//!     #[test]
//!     fn permits_follow_model(steps in prop::collection::vec(any::<PermitStep>(), 1..32)) {
//!         // drive a TestWorld and compare against a model
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{accounts, init_tracing, TestWorld, GENESIS};
pub use generators::{PermitStep, HOLDER_POOL};
