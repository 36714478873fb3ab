//! # Omnikey Audit
//!
//! Durable history of registry events.
//!
//! An [`AuditLog`] is an [`EventSink`](omnikey_registry::EventSink) that keeps
//! what it receives. [`MemoryAuditLog`] keeps events for the life of the
//! process; [`SqliteAuditLog`] stores them CBOR-encoded in SQLite with a
//! versioned schema.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{AuditError, Result};
pub use memory::MemoryAuditLog;
pub use sqlite::SqliteAuditLog;
pub use traits::{AuditLog, AuditRecord};
