//! AuditLog trait: the interface for durable event history.
//!
//! Every audit log is also an [`EventSink`], so it can be handed straight to
//! a registry or key store. Sink delivery cannot fail the registry call that
//! produced the event: write errors are logged and counted instead.

use omnikey_core::Subject;
use omnikey_registry::{EventSink, RegistryEvent};

use crate::error::Result;

/// One stored event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord<K> {
    /// Position in the log, starting at 1.
    pub seq: u64,
    /// Local time the event was recorded (Unix ms).
    pub recorded_at: i64,
    pub event: RegistryEvent<K>,
}

/// Append-only history of registry events.
pub trait AuditLog<K: Subject>: EventSink<K> {
    /// Append an event. Returns its sequence number.
    fn append(&self, event: &RegistryEvent<K>) -> Result<u64>;

    /// All events, oldest first.
    fn events(&self) -> Result<Vec<AuditRecord<K>>>;

    /// Events about `subject`, oldest first.
    fn events_for(&self, subject: &K) -> Result<Vec<AuditRecord<K>>>;

    /// Events with the given name (see [`RegistryEvent::name`]).
    fn events_named(&self, name: &str) -> Result<Vec<AuditRecord<K>>>;

    /// Number of stored events.
    fn len(&self) -> Result<u64>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Number of events that could not be written.
    fn failures(&self) -> u64;
}
