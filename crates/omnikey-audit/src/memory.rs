//! In-memory audit log.
//!
//! Same semantics as the SQLite log, no persistence. Used by tests and by
//! deployments that only need the trail for the life of the process.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use omnikey_core::{Clock, Subject};
use omnikey_registry::{EventSink, RegistryEvent};

use crate::error::{AuditError, Result};
use crate::traits::{AuditLog, AuditRecord};

/// In-memory audit log. Thread-safe via RwLock.
pub struct MemoryAuditLog<K> {
    records: RwLock<Vec<AuditRecord<K>>>,
    clock: Arc<dyn Clock>,
    failures: AtomicU64,
}

impl<K: Subject> MemoryAuditLog<K> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            clock,
            failures: AtomicU64::new(0),
        }
    }

    fn select(&self, keep: impl Fn(&AuditRecord<K>) -> bool) -> Result<Vec<AuditRecord<K>>> {
        let records = self.records.read().map_err(|_| AuditError::Poisoned)?;
        Ok(records.iter().filter(|r| keep(r)).cloned().collect())
    }
}

impl<K: Subject> AuditLog<K> for MemoryAuditLog<K> {
    fn append(&self, event: &RegistryEvent<K>) -> Result<u64> {
        let mut records = self.records.write().map_err(|_| AuditError::Poisoned)?;
        let seq = records.len() as u64 + 1;
        records.push(AuditRecord {
            seq,
            recorded_at: self.clock.now(),
            event: event.clone(),
        });
        Ok(seq)
    }

    fn events(&self) -> Result<Vec<AuditRecord<K>>> {
        self.select(|_| true)
    }

    fn events_for(&self, subject: &K) -> Result<Vec<AuditRecord<K>>> {
        self.select(|r| r.event.subject().as_ref() == Some(subject))
    }

    fn events_named(&self, name: &str) -> Result<Vec<AuditRecord<K>>> {
        self.select(|r| r.event.name() == name)
    }

    fn len(&self) -> Result<u64> {
        Ok(self.records.read().map_err(|_| AuditError::Poisoned)?.len() as u64)
    }

    fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

impl<K: Subject> EventSink<K> for MemoryAuditLog<K> {
    fn record(&self, event: &RegistryEvent<K>) {
        if let Err(e) = self.append(event) {
            self.failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(event = event.name(), error = %e, "audit append failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omnikey_core::{Address, IdentityId, ManualClock};

    #[test]
    fn test_append_and_filter() {
        let clock = ManualClock::new(100);
        let log: MemoryAuditLog<IdentityId> = MemoryAuditLog::new(Arc::new(clock.clone()));

        log.record(&RegistryEvent::PauseToggled { paused: true });
        clock.advance(5);
        log.record(&RegistryEvent::KeysRotated {
            subject: IdentityId(1),
        });
        log.record(&RegistryEvent::PermitRevoked {
            subject: IdentityId(2),
            holder: Address::derive("h"),
            permitter: Address::derive("p"),
        });

        assert_eq!(log.len().unwrap(), 3);
        let for_one = log.events_for(&IdentityId(1)).unwrap();
        assert_eq!(for_one.len(), 1);
        assert_eq!(for_one[0].seq, 2);
        assert_eq!(for_one[0].recorded_at, 105);
        assert_eq!(log.events_named("pause_toggled").unwrap().len(), 1);
        assert_eq!(log.failures(), 0);
    }
}
