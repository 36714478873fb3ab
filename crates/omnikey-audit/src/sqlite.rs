//! SQLite audit log.
//!
//! Events are CBOR-encoded into a single table with the event name and
//! subject bytes broken out for indexed lookups.

use std::marker::PhantomData;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, ToSql};

use omnikey_core::{Clock, Subject};
use omnikey_registry::{EventSink, RegistryEvent};

use crate::error::{AuditError, Result};
use crate::migration;
use crate::traits::{AuditLog, AuditRecord};

/// SQLite-backed audit log. Thread-safe via internal Mutex.
pub struct SqliteAuditLog<K> {
    conn: Arc<Mutex<Connection>>,
    clock: Arc<dyn Clock>,
    failures: AtomicU64,
    _subject: PhantomData<fn() -> K>,
}

fn encode<K: Subject>(event: &RegistryEvent<K>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(event, &mut buf).map_err(|e| AuditError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn decode<K: Subject>(bytes: &[u8]) -> Result<RegistryEvent<K>> {
    ciborium::from_reader(bytes).map_err(|e| AuditError::Serialization(e.to_string()))
}

impl<K: Subject> SqliteAuditLog<K> {
    /// Open (or create) a log at `path`, running migrations.
    pub fn open(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn, clock)
    }

    /// Open an in-memory log.
    pub fn open_memory(clock: Arc<dyn Clock>) -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, clock)
    }

    fn from_connection(mut conn: Connection, clock: Arc<dyn Clock>) -> Result<Self> {
        migration::migrate(&mut conn, clock.now())?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            clock,
            failures: AtomicU64::new(0),
            _subject: PhantomData,
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|_| AuditError::Poisoned)?;
        f(&conn)
    }

    fn query(&self, filter: &str, args: &[&dyn ToSql]) -> Result<Vec<AuditRecord<K>>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT seq, recorded_at, event FROM audit_events {} ORDER BY seq",
                filter
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(args, |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                ))
            })?;

            let mut records = Vec::new();
            for row in rows {
                let (seq, recorded_at, bytes) = row?;
                records.push(AuditRecord {
                    seq: seq as u64,
                    recorded_at,
                    event: decode(&bytes)?,
                });
            }
            Ok(records)
        })
    }
}

impl<K: Subject> AuditLog<K> for SqliteAuditLog<K> {
    fn append(&self, event: &RegistryEvent<K>) -> Result<u64> {
        let bytes = encode(event)?;
        let subject = event.subject().map(|s| s.to_bytes());
        let now = self.clock.now();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO audit_events (name, subject, recorded_at, event) VALUES (?1, ?2, ?3, ?4)",
                params![event.name(), subject, now, bytes],
            )?;
            Ok(conn.last_insert_rowid() as u64)
        })
    }

    fn events(&self) -> Result<Vec<AuditRecord<K>>> {
        self.query("", &[])
    }

    fn events_for(&self, subject: &K) -> Result<Vec<AuditRecord<K>>> {
        let bytes = subject.to_bytes();
        self.query("WHERE subject = ?1", &[&bytes])
    }

    fn events_named(&self, name: &str) -> Result<Vec<AuditRecord<K>>> {
        self.query("WHERE name = ?1", &[&name])
    }

    fn len(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM audit_events", [], |row| row.get(0))?;
            Ok(count as u64)
        })
    }

    fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

impl<K: Subject> EventSink<K> for SqliteAuditLog<K> {
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
    use omnikey_core::{Address, AssigneeHash, AttributeId, Blake3Hash, IdentityId, ManualClock};
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn created(id: u128) -> RegistryEvent<IdentityId> {
        RegistryEvent::SubjectCreated {
            subject: IdentityId(id),
            assignee: AssigneeHash::of_name("a"),
        }
    }

    #[test]
    fn test_append_and_query() {
        let log: SqliteAuditLog<IdentityId> =
            SqliteAuditLog::open_memory(Arc::new(ManualClock::new(42))).unwrap();
        log.record(&created(1));
        log.record(&RegistryEvent::PermitterUpdated {
            permitter: Address::derive("p"),
            allowed: true,
        });
        log.record(&RegistryEvent::PermitGranted {
            subject: IdentityId(1),
            holder: Address::derive("h"),
            expiry: 99,
            permitter: Address::derive("p"),
        });

        assert_eq!(log.len().unwrap(), 3);
        let events = log.events().unwrap();
        assert_eq!(events[0].event, created(1));
        assert_eq!(events[2].seq, 3);
        assert_eq!(events[2].recorded_at, 42);

        let for_one = log.events_for(&IdentityId(1)).unwrap();
        assert_eq!(for_one.len(), 2);
        assert_eq!(log.events_named("permitter_updated").unwrap().len(), 1);
    }

    #[test]
    fn test_attribute_events() {
        let log: SqliteAuditLog<AttributeId> =
            SqliteAuditLog::open_memory(Arc::new(ManualClock::new(0))).unwrap();
        let attr = AttributeId([7; 32]);
        let segment = Blake3Hash::hash(b"eu");
        log.record(&RegistryEvent::SegmentLinked {
            subject: attr,
            segment,
        });

        let events = log.events_for(&attr).unwrap();
        assert_eq!(
            events[0].event,
            RegistryEvent::SegmentLinked {
                subject: attr,
                segment
            }
        );
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.db");
        {
            let log: SqliteAuditLog<IdentityId> =
                SqliteAuditLog::open(&path, Arc::new(ManualClock::new(0))).unwrap();
            log.record(&created(5));
        }

        let log: SqliteAuditLog<IdentityId> =
            SqliteAuditLog::open(&path, Arc::new(ManualClock::new(0))).unwrap();
        assert_eq!(log.len().unwrap(), 1);
        assert_eq!(log.events_for(&IdentityId(5)).unwrap().len(), 1);
    }

    proptest! {
        #[test]
        fn events_for_partitions_log(ids in prop::collection::vec(1u128..5, 1..24)) {
            let log: SqliteAuditLog<IdentityId> =
                SqliteAuditLog::open_memory(Arc::new(ManualClock::new(0))).unwrap();
            for id in &ids {
                log.record(&RegistryEvent::KeysRotated { subject: IdentityId(*id) });
            }
            let mut total = 0;
            for id in 1u128..5 {
                let found = log.events_for(&IdentityId(id)).unwrap();
                prop_assert_eq!(found.len(), ids.iter().filter(|x| **x == id).count());
                prop_assert!(found.windows(2).all(|w| w[0].seq < w[1].seq));
                total += found.len();
            }
            prop_assert_eq!(total as u64, log.len().unwrap());
        }
    }
}
