//! Audit database schema migrations.
//!
//! Each migration transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{AuditError, Result};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema. Idempotent.
pub fn migrate(conn: &mut Connection, now: i64) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;
        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;
            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now],
            )?;
        }
        tx.commit()?;
        tracing::info!(from = current, to = CURRENT_VERSION, "audit schema migrated");
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(AuditError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// v1: event table.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE audit_events (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,               -- RegistryEvent::name
            subject BLOB,                     -- Subject::to_bytes, NULL for admin events
            recorded_at INTEGER NOT NULL,     -- Unix ms
            event BLOB NOT NULL               -- CBOR-encoded RegistryEvent
        );

        CREATE INDEX idx_audit_subject ON audit_events(subject);
        CREATE INDEX idx_audit_name ON audit_events(name);
        "#,
    )?;
    Ok(())
}
