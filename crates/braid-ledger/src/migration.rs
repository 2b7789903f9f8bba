//! Ledger schema versions.
//!
//! Version N is one SQL batch applied on top of N-1. Applied versions are
//! recorded in `schema_migrations`.

use rusqlite::Connection;

use crate::error::{LedgerError, Result};

/// Latest schema version this build knows.
pub const CURRENT_VERSION: u32 = 1;

/// Bring `conn` up to [`CURRENT_VERSION`]. Runs on every open.
pub fn migrate(conn: &mut Connection) -> Result<()> {
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
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
        tracing::debug!(from = current, to = CURRENT_VERSION, "ledger schema migrated");
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(LedgerError::Migration(format!(
            "no migration for schema version {}",
            version
        ))),
    }
}

/// v1: the ordered log plus membership.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- The global log. The rowid is the topological order.
        CREATE TABLE snapshots (
            topological_order INTEGER PRIMARY KEY AUTOINCREMENT,
            hash BLOB NOT NULL UNIQUE,           -- 32 bytes, Blake3 of canonical bytes
            node_id BLOB NOT NULL,               -- 32 bytes
            round_number INTEGER NOT NULL,
            canonical BLOB NOT NULL,             -- canonical CBOR encoding
            persisted_at INTEGER NOT NULL        -- local Unix ms
        );

        -- Membership
        CREATE TABLE nodes (
            node_id BLOB PRIMARY KEY,
            active INTEGER NOT NULL DEFAULT 1,   -- 1=member, 0=removed
            updated_at INTEGER NOT NULL
        );

        CREATE INDEX idx_snapshots_node_round
            ON snapshots(node_id, round_number, topological_order);
        "#,
    )?;

    Ok(())
}

/// Current time in milliseconds.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
