//! Database schema migrations for SQLite.
//!
//! Versioned migrations: each one transforms the schema from version N to
//! N+1 and is recorded in `schema_migrations`.

use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema. Idempotent.
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

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;
        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;
            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, unix_millis()],
            )?;
            tracing::debug!(version, "applied schema migration");
        }
        tx.commit()?;
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
///
/// Unsigned 64-bit values (revision, uint fields, timestamps, seq) are
/// stored bit-for-bit in SQLite's signed INTEGER.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- One row per consent instance
        CREATE TABLE instances (
            instance_id INTEGER PRIMARY KEY AUTOINCREMENT,
            revision INTEGER NOT NULL DEFAULT 0
        );

        -- Record fields, one row per present field
        CREATE TABLE consent_fields (
            instance_id INTEGER NOT NULL REFERENCES instances(instance_id) ON DELETE CASCADE,
            field TEXT NOT NULL,             -- field key, e.g. 'status'
            bytes_value BLOB,                -- set for byte fields
            uint_value INTEGER,              -- set for uint fields
            PRIMARY KEY (instance_id, field),
            CHECK ((bytes_value IS NULL) <> (uint_value IS NULL))
        );

        -- Append-only audit journal
        CREATE TABLE journal (
            instance_id INTEGER NOT NULL REFERENCES instances(instance_id) ON DELETE CASCADE,
            seq INTEGER NOT NULL,
            operation TEXT NOT NULL,
            caller BLOB NOT NULL,            -- 32 bytes
            at INTEGER NOT NULL,             -- seconds since epoch
            prev_hash BLOB,                  -- 32 bytes, NULL for seq 0
            state_hash BLOB NOT NULL,        -- 32 bytes, Blake3 of snapshot
            snapshot BLOB NOT NULL,          -- canonical CBOR record
            PRIMARY KEY (instance_id, seq)
        );
        "#,
    )?;

    Ok(())
}

fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
