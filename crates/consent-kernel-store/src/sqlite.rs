//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via `tokio::task::spawn_blocking`. Every commit
//! runs in one SQL transaction.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::{params, Connection, OptionalExtension, Transaction};

use consent_kernel_core::{
    Field, FieldMap, FieldUpdates, FieldValue, Identity, InstanceId, JournalEntry, JournalOp,
    StateHash, Timestamp,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{CommitResult, Store, StoredInstance};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

// SQLite INTEGER is signed; u64 values round-trip through a bit cast.
fn to_sql_u64(n: u64) -> i64 {
    n as i64
}

fn from_sql_u64(n: i64) -> u64 {
    n as u64
}

fn blob32(bytes: Vec<u8>, column: &str) -> Result<[u8; 32]> {
    bytes
        .try_into()
        .map_err(|_| StoreError::InvalidData(format!("{} is not 32 bytes", column)))
}

fn read_revision(tx: &Transaction<'_>, instance: InstanceId) -> Result<Option<u64>> {
    let revision: Option<i64> = tx
        .query_row(
            "SELECT revision FROM instances WHERE instance_id = ?1",
            params![to_sql_u64(instance.get())],
            |row| row.get(0),
        )
        .optional()?;
    Ok(revision.map(from_sql_u64))
}

fn journal_len(tx: &Transaction<'_>, instance: InstanceId) -> Result<u64> {
    let count: i64 = tx.query_row(
        "SELECT COUNT(*) FROM journal WHERE instance_id = ?1",
        params![to_sql_u64(instance.get())],
        |row| row.get(0),
    )?;
    Ok(from_sql_u64(count))
}

fn write_field(
    tx: &Transaction<'_>,
    instance: InstanceId,
    field: Field,
    value: Option<&FieldValue>,
) -> Result<()> {
    let id = to_sql_u64(instance.get());
    match value {
        None => {
            tx.execute(
                "DELETE FROM consent_fields WHERE instance_id = ?1 AND field = ?2",
                params![id, field.key()],
            )?;
        }
        Some(FieldValue::Bytes(b)) => {
            tx.execute(
                "INSERT OR REPLACE INTO consent_fields (instance_id, field, bytes_value, uint_value)
                 VALUES (?1, ?2, ?3, NULL)",
                params![id, field.key(), b.as_ref()],
            )?;
        }
        Some(FieldValue::Uint(n)) => {
            tx.execute(
                "INSERT OR REPLACE INTO consent_fields (instance_id, field, bytes_value, uint_value)
                 VALUES (?1, ?2, NULL, ?3)",
                params![id, field.key(), to_sql_u64(*n)],
            )?;
        }
    }
    Ok(())
}

fn insert_journal_entry(
    tx: &Transaction<'_>,
    instance: InstanceId,
    entry: &JournalEntry,
) -> Result<()> {
    let expected = journal_len(tx, instance)?;
    if entry.seq != expected {
        return Err(StoreError::JournalConflict {
            instance,
            seq: entry.seq,
            expected,
        });
    }

    tx.execute(
        "INSERT INTO journal (
            instance_id, seq, operation, caller, at, prev_hash, state_hash, snapshot
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            to_sql_u64(instance.get()),
            to_sql_u64(entry.seq),
            entry.operation.as_str(),
            entry.caller.as_bytes().as_slice(),
            to_sql_u64(entry.at.as_secs()),
            entry.prev_hash.as_ref().map(|h| h.as_bytes().to_vec()),
            entry.state_hash.as_bytes().as_slice(),
            entry.snapshot.as_ref(),
        ],
    )?;
    Ok(())
}

struct FieldRow {
    field: String,
    bytes_value: Option<Vec<u8>>,
    uint_value: Option<i64>,
}

fn read_field_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FieldRow> {
    Ok(FieldRow {
        field: row.get(0)?,
        bytes_value: row.get(1)?,
        uint_value: row.get(2)?,
    })
}

fn row_to_field(row: FieldRow) -> Result<(Field, FieldValue)> {
    let field = Field::from_key(&row.field)
        .ok_or_else(|| StoreError::InvalidData(format!("unknown field key: {}", row.field)))?;
    let value = match (row.bytes_value, row.uint_value) {
        (Some(b), None) => FieldValue::Bytes(Bytes::from(b)),
        (None, Some(n)) => FieldValue::Uint(from_sql_u64(n)),
        _ => {
            return Err(StoreError::InvalidData(format!(
                "field {} has no single value",
                field
            )))
        }
    };
    Ok((field, value))
}

struct JournalRow {
    seq: i64,
    operation: String,
    caller: Vec<u8>,
    at: i64,
    prev_hash: Option<Vec<u8>>,
    state_hash: Vec<u8>,
    snapshot: Vec<u8>,
}

fn row_to_entry(row: JournalRow) -> Result<JournalEntry> {
    let operation = JournalOp::from_name(&row.operation).ok_or_else(|| {
        StoreError::InvalidData(format!("unknown journal operation: {}", row.operation))
    })?;
    Ok(JournalEntry {
        seq: from_sql_u64(row.seq),
        operation,
        caller: Identity::from_bytes(blob32(row.caller, "caller")?),
        at: Timestamp(from_sql_u64(row.at)),
        prev_hash: row
            .prev_hash
            .map(|h| blob32(h, "prev_hash").map(StateHash::from_bytes))
            .transpose()?,
        state_hash: StateHash::from_bytes(blob32(row.state_hash, "state_hash")?),
        snapshot: Bytes::from(row.snapshot),
    })
}

const JOURNAL_COLUMNS: &str = "seq, operation, caller, at, prev_hash, state_hash, snapshot";

fn read_journal_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<JournalRow> {
    Ok(JournalRow {
        seq: row.get(0)?,
        operation: row.get(1)?,
        caller: row.get(2)?,
        at: row.get(3)?,
        prev_hash: row.get(4)?,
        state_hash: row.get(5)?,
        snapshot: row.get(6)?,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_instance(
        &self,
        fields: &FieldMap,
        entry: Option<&JournalEntry>,
    ) -> Result<InstanceId> {
        let fields = fields.clone();
        let entry = entry.cloned();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("INSERT INTO instances (revision) VALUES (0)", [])?;
            let id = InstanceId(from_sql_u64(tx.last_insert_rowid()));

            for (field, value) in &fields {
                write_field(&tx, id, *field, Some(value))?;
            }
            if let Some(entry) = &entry {
                insert_journal_entry(&tx, id, entry)?;
            }

            tx.commit()?;
            Ok(id)
        })
        .await
    }

    async fn load_fields(&self, instance: InstanceId) -> Result<Option<StoredInstance>> {
        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            let Some(revision) = read_revision(&tx, instance)? else {
                return Ok(None);
            };

            let rows = {
                let mut stmt = tx.prepare(
                    "SELECT field, bytes_value, uint_value FROM consent_fields
                     WHERE instance_id = ?1",
                )?;
                let rows = stmt
                    .query_map(params![to_sql_u64(instance.get())], read_field_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            };
            tx.commit()?;

            let fields = rows
                .into_iter()
                .map(row_to_field)
                .collect::<Result<FieldMap>>()?;
            Ok(Some(StoredInstance { fields, revision }))
        })
        .await
    }

    async fn get_field(&self, instance: InstanceId, field: Field) -> Result<Option<FieldValue>> {
        self.blocking(move |conn| {
            let row = conn
                .query_row(
                    "SELECT field, bytes_value, uint_value FROM consent_fields
                     WHERE instance_id = ?1 AND field = ?2",
                    params![to_sql_u64(instance.get()), field.key()],
                    read_field_row,
                )
                .optional()?;
            row.map(|r| row_to_field(r).map(|(_, v)| v)).transpose()
        })
        .await
    }

    async fn commit(
        &self,
        instance: InstanceId,
        expected_revision: u64,
        updates: &FieldUpdates,
        entry: Option<&JournalEntry>,
    ) -> Result<CommitResult> {
        let updates = updates.clone();
        let entry = entry.cloned();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            let Some(actual) = read_revision(&tx, instance)? else {
                return Ok(CommitResult::NotFound);
            };
            if actual != expected_revision {
                tracing::warn!(
                    %instance,
                    expected = expected_revision,
                    actual,
                    "commit against stale revision"
                );
                return Ok(CommitResult::Conflict {
                    expected: expected_revision,
                    actual,
                });
            }

            for (field, value) in updates.iter() {
                write_field(&tx, instance, field, value)?;
            }
            if let Some(entry) = &entry {
                insert_journal_entry(&tx, instance, entry)?;
            }

            let revision = actual + 1;
            tx.execute(
                "UPDATE instances SET revision = ?1 WHERE instance_id = ?2",
                params![to_sql_u64(revision), to_sql_u64(instance.get())],
            )?;

            // Dropping `tx` on any earlier `?` rolls everything back.
            tx.commit()?;
            Ok(CommitResult::Committed { revision })
        })
        .await
    }

    async fn destroy_instance(
        &self,
        instance: InstanceId,
        expected_revision: u64,
    ) -> Result<CommitResult> {
        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            let Some(actual) = read_revision(&tx, instance)? else {
                return Ok(CommitResult::NotFound);
            };
            if actual != expected_revision {
                return Ok(CommitResult::Conflict {
                    expected: expected_revision,
                    actual,
                });
            }

            let id = to_sql_u64(instance.get());
            tx.execute("DELETE FROM journal WHERE instance_id = ?1", params![id])?;
            tx.execute(
                "DELETE FROM consent_fields WHERE instance_id = ?1",
                params![id],
            )?;
            tx.execute("DELETE FROM instances WHERE instance_id = ?1", params![id])?;
            tx.commit()?;

            Ok(CommitResult::Committed {
                revision: actual + 1,
            })
        })
        .await
    }

    async fn journal(&self, instance: InstanceId) -> Result<Vec<JournalEntry>> {
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM journal WHERE instance_id = ?1 ORDER BY seq",
                JOURNAL_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![to_sql_u64(instance.get())], read_journal_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(row_to_entry).collect()
        })
        .await
    }

    async fn journal_head(&self, instance: InstanceId) -> Result<Option<JournalEntry>> {
        self.blocking(move |conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM journal WHERE instance_id = ?1
                         ORDER BY seq DESC LIMIT 1",
                        JOURNAL_COLUMNS
                    ),
                    params![to_sql_u64(instance.get())],
                    read_journal_row,
                )
                .optional()?;
            row.map(row_to_entry).transpose()
        })
        .await
    }

    async fn list_instances(&self) -> Result<Vec<InstanceId>> {
        self.blocking(|conn| {
            let mut stmt = conn.prepare("SELECT instance_id FROM instances ORDER BY instance_id")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, i64>(0))?
                .map(|id| id.map(|n| InstanceId(from_sql_u64(n))))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(ids)
        })
        .await
    }
}
