//! In-memory implementation of the Store trait.
//!
//! Same semantics as SQLite, no persistence. Commits stage the writes on a
//! copy of the field map and swap it in while holding the write lock.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use consent_kernel_core::{Field, FieldMap, FieldUpdates, FieldValue, InstanceId, JournalEntry};

use crate::error::{Result, StoreError};
use crate::traits::{CommitResult, Store, StoredInstance};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    instances: BTreeMap<InstanceId, MemoryInstance>,

    /// Last id handed out.
    last_id: u64,
}

struct MemoryInstance {
    fields: FieldMap,
    revision: u64,
    journal: Vec<JournalEntry>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner.write().map_err(|_| StoreError::LockPoisoned)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn check_journal_seq(instance: InstanceId, entry: &JournalEntry, len: usize) -> Result<()> {
    let expected = len as u64;
    if entry.seq != expected {
        return Err(StoreError::JournalConflict {
            instance,
            seq: entry.seq,
            expected,
        });
    }
    Ok(())
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_instance(
        &self,
        fields: &FieldMap,
        entry: Option<&JournalEntry>,
    ) -> Result<InstanceId> {
        let mut inner = self.write()?;
        let id = InstanceId(inner.last_id + 1);
        if let Some(entry) = entry {
            check_journal_seq(id, entry, 0)?;
        }

        inner.last_id = id.get();
        inner.instances.insert(
            id,
            MemoryInstance {
                fields: fields.clone(),
                revision: 0,
                journal: entry.cloned().into_iter().collect(),
            },
        );
        Ok(id)
    }

    async fn load_fields(&self, instance: InstanceId) -> Result<Option<StoredInstance>> {
        let inner = self.read()?;
        Ok(inner.instances.get(&instance).map(|i| StoredInstance {
            fields: i.fields.clone(),
            revision: i.revision,
        }))
    }

    async fn get_field(&self, instance: InstanceId, field: Field) -> Result<Option<FieldValue>> {
        let inner = self.read()?;
        Ok(inner
            .instances
            .get(&instance)
            .and_then(|i| i.fields.get(&field).cloned()))
    }

    async fn commit(
        &self,
        instance: InstanceId,
        expected_revision: u64,
        updates: &FieldUpdates,
        entry: Option<&JournalEntry>,
    ) -> Result<CommitResult> {
        let mut inner = self.write()?;
        let Some(stored) = inner.instances.get_mut(&instance) else {
            return Ok(CommitResult::NotFound);
        };
        if stored.revision != expected_revision {
            return Ok(CommitResult::Conflict {
                expected: expected_revision,
                actual: stored.revision,
            });
        }
        if let Some(entry) = entry {
            check_journal_seq(instance, entry, stored.journal.len())?;
        }

        let mut staged = stored.fields.clone();
        updates.apply_to(&mut staged);

        stored.fields = staged;
        stored.revision += 1;
        if let Some(entry) = entry {
            stored.journal.push(entry.clone());
        }
        Ok(CommitResult::Committed {
            revision: stored.revision,
        })
    }

    async fn destroy_instance(
        &self,
        instance: InstanceId,
        expected_revision: u64,
    ) -> Result<CommitResult> {
        let mut inner = self.write()?;
        let Some(stored) = inner.instances.get(&instance) else {
            return Ok(CommitResult::NotFound);
        };
        if stored.revision != expected_revision {
            return Ok(CommitResult::Conflict {
                expected: expected_revision,
                actual: stored.revision,
            });
        }
        let revision = stored.revision + 1;
        inner.instances.remove(&instance);
        Ok(CommitResult::Committed { revision })
    }

    async fn journal(&self, instance: InstanceId) -> Result<Vec<JournalEntry>> {
        let inner = self.read()?;
        Ok(inner
            .instances
            .get(&instance)
            .map(|i| i.journal.clone())
            .unwrap_or_default())
    }

    async fn journal_head(&self, instance: InstanceId) -> Result<Option<JournalEntry>> {
        let inner = self.read()?;
        Ok(inner
            .instances
            .get(&instance)
            .and_then(|i| i.journal.last().cloned()))
    }

    async fn list_instances(&self) -> Result<Vec<InstanceId>> {
        let inner = self.read()?;
        Ok(inner.instances.keys().copied().collect())
    }
}
