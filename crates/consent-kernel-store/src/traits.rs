//! Store trait: the abstract interface for consent state persistence.
//!
//! A store holds any number of consent instances. Each instance is one
//! record, kept as a flat set of fields, plus its audit journal.

use async_trait::async_trait;

use consent_kernel_core::{Field, FieldMap, FieldUpdates, FieldValue, InstanceId, JournalEntry};

use crate::error::Result;

/// An instance's fields together with its revision.
///
/// The revision starts at 0 on creation and increases by one on every
/// commit. It is the store's optimistic concurrency token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredInstance {
    pub fields: FieldMap,
    pub revision: u64,
}

/// Result of a commit or destroy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitResult {
    /// All writes landed; the instance is now at `revision`.
    Committed { revision: u64 },
    /// Nothing was written: the instance moved past `expected`.
    Conflict { expected: u64, actual: u64 },
    /// Nothing was written: no such instance.
    NotFound,
}

/// The Store trait: async interface for consent state persistence.
///
/// # Atomicity
///
/// `commit` applies every field write and appends the journal entry (when
/// given) as one unit. Either all of it is visible afterwards or none of it
/// is. A commit against a stale revision writes nothing.
#[async_trait]
pub trait Store: Send + Sync {
    /// Allocate a new instance with initial fields.
    ///
    /// Instance ids are assigned by the store and never reused, even after
    /// the instance is destroyed.
    async fn create_instance(
        &self,
        fields: &FieldMap,
        entry: Option<&JournalEntry>,
    ) -> Result<InstanceId>;

    /// Load all fields of an instance.
    async fn load_fields(&self, instance: InstanceId) -> Result<Option<StoredInstance>>;

    /// Read a single field. `None` if the field or the instance is absent.
    async fn get_field(&self, instance: InstanceId, field: Field) -> Result<Option<FieldValue>>;

    /// Apply field writes and append a journal entry atomically.
    ///
    /// A journal entry must carry `seq` equal to the journal length, or the
    /// commit fails with [`StoreError::JournalConflict`] and writes nothing.
    ///
    /// [`StoreError::JournalConflict`]: crate::StoreError::JournalConflict
    async fn commit(
        &self,
        instance: InstanceId,
        expected_revision: u64,
        updates: &FieldUpdates,
        entry: Option<&JournalEntry>,
    ) -> Result<CommitResult>;

    /// Remove an instance, its fields, and its journal.
    async fn destroy_instance(
        &self,
        instance: InstanceId,
        expected_revision: u64,
    ) -> Result<CommitResult>;

    /// The instance's journal, ordered by seq. Empty if the instance is gone.
    async fn journal(&self, instance: InstanceId) -> Result<Vec<JournalEntry>>;

    /// The last journal entry, if any.
    async fn journal_head(&self, instance: InstanceId) -> Result<Option<JournalEntry>>;

    /// All live instances, in id order.
    async fn list_instances(&self) -> Result<Vec<InstanceId>>;
}
