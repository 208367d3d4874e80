//! Error types for the store module.

use thiserror::Error;

use consent_kernel_core::InstanceId;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Stored bytes could not be decoded.
    #[error("core error: {0}")]
    Core(#[from] consent_kernel_core::CoreError),

    /// A journal entry does not extend the journal head.
    #[error("journal conflict on instance {instance}: entry seq {seq}, expected {expected}")]
    JournalConflict {
        instance: InstanceId,
        seq: u64,
        expected: u64,
    },

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A lock guarding store state was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    LockPoisoned,

    /// A blocking task failed to complete.
    #[error("blocking task failed: {0}")]
    Task(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
