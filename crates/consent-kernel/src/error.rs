//! Error types for the engine.
//!
//! Policy rejections are not errors: they come back as
//! [`Outcome::Rejected`](crate::Outcome::Rejected). An `EngineError` means
//! the engine could not evaluate the call at all.

use consent_kernel_core::{CoreError, InstanceId};
use consent_kernel_store::StoreError;
use thiserror::Error;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Stored state could not be decoded or encoded.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// No live instance with this id.
    #[error("instance not found: {0}")]
    InstanceNotFound(InstanceId),

    /// Concurrent writers kept moving the instance's revision.
    #[error("instance {instance}: commit conflict after {attempts} attempts")]
    CommitConflict { instance: InstanceId, attempts: u32 },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
