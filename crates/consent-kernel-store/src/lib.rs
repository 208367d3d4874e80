//! # Consent Kernel Store
//!
//! Storage abstraction for consent instances. Provides a trait-based
//! interface with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The kernel is storage-agnostic: it talks to the [`Store`] trait. The
//! primary implementation is [`SqliteStore`], with [`MemoryStore`] for tests.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`StoredInstance`] - Fields plus revision of one instance
//! - [`CommitResult`] - Outcome of an atomic commit
//!
//! ## Usage
//!
//! ```rust,no_run
//! use consent_kernel_core::{ConsentRecord, Identity};
//! use consent_kernel_store::{SqliteStore, Store};
//!
//! async fn example() -> consent_kernel_store::Result<()> {
//!     let store = SqliteStore::open("consent.db")?;
//!
//!     let record = ConsentRecord::new(Identity::derive("owner"));
//!     let id = store.create_instance(&record.to_fields(), None).await?;
//!     let stored = store.load_fields(id).await?;
//!     assert!(stored.is_some());
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Atomic commits**: field writes and the journal entry land together
//! - **Optimistic concurrency**: commits carry the revision they were computed
//!   against; a stale revision writes nothing
//! - **Append-only journal**: entries must extend the journal head

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{CommitResult, Store, StoredInstance};
