//! # Consent Kernel
//!
//! The unified API for the Consent Kernel: time-bounded, scope-limited
//! consent for a single document, held by one owner and granted to one
//! requester.
//!
//! ## Overview
//!
//! Each consent instance stores one [`ConsentRecord`]. Identities submit
//! invocations against it:
//!
//! - **request_consent**: anyone opens (or reopens) a request, status becomes `Pending`
//! - **grant_consent**: the owner grants with an expiry and scope
//! - **update_consent**: the owner replaces expiry, scope and metadata
//! - **revoke_consent**: owner or requester withdraws consent
//! - **verify_consent**: succeeds only while consent is granted and unexpired
//!
//! Every invocation is atomic: an accepted mutation lands completely, a
//! rejection changes nothing.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use consent_kernel::{ConsentEngine, EngineConfig};
//! use consent_kernel::core::{Identity, Invocation, Operation};
//! use consent_kernel::store::SqliteStore;
//!
//! async fn example() -> consent_kernel::Result<()> {
//!     let store = SqliteStore::open("consent.db")?;
//!     let engine = ConsentEngine::new(store, EngineConfig::default());
//!
//!     let owner = Identity::derive("owner");
//!     let instance = engine.create(owner).await?;
//!
//!     let verify = Invocation::new(owner, Operation::VerifyConsent);
//!     let outcome = engine.invoke(instance, &verify).await?;
//!     assert!(!outcome.is_accepted());
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `consent_kernel::core` - Record, operations, canonical encoding
//! - `consent_kernel::policy` - Guards and state transitions
//! - `consent_kernel::store` - Storage abstraction and SQLite

pub mod engine;
pub mod error;

// Re-export component crates
pub use consent_kernel_core as core;
pub use consent_kernel_policy as policy;
pub use consent_kernel_store as store;

// Re-export main types for convenience
pub use engine::{ConsentEngine, Effect, EngineConfig, Outcome, MAX_COMMIT_ATTEMPTS};
pub use error::{EngineError, Result};

// Re-export commonly used types
pub use consent_kernel_core::{
    Call, ConsentError, ConsentRecord, ConsentStatus, Identity, InstanceId, Invocation,
    OnCompletion, Operation, RejectKind, Timestamp,
};
pub use consent_kernel_policy::{ConsentView, EffectiveStatus, PolicyConfig};
