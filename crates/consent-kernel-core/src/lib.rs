//! # Consent Kernel Core
//!
//! Pure primitives for the Consent Kernel: the consent record, its field
//! codec, operations and their wire decoding, and canonical encoding.
//!
//! This crate contains no I/O, no storage, no networking. Everything here is
//! a deterministic function of its inputs; the current time arrives through
//! the [`Clock`] trait or as an explicit [`Timestamp`].
//!
//! ## Key Types
//!
//! - [`ConsentRecord`] - The single record held by a consent instance
//! - [`ConsentStatus`] - `Uninitialized`, `Pending`, `Granted`, `Revoked`
//! - [`Operation`] - The closed set of business operations
//! - [`Call`] - A business operation or a lifecycle action
//! - [`FieldUpdates`] - A set of field writes committed as one unit
//! - [`JournalEntry`] - Audit entry appended for every accepted mutation
//!
//! ## Canonicalization
//!
//! Records are hashed over deterministic CBOR. See [`canonical`] module.

pub mod canonical;
pub mod clock;
pub mod error;
pub mod field;
pub mod journal;
pub mod operation;
pub mod record;
pub mod types;
pub mod validation;

pub use canonical::{canonical_record_bytes, decode_record, state_hash};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConsentError, CoreError, RejectKind, ValidationError};
pub use field::{Field, FieldMap, FieldUpdates, FieldValue};
pub use journal::{verify_chain, JournalEntry, JournalOp};
pub use operation::{
    Call, ConsentRequest, ConsentTerms, GrantTerms, Invocation, Lifecycle, OnCompletion,
    Operation, OperationKind,
};
pub use record::{ConsentRecord, ConsentStatus};
pub use types::{Identity, InstanceId, Role, StateHash, Timestamp};
pub use validation::ArgLimits;
