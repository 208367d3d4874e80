//! # Consent Kernel Policy
//!
//! Authorization rules for consent records.
//!
//! ## Overview
//!
//! Policy is a pure function of `(record, call, caller, now, config)`. It
//! decides whether a call is admitted and, if so, what the record becomes.
//! Nothing here performs I/O or reads a clock.
//!
//! ## Key Concepts
//!
//! - **Predicates**: `is_owner`, `is_requester`, `is_granted`, `is_not_expired`
//! - **Guards**: per-operation checks built from predicates, run in the order
//!   caller, status, expiry
//! - **Transition**: [`transition`] maps an accepted call to
//!   [`Transition::Unchanged`], [`Transition::Updated`], or
//!   [`Transition::Destroy`]
//! - **Variants**: [`PolicyConfig`] selects between the document-access and
//!   consent-manager guard sets
//!
//! ## State Machine
//!
//! ```text
//! any status   --request_consent--> Pending
//! Pending      --grant_consent----> Granted
//! Granted      --update_consent---> Granted
//! Granted      --revoke_consent---> Revoked
//! ```
//!
//! Expiry is derived at read time (see [`EffectiveStatus`]), never stored.

pub mod config;
pub mod predicates;
pub mod transition;
pub mod view;

pub use config::{Audience, PolicyConfig};
pub use predicates::{has_role, is_granted, is_not_expired, is_owner, is_requester};
pub use transition::{apply, transition, Transition};
pub use view::{effective_status, ConsentView, EffectiveStatus, Permission, Permissions};
