//! Audit journal entries.
//!
//! Every accepted mutation of an instance appends one entry. Entries carry
//! the canonical bytes of the resulting record and chain to their
//! predecessor through `prev_hash`, so history can be replayed and checked
//! without trusting the store.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::canonical::{canonical_record_bytes, decode_record};
use crate::error::CoreError;
use crate::operation::OperationKind;
use crate::record::ConsentRecord;
use crate::types::{Identity, StateHash, Timestamp};

/// The mutation an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JournalOp {
    Create,
    Request,
    Grant,
    Update,
    Revoke,
}

impl JournalOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalOp::Create => "create",
            JournalOp::Request => "request_consent",
            JournalOp::Grant => "grant_consent",
            JournalOp::Update => "update_consent",
            JournalOp::Revoke => "revoke_consent",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "create" => Some(JournalOp::Create),
            "request_consent" => Some(JournalOp::Request),
            "grant_consent" => Some(JournalOp::Grant),
            "update_consent" => Some(JournalOp::Update),
            "revoke_consent" => Some(JournalOp::Revoke),
            _ => None,
        }
    }

    /// The journal op for a mutating business operation.
    pub fn for_operation(kind: OperationKind) -> Option<Self> {
        match kind {
            OperationKind::RequestConsent => Some(JournalOp::Request),
            OperationKind::GrantConsent => Some(JournalOp::Grant),
            OperationKind::UpdateConsent => Some(JournalOp::Update),
            OperationKind::RevokeConsent => Some(JournalOp::Revoke),
            OperationKind::VerifyConsent => None,
        }
    }
}

impl fmt::Display for JournalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One accepted mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Position in the instance's journal, starting at 0 for `Create`.
    pub seq: u64,

    pub operation: JournalOp,

    pub caller: Identity,

    /// Time the mutation was accepted.
    pub at: Timestamp,

    /// `state_hash` of the previous entry; `None` only for `seq == 0`.
    pub prev_hash: Option<StateHash>,

    /// Hash of `snapshot`.
    pub state_hash: StateHash,

    /// Canonical encoding of the record after the mutation.
    pub snapshot: Bytes,
}

impl JournalEntry {
    /// Build an entry for a record that has just been written.
    pub fn new(
        seq: u64,
        operation: JournalOp,
        caller: Identity,
        at: Timestamp,
        prev_hash: Option<StateHash>,
        record: &ConsentRecord,
    ) -> Result<Self, CoreError> {
        let snapshot = Bytes::from(canonical_record_bytes(record)?);
        Ok(Self {
            seq,
            operation,
            caller,
            at,
            prev_hash,
            state_hash: StateHash::hash(&snapshot),
            snapshot,
        })
    }

    /// Decode the record snapshot.
    pub fn record(&self) -> Result<ConsentRecord, CoreError> {
        decode_record(&self.snapshot)
    }

    /// Whether `state_hash` matches `snapshot`.
    pub fn is_consistent(&self) -> bool {
        StateHash::hash(&self.snapshot) == self.state_hash
    }

    /// Whether `self` directly follows `prev`.
    pub fn follows(&self, prev: &JournalEntry) -> bool {
        prev.seq.checked_add(1) == Some(self.seq) && self.prev_hash == Some(prev.state_hash)
    }
}

/// Check an entire journal: consistent entries, contiguous from zero, and
/// hash-chained.
pub fn verify_chain(entries: &[JournalEntry]) -> bool {
    let Some(first) = entries.first() else {
        return true;
    };
    if first.seq != 0 || first.prev_hash.is_some() {
        return false;
    }
    entries.iter().all(JournalEntry::is_consistent)
        && entries.windows(2).all(|w| w[1].follows(&w[0]))
}
