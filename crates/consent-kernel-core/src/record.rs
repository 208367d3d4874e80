//! The consent record: the single entity held by a consent instance.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Identity, Timestamp};

/// Lifecycle status of a consent record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsentStatus {
    /// Created, no request made yet.
    #[default]
    Uninitialized,
    /// A requester has asked for access.
    Pending,
    /// The owner has granted access until `expiry`.
    Granted,
    /// Access was withdrawn.
    Revoked,
}

impl ConsentStatus {
    /// Human-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsentStatus::Uninitialized => "uninitialized",
            ConsentStatus::Pending => "pending",
            ConsentStatus::Granted => "granted",
            ConsentStatus::Revoked => "revoked",
        }
    }

    /// The byte label stored in the `status` field.
    ///
    /// `Uninitialized` has no label: the field is simply absent.
    pub fn label(&self) -> Option<&'static [u8]> {
        match self {
            ConsentStatus::Uninitialized => None,
            ConsentStatus::Pending => Some(b"pending"),
            ConsentStatus::Granted => Some(b"granted"),
            ConsentStatus::Revoked => Some(b"revoked"),
        }
    }

    /// Parse a stored status label.
    pub fn from_label(label: &[u8]) -> Option<Self> {
        match label {
            b"pending" => Some(ConsentStatus::Pending),
            b"granted" => Some(ConsentStatus::Granted),
            b"revoked" => Some(ConsentStatus::Revoked),
            _ => None,
        }
    }

    /// Stable integer code used in canonical encoding.
    pub fn to_u8(&self) -> u8 {
        match self {
            ConsentStatus::Uninitialized => 0,
            ConsentStatus::Pending => 1,
            ConsentStatus::Granted => 2,
            ConsentStatus::Revoked => 3,
        }
    }

    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            0 => Some(ConsentStatus::Uninitialized),
            1 => Some(ConsentStatus::Pending),
            2 => Some(ConsentStatus::Granted),
            3 => Some(ConsentStatus::Revoked),
            _ => None,
        }
    }
}

impl fmt::Display for ConsentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The consent record.
///
/// `owner` is fixed at creation. Byte fields are opaque to the kernel;
/// an unset byte field reads as empty, an unset expiry as [`Timestamp::ZERO`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    /// Identity that created the instance.
    pub owner: Identity,

    /// Identity the consent applies to (a.k.a. recipient).
    pub requester: Option<Identity>,

    /// Hash or label of the referenced document, never the document itself.
    pub document_ref: Bytes,

    /// Descriptive document type.
    pub document_type: Bytes,

    /// Caller-chosen request identifier.
    pub request_id: Bytes,

    /// Permissions descriptor (e.g. `view,download`).
    pub scope: Bytes,

    /// Auxiliary data attached by the owner.
    pub metadata: Bytes,

    /// Lifecycle status.
    pub status: ConsentStatus,

    /// Absolute expiry; meaningful only while `Granted`.
    pub expiry: Timestamp,
}

impl ConsentRecord {
    /// A freshly created record owned by `owner`.
    pub fn new(owner: Identity) -> Self {
        Self {
            owner,
            requester: None,
            document_ref: Bytes::new(),
            document_type: Bytes::new(),
            request_id: Bytes::new(),
            scope: Bytes::new(),
            metadata: Bytes::new(),
            status: ConsentStatus::Uninitialized,
            expiry: Timestamp::ZERO,
        }
    }
}
