//! Error types for the Consent Kernel Core.

use thiserror::Error;

use crate::field::Field;
use crate::record::ConsentStatus;
use crate::types::{Identity, Role, Timestamp};

/// Core errors from decoding or encoding stored state.
///
/// These indicate corrupted or foreign data, never a policy decision.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("field {field} has the wrong type: expected {expected}")]
    FieldType { field: Field, expected: &'static str },

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Argument shape errors, raised before any guard runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing operation name")]
    MissingOperation,

    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("{operation}: missing argument {index} ({name})")]
    MissingArgument {
        operation: &'static str,
        index: usize,
        name: &'static str,
    },

    #[error("{operation}: argument {index} ({name}) is empty")]
    EmptyArgument {
        operation: &'static str,
        index: usize,
        name: &'static str,
    },

    #[error("{operation}: argument {index} ({name}) is {len} bytes, limit is {max}")]
    ArgumentTooLong {
        operation: &'static str,
        index: usize,
        name: &'static str,
        len: usize,
        max: usize,
    },

    #[error("{operation}: expiry is not a decimal timestamp: {value:?}")]
    InvalidExpiry {
        operation: &'static str,
        value: String,
    },

    #[error("{operation}: {name} is not a valid identity")]
    InvalidIdentity {
        operation: &'static str,
        name: &'static str,
    },
}

/// The kind of a rejection, without its details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectKind {
    Validation,
    Authorization,
    State,
    Expiry,
}

/// Why an operation was rejected.
///
/// Every variant is local and non-fatal: the operation aborts and the
/// record is left exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsentError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("{operation}: caller {caller} is not the {required}")]
    Authorization {
        operation: &'static str,
        caller: Identity,
        required: Role,
    },

    #[error("{operation}: requires status {expected}, record is {actual}")]
    State {
        operation: &'static str,
        expected: ConsentStatus,
        actual: ConsentStatus,
    },

    #[error("{operation}: expiry {expiry} is not after now ({now})")]
    Expiry {
        operation: &'static str,
        expiry: Timestamp,
        now: Timestamp,
    },
}

impl ConsentError {
    /// The taxonomy bucket of this rejection.
    pub fn kind(&self) -> RejectKind {
        match self {
            ConsentError::Validation(_) => RejectKind::Validation,
            ConsentError::Authorization { .. } => RejectKind::Authorization,
            ConsentError::State { .. } => RejectKind::State,
            ConsentError::Expiry { .. } => RejectKind::Expiry,
        }
    }
}
