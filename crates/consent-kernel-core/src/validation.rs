//! Positional argument validation.
//!
//! Arguments arrive as opaque byte strings. Index 0 is the operation name;
//! operation arguments start at index 1. Every check here runs before any
//! guard, so a malformed call never reaches policy logic.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::{Identity, Timestamp};

/// Default per-argument byte limit (the ledger's global-state value size).
pub const DEFAULT_MAX_VALUE_LEN: usize = 128;

/// Limits applied to invocation arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgLimits {
    /// Maximum length of any single argument, in bytes.
    pub max_value_len: usize,
}

impl Default for ArgLimits {
    fn default() -> Self {
        Self {
            max_value_len: DEFAULT_MAX_VALUE_LEN,
        }
    }
}

/// Positional argument reader for one operation.
pub(crate) struct Args<'a> {
    operation: &'static str,
    args: &'a [Bytes],
    limits: &'a ArgLimits,
}

impl<'a> Args<'a> {
    pub(crate) fn new(operation: &'static str, args: &'a [Bytes], limits: &'a ArgLimits) -> Self {
        Self {
            operation,
            args,
            limits,
        }
    }

    /// A present, non-empty argument.
    pub(crate) fn required(
        &self,
        index: usize,
        name: &'static str,
    ) -> Result<Bytes, ValidationError> {
        let value = self
            .args
            .get(index)
            .ok_or(ValidationError::MissingArgument {
                operation: self.operation,
                index,
                name,
            })?;
        if value.is_empty() {
            return Err(ValidationError::EmptyArgument {
                operation: self.operation,
                index,
                name,
            });
        }
        self.check_len(index, name, value)?;
        Ok(value.clone())
    }

    /// An argument that may be absent or empty; absent reads as empty.
    pub(crate) fn optional(
        &self,
        index: usize,
        name: &'static str,
    ) -> Result<Bytes, ValidationError> {
        match self.args.get(index) {
            None => Ok(Bytes::new()),
            Some(value) => {
                self.check_len(index, name, value)?;
                Ok(value.clone())
            }
        }
    }

    /// A required decimal seconds-since-epoch argument.
    pub(crate) fn expiry(&self, index: usize) -> Result<Timestamp, ValidationError> {
        let raw = self.required(index, "expiry")?;
        Timestamp::parse_decimal(&raw).ok_or_else(|| ValidationError::InvalidExpiry {
            operation: self.operation,
            value: String::from_utf8_lossy(&raw).into_owned(),
        })
    }

    /// A required identity argument.
    pub(crate) fn identity(
        &self,
        index: usize,
        name: &'static str,
    ) -> Result<Identity, ValidationError> {
        let raw = self.required(index, name)?;
        Identity::from_arg(&raw).ok_or(ValidationError::InvalidIdentity {
            operation: self.operation,
            name,
        })
    }

    fn check_len(
        &self,
        index: usize,
        name: &'static str,
        value: &Bytes,
    ) -> Result<(), ValidationError> {
        if value.len() > self.limits.max_value_len {
            return Err(ValidationError::ArgumentTooLong {
                operation: self.operation,
                index,
                name,
                len: value.len(),
                max: self.limits.max_value_len,
            });
        }
        Ok(())
    }
}
