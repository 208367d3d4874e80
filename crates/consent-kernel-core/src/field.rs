//! Key/value view of a consent record.
//!
//! The hosting ledger stores a record as a flat set of named fields, each
//! holding either a byte string or an unsigned integer. This module converts
//! between that layout and [`ConsentRecord`], and expresses a state change as
//! a [`FieldUpdates`] set that a store commits as one unit.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::record::{ConsentRecord, ConsentStatus};
use crate::types::{Identity, Timestamp};

/// A fixed field name of the consent record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Field {
    Owner,
    Requester,
    DocumentRef,
    DocumentType,
    RequestId,
    Scope,
    Metadata,
    Status,
    Expiry,
}

impl Field {
    /// Every field, in key order.
    pub const ALL: [Field; 9] = [
        Field::Owner,
        Field::Requester,
        Field::DocumentRef,
        Field::DocumentType,
        Field::RequestId,
        Field::Scope,
        Field::Metadata,
        Field::Status,
        Field::Expiry,
    ];

    /// The storage key.
    pub fn key(&self) -> &'static str {
        match self {
            Field::Owner => "owner",
            Field::Requester => "requester",
            Field::DocumentRef => "document_ref",
            Field::DocumentType => "document_type",
            Field::RequestId => "request_id",
            Field::Scope => "scope",
            Field::Metadata => "metadata",
            Field::Status => "status",
            Field::Expiry => "expiry",
        }
    }

    /// Look up a field by storage key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A stored field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    Bytes(Bytes),
    Uint(u64),
}

impl FieldValue {
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            FieldValue::Bytes(b) => Some(b),
            FieldValue::Uint(_) => None,
        }
    }

    pub fn as_uint(&self) -> Option<u64> {
        match self {
            FieldValue::Uint(n) => Some(*n),
            FieldValue::Bytes(_) => None,
        }
    }
}

/// All present fields of one record.
pub type FieldMap = BTreeMap<Field, FieldValue>;

/// A set of field writes applied atomically.
///
/// `None` deletes the field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldUpdates {
    writes: BTreeMap<Field, Option<FieldValue>>,
}

impl FieldUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a write.
    pub fn set(&mut self, field: Field, value: FieldValue) {
        self.writes.insert(field, Some(value));
    }

    /// Stage a deletion.
    pub fn delete(&mut self, field: Field) {
        self.writes.insert(field, None);
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Fields touched by this update, in key order.
    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.writes.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, Option<&FieldValue>)> {
        self.writes.iter().map(|(f, v)| (*f, v.as_ref()))
    }

    /// Apply every write to a field map.
    pub fn apply_to(&self, map: &mut FieldMap) {
        for (field, value) in &self.writes {
            match value {
                Some(v) => {
                    map.insert(*field, v.clone());
                }
                None => {
                    map.remove(field);
                }
            }
        }
    }
}

impl ConsentRecord {
    /// Encode as stored fields.
    ///
    /// Unset values (empty bytes, no requester, zero expiry, uninitialized
    /// status) are omitted, so `from_fields(to_fields(r)) == r`.
    pub fn to_fields(&self) -> FieldMap {
        let mut map = FieldMap::new();
        map.insert(
            Field::Owner,
            FieldValue::Bytes(Bytes::copy_from_slice(self.owner.as_bytes())),
        );
        if let Some(requester) = &self.requester {
            map.insert(
                Field::Requester,
                FieldValue::Bytes(Bytes::copy_from_slice(requester.as_bytes())),
            );
        }

        let byte_fields = [
            (Field::DocumentRef, &self.document_ref),
            (Field::DocumentType, &self.document_type),
            (Field::RequestId, &self.request_id),
            (Field::Scope, &self.scope),
            (Field::Metadata, &self.metadata),
        ];
        for (field, value) in byte_fields {
            if !value.is_empty() {
                map.insert(field, FieldValue::Bytes(value.clone()));
            }
        }

        if let Some(label) = self.status.label() {
            map.insert(Field::Status, FieldValue::Bytes(Bytes::from_static(label)));
        }
        if self.expiry != Timestamp::ZERO {
            map.insert(Field::Expiry, FieldValue::Uint(self.expiry.as_secs()));
        }
        map
    }

    /// Decode from stored fields.
    pub fn from_fields(map: &FieldMap) -> Result<Self, CoreError> {
        let owner = map
            .get(&Field::Owner)
            .ok_or_else(|| CoreError::MalformedRecord("owner is not set".into()))
            .and_then(|v| identity_field(Field::Owner, v))?;

        let requester = map
            .get(&Field::Requester)
            .map(|v| identity_field(Field::Requester, v))
            .transpose()?;

        let status = match map.get(&Field::Status) {
            None => ConsentStatus::Uninitialized,
            Some(v) => {
                let label = bytes_field(Field::Status, Some(v))?;
                ConsentStatus::from_label(&label).ok_or_else(|| {
                    CoreError::MalformedRecord(format!(
                        "unknown status label {:?}",
                        String::from_utf8_lossy(&label)
                    ))
                })?
            }
        };

        let expiry = match map.get(&Field::Expiry) {
            None => Timestamp::ZERO,
            Some(v) => Timestamp(v.as_uint().ok_or(CoreError::FieldType {
                field: Field::Expiry,
                expected: "uint",
            })?),
        };

        Ok(Self {
            owner,
            requester,
            document_ref: bytes_field(Field::DocumentRef, map.get(&Field::DocumentRef))?,
            document_type: bytes_field(Field::DocumentType, map.get(&Field::DocumentType))?,
            request_id: bytes_field(Field::RequestId, map.get(&Field::RequestId))?,
            scope: bytes_field(Field::Scope, map.get(&Field::Scope))?,
            metadata: bytes_field(Field::Metadata, map.get(&Field::Metadata))?,
            status,
            expiry,
        })
    }

    /// The writes that turn `self` into `next`.
    pub fn diff(&self, next: &ConsentRecord) -> FieldUpdates {
        let before = self.to_fields();
        let after = next.to_fields();
        let mut updates = FieldUpdates::new();

        for field in Field::ALL {
            match (before.get(&field), after.get(&field)) {
                (Some(old), Some(new)) if old == new => {}
                (_, Some(new)) => updates.set(field, new.clone()),
                (Some(_), None) => updates.delete(field),
                (None, None) => {}
            }
        }
        updates
    }
}

fn bytes_field(field: Field, value: Option<&FieldValue>) -> Result<Bytes, CoreError> {
    match value {
        None => Ok(Bytes::new()),
        Some(v) => v.as_bytes().cloned().ok_or(CoreError::FieldType {
            field,
            expected: "bytes",
        }),
    }
}

fn identity_field(field: Field, value: &FieldValue) -> Result<Identity, CoreError> {
    let bytes = value.as_bytes().ok_or(CoreError::FieldType {
        field,
        expected: "bytes",
    })?;
    Identity::try_from(bytes.as_ref())
        .map_err(|_| CoreError::MalformedRecord(format!("{} is not a 32-byte identity", field)))
}
