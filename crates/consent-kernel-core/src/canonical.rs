//! Canonical CBOR encoding of consent records.
//!
//! Follows RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats
//!
//! The same record always produces the same bytes, so its [`StateHash`] is
//! stable across platforms and storage backends.

use bytes::Bytes;
use ciborium::value::{Integer, Value};

use crate::error::CoreError;
use crate::record::{ConsentRecord, ConsentStatus};
use crate::types::{Identity, StateHash, Timestamp};

/// Current record encoding version.
pub const RECORD_VERSION: u8 = 1;

/// Record field keys. Keys 0-23 encode as single bytes.
mod keys {
    pub const VERSION: u64 = 0;
    pub const OWNER: u64 = 1;
    pub const REQUESTER: u64 = 2;
    pub const DOCUMENT_REF: u64 = 3;
    pub const DOCUMENT_TYPE: u64 = 4;
    pub const REQUEST_ID: u64 = 5;
    pub const SCOPE: u64 = 6;
    pub const METADATA: u64 = 7;
    pub const STATUS: u64 = 8;
    pub const EXPIRY: u64 = 9;
}

/// Encode a record to canonical CBOR bytes.
pub fn canonical_record_bytes(record: &ConsentRecord) -> Result<Vec<u8>, CoreError> {
    let value = record_to_cbor_value(record);
    let mut buf = Vec::with_capacity(128);
    encode_value_to(&mut buf, &value)?;
    Ok(buf)
}

/// Blake3 hash of the record's canonical encoding.
pub fn state_hash(record: &ConsentRecord) -> Result<StateHash, CoreError> {
    Ok(StateHash::hash(&canonical_record_bytes(record)?))
}

/// Decode a record from canonical bytes.
///
/// Input that parses but is not in canonical form is rejected.
pub fn decode_record(bytes: &[u8]) -> Result<ConsentRecord, CoreError> {
    let value: Value =
        ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))?;
    let record = cbor_value_to_record(&value)?;

    if canonical_record_bytes(&record)? != bytes {
        return Err(CoreError::DecodingError("non-canonical encoding".into()));
    }
    Ok(record)
}

fn key(k: u64) -> Value {
    Value::Integer(k.into())
}

fn record_to_cbor_value(record: &ConsentRecord) -> Value {
    let requester = match &record.requester {
        Some(id) => Value::Bytes(id.as_bytes().to_vec()),
        None => Value::Null,
    };

    Value::Map(vec![
        (key(keys::VERSION), Value::Integer(RECORD_VERSION.into())),
        (key(keys::OWNER), Value::Bytes(record.owner.as_bytes().to_vec())),
        (key(keys::REQUESTER), requester),
        (key(keys::DOCUMENT_REF), Value::Bytes(record.document_ref.to_vec())),
        (key(keys::DOCUMENT_TYPE), Value::Bytes(record.document_type.to_vec())),
        (key(keys::REQUEST_ID), Value::Bytes(record.request_id.to_vec())),
        (key(keys::SCOPE), Value::Bytes(record.scope.to_vec())),
        (key(keys::METADATA), Value::Bytes(record.metadata.to_vec())),
        (key(keys::STATUS), Value::Integer(record.status.to_u8().into())),
        (key(keys::EXPIRY), Value::Integer(record.expiry.as_secs().into())),
    ])
}

fn encode_value_to(buf: &mut Vec<u8>, value: &Value) -> Result<(), CoreError> {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => {
            encode_uint(buf, 2, b.len() as u64);
            buf.extend_from_slice(b);
        }
        Value::Text(s) => {
            encode_uint(buf, 3, s.len() as u64);
            buf.extend_from_slice(s.as_bytes());
        }
        Value::Array(items) => {
            encode_uint(buf, 4, items.len() as u64);
            for item in items {
                encode_value_to(buf, item)?;
            }
        }
        Value::Map(entries) => encode_map_canonical(buf, entries)?,
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        Value::Float(_) => {
            return Err(CoreError::EncodingError(
                "floats not supported in canonical encoding".into(),
            ))
        }
        _ => {
            return Err(CoreError::EncodingError(
                "unsupported CBOR value type".into(),
            ))
        }
    }
    Ok(())
}

/// Major types 0 and 1.
fn encode_integer(buf: &mut Vec<u8>, i: Integer) {
    let n = i128::from(i);
    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // -1 encodes as 0, -2 as 1, ...
        encode_uint(buf, 1, (-1 - n) as u64);
    }
}

/// Head byte plus the smallest argument encoding for `n`.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Major type 5, keys sorted by encoded bytes.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) -> Result<(), CoreError> {
    let mut pairs = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        let mut key_buf = Vec::new();
        encode_value_to(&mut key_buf, k)?;
        pairs.push((key_buf, v));
    }
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value)?;
    }
    Ok(())
}

fn lookup(map: &[(Value, Value)], wanted: u64) -> Option<&Value> {
    map.iter()
        .find(|(k, _)| matches!(k, Value::Integer(i) if i128::from(*i) == i128::from(wanted)))
        .map(|(_, v)| v)
}

fn cbor_value_to_record(value: &Value) -> Result<ConsentRecord, CoreError> {
    let map = match value {
        Value::Map(m) => m,
        _ => return Err(CoreError::MalformedRecord("expected map".into())),
    };

    let get = |wanted: u64| lookup(map, wanted);
    let uint = |wanted: u64, name: &str| -> Result<u64, CoreError> {
        match get(wanted) {
            Some(Value::Integer(i)) => u64::try_from(i128::from(*i))
                .map_err(|_| CoreError::MalformedRecord(format!("{} out of range", name))),
            _ => Err(CoreError::MalformedRecord(format!("missing {}", name))),
        }
    };
    let bytes = |wanted: u64, name: &str| -> Result<Bytes, CoreError> {
        match get(wanted) {
            Some(Value::Bytes(b)) => Ok(Bytes::copy_from_slice(b)),
            _ => Err(CoreError::MalformedRecord(format!("invalid {}", name))),
        }
    };
    let identity = |v: &Value, name: &str| -> Result<Identity, CoreError> {
        match v {
            Value::Bytes(b) => Identity::try_from(b.as_slice())
                .map_err(|_| CoreError::MalformedRecord(format!("invalid {}", name))),
            _ => Err(CoreError::MalformedRecord(format!("invalid {}", name))),
        }
    };

    let version = uint(keys::VERSION, "version")?;
    if version != u64::from(RECORD_VERSION) {
        return Err(CoreError::MalformedRecord(format!(
            "unsupported version: {}",
            version
        )));
    }

    let owner = identity(
        get(keys::OWNER).ok_or_else(|| CoreError::MalformedRecord("missing owner".into()))?,
        "owner",
    )?;
    let requester = match get(keys::REQUESTER) {
        None | Some(Value::Null) => None,
        Some(v) => Some(identity(v, "requester")?),
    };

    let status_code = uint(keys::STATUS, "status")?;
    let status = u8::try_from(status_code)
        .ok()
        .and_then(ConsentStatus::from_u8)
        .ok_or_else(|| CoreError::MalformedRecord(format!("invalid status: {}", status_code)))?;

    Ok(ConsentRecord {
        owner,
        requester,
        document_ref: bytes(keys::DOCUMENT_REF, "document_ref")?,
        document_type: bytes(keys::DOCUMENT_TYPE, "document_type")?,
        request_id: bytes(keys::REQUEST_ID, "request_id")?,
        scope: bytes(keys::SCOPE, "scope")?,
        metadata: bytes(keys::METADATA, "metadata")?,
        status,
        expiry: Timestamp(uint(keys::EXPIRY, "expiry")?),
    })
}
