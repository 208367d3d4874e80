//! Read-side view of a consent record.
//!
//! Expiry is never stored as a status. A view derives it at read time, along
//! with the permission flags parsed from `scope`.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use consent_kernel_core::{ConsentRecord, ConsentStatus, Timestamp};

use crate::predicates::is_not_expired;

/// Status as observed at a given time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectiveStatus {
    Uninitialized,
    Pending,
    Granted,
    /// Granted, but `now >= expiry`.
    Expired,
    Revoked,
}

impl EffectiveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EffectiveStatus::Uninitialized => "uninitialized",
            EffectiveStatus::Pending => "pending",
            EffectiveStatus::Granted => "granted",
            EffectiveStatus::Expired => "expired",
            EffectiveStatus::Revoked => "revoked",
        }
    }
}

impl fmt::Display for EffectiveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn effective_status(record: &ConsentRecord, now: Timestamp) -> EffectiveStatus {
    match record.status {
        ConsentStatus::Uninitialized => EffectiveStatus::Uninitialized,
        ConsentStatus::Pending => EffectiveStatus::Pending,
        ConsentStatus::Granted if is_not_expired(record, now) => EffectiveStatus::Granted,
        ConsentStatus::Granted => EffectiveStatus::Expired,
        ConsentStatus::Revoked => EffectiveStatus::Revoked,
    }
}

/// One permission flag from a scope string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Permission {
    View,
    Download,
    /// Any other flag, kept verbatim.
    Other(String),
}

impl Permission {
    fn parse(flag: &str) -> Self {
        match flag {
            "view" => Permission::View,
            "download" => Permission::Download,
            other => Permission::Other(other.to_string()),
        }
    }
}

/// Permission flags parsed from a comma-separated scope.
///
/// Flags are trimmed and lowercased; empty flags are dropped. A scope that is
/// not UTF-8 yields no flags: it stays available as raw bytes on the record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions(BTreeSet<Permission>);

impl Permissions {
    pub fn parse(scope: &[u8]) -> Self {
        let Ok(text) = std::str::from_utf8(scope) else {
            return Self::default();
        };
        Self(
            text.split(',')
                .map(|flag| flag.trim().to_ascii_lowercase())
                .filter(|flag| !flag.is_empty())
                .map(|flag| Permission::parse(&flag))
                .collect(),
        )
    }

    pub fn contains(&self, permission: &Permission) -> bool {
        self.0.contains(permission)
    }

    pub fn can_view(&self) -> bool {
        self.contains(&Permission::View)
    }

    pub fn can_download(&self) -> bool {
        self.contains(&Permission::Download)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.0.iter()
    }
}

/// A record with its read-time interpretation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentView {
    pub record: ConsentRecord,
    pub effective: EffectiveStatus,
    pub permissions: Permissions,
    /// The time the view was taken.
    pub at: Timestamp,
}

impl ConsentView {
    pub fn new(record: ConsentRecord, now: Timestamp) -> Self {
        let effective = effective_status(&record, now);
        let permissions = Permissions::parse(&record.scope);
        Self {
            record,
            effective,
            permissions,
            at: now,
        }
    }

    /// Granted and not expired.
    pub fn is_active(&self) -> bool {
        self.effective == EffectiveStatus::Granted
    }

    /// Seconds until expiry while active.
    pub fn remaining(&self) -> Option<u64> {
        self.is_active()
            .then(|| self.record.expiry.as_secs() - self.at.as_secs())
    }
}
