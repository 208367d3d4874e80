//! Primitive predicates and the guards built from them.
//!
//! Every function here is pure in `(record, caller, now)`.

use consent_kernel_core::{ConsentError, ConsentRecord, ConsentStatus, Identity, Role, Timestamp};

pub fn is_owner(caller: &Identity, record: &ConsentRecord) -> bool {
    record.owner == *caller
}

/// False while no requester is bound.
pub fn is_requester(caller: &Identity, record: &ConsentRecord) -> bool {
    record.requester.as_ref() == Some(caller)
}

pub fn is_granted(record: &ConsentRecord) -> bool {
    record.status == ConsentStatus::Granted
}

/// `now < expiry`. An unset expiry is always expired.
pub fn is_not_expired(record: &ConsentRecord, now: Timestamp) -> bool {
    now < record.expiry
}

pub fn has_role(caller: &Identity, record: &ConsentRecord, role: Role) -> bool {
    match role {
        Role::Owner => is_owner(caller, record),
        Role::Requester => is_requester(caller, record),
        Role::OwnerOrRequester => is_owner(caller, record) || is_requester(caller, record),
    }
}

pub(crate) fn require_role(
    operation: &'static str,
    caller: &Identity,
    record: &ConsentRecord,
    role: Role,
) -> Result<(), ConsentError> {
    if has_role(caller, record, role) {
        Ok(())
    } else {
        Err(ConsentError::Authorization {
            operation,
            caller: *caller,
            required: role,
        })
    }
}

pub(crate) fn require_status(
    operation: &'static str,
    record: &ConsentRecord,
    expected: ConsentStatus,
) -> Result<(), ConsentError> {
    if record.status == expected {
        Ok(())
    } else {
        Err(ConsentError::State {
            operation,
            expected,
            actual: record.status,
        })
    }
}

/// A supplied or stored expiry must lie strictly after `now`.
pub(crate) fn require_future(
    operation: &'static str,
    expiry: Timestamp,
    now: Timestamp,
) -> Result<(), ConsentError> {
    if now < expiry {
        Ok(())
    } else {
        Err(ConsentError::Expiry {
            operation,
            expiry,
            now,
        })
    }
}
