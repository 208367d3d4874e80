//! The transition function.
//!
//! `transition` takes the current record and one decoded call and either
//! rejects or returns what should happen to the record. It never touches
//! storage: committing the result is the engine's job.
//!
//! Guards run in a fixed order: caller, then status precondition, then
//! expiry. The first failing guard decides the rejection.

use consent_kernel_core::{
    Call, ConsentError, ConsentRecord, ConsentRequest, ConsentStatus, ConsentTerms,
    FieldUpdates, GrantTerms, Identity, Lifecycle, Operation, Role, Timestamp,
};

use crate::config::PolicyConfig;
use crate::predicates::{require_future, require_role, require_status};

/// Result of an accepted call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Accepted without touching the record.
    Unchanged,

    /// Accepted; the record becomes `record`. `updates` are the field
    /// writes that take the stored fields there, committed as one unit.
    Updated {
        record: ConsentRecord,
        updates: FieldUpdates,
    },

    /// Accepted; the instance and its record are destroyed.
    Destroy,
}

/// Evaluate `call` by `caller` against `record` at `now`.
pub fn transition(
    record: &ConsentRecord,
    call: &Call,
    caller: &Identity,
    now: Timestamp,
    config: &PolicyConfig,
) -> Result<Transition, ConsentError> {
    match call {
        Call::Lifecycle(lifecycle) => lifecycle_transition(record, *lifecycle, caller),
        Call::Business(operation) => {
            let next = apply(record, operation, caller, now, config)?;
            Ok(match next {
                Some(next) => updated(record, next),
                None => Transition::Unchanged,
            })
        }
    }
}

/// Evaluate a business operation and compute the next record.
///
/// `Ok(None)` means accepted with no mutation.
pub fn apply(
    record: &ConsentRecord,
    operation: &Operation,
    caller: &Identity,
    now: Timestamp,
    config: &PolicyConfig,
) -> Result<Option<ConsentRecord>, ConsentError> {
    let name = operation.name();
    match operation {
        Operation::RequestConsent(request) => Ok(Some(request_consent(record, request))),
        Operation::GrantConsent(grant) => {
            require_role(name, caller, record, Role::Owner)?;
            if config.grant_requires_pending {
                require_status(name, record, ConsentStatus::Pending)?;
            }
            require_future(name, grant.terms.expiry, now)?;
            Ok(Some(grant_consent(record, grant)))
        }
        Operation::UpdateConsent(terms) => {
            require_role(name, caller, record, Role::Owner)?;
            require_future(name, terms.expiry, now)?;
            let mut next = record.clone();
            write_terms(&mut next, terms);
            Ok(Some(next))
        }
        Operation::RevokeConsent => {
            require_role(name, caller, record, Role::OwnerOrRequester)?;
            if config.revoke_requires_granted {
                require_status(name, record, ConsentStatus::Granted)?;
            }
            let mut next = record.clone();
            next.status = ConsentStatus::Revoked;
            Ok(Some(next))
        }
        Operation::VerifyConsent => {
            require_role(name, caller, record, config.verify_audience.role())?;
            require_status(name, record, ConsentStatus::Granted)?;
            require_future(name, record.expiry, now)?;
            Ok(None)
        }
    }
}

fn lifecycle_transition(
    record: &ConsentRecord,
    lifecycle: Lifecycle,
    caller: &Identity,
) -> Result<Transition, ConsentError> {
    match lifecycle {
        Lifecycle::Delete => {
            require_role(lifecycle.name(), caller, record, Role::Owner)?;
            Ok(Transition::Destroy)
        }
        Lifecycle::Upgrade => {
            require_role(lifecycle.name(), caller, record, Role::Owner)?;
            Ok(Transition::Unchanged)
        }
        // No per-caller local state is kept.
        Lifecycle::CloseOut | Lifecycle::OptIn => Ok(Transition::Unchanged),
    }
}

/// Any caller, any prior status. Reopens the record as `Pending`.
fn request_consent(record: &ConsentRecord, request: &ConsentRequest) -> ConsentRecord {
    let mut next = record.clone();
    next.document_ref = request.document_ref.clone();
    next.document_type = request.document_type.clone();
    next.request_id = request.request_id.clone();
    next.requester = Some(request.requester);
    next.status = ConsentStatus::Pending;
    next
}

fn grant_consent(record: &ConsentRecord, grant: &GrantTerms) -> ConsentRecord {
    let mut next = record.clone();
    write_terms(&mut next, &grant.terms);
    if next.requester.is_none() {
        next.requester = grant.recipient;
    }
    next.status = ConsentStatus::Granted;
    next
}

fn write_terms(record: &mut ConsentRecord, terms: &ConsentTerms) {
    record.expiry = terms.expiry;
    record.scope = terms.scope.clone();
    record.metadata = terms.metadata.clone();
}

fn updated(record: &ConsentRecord, next: ConsentRecord) -> Transition {
    let updates = record.diff(&next);
    Transition::Updated {
        record: next,
        updates,
    }
}
