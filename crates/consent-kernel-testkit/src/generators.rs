//! Proptest generators for property-based testing.

use bytes::Bytes;
use proptest::prelude::*;

use consent_kernel_core::{
    Call, ConsentRecord, ConsentRequest, ConsentStatus, ConsentTerms, GrantTerms, Identity,
    Lifecycle, Operation, Timestamp,
};
use consent_kernel_policy::PolicyConfig;

use crate::fixtures::{Parties, EPOCH};

/// Generate a random identity.
pub fn identity() -> impl Strategy<Value = Identity> {
    any::<[u8; 32]>().prop_map(Identity::from_bytes)
}

/// One of the fixture parties, or occasionally a random identity.
pub fn caller(parties: Parties) -> impl Strategy<Value = Identity> {
    prop_oneof![
        3 => Just(parties.owner),
        3 => Just(parties.requester),
        2 => Just(parties.stranger),
        1 => identity(),
    ]
}

/// A time within a year either side of [`EPOCH`].
pub fn timestamp() -> impl Strategy<Value = Timestamp> {
    let year = 31_536_000u64;
    (EPOCH.as_secs() - year..=EPOCH.as_secs() + year).prop_map(Timestamp)
}

/// An expiry near `now`: often in the past, at `now`, or shortly after.
pub fn expiry_near(now: Timestamp) -> impl Strategy<Value = Timestamp> {
    prop_oneof![
        (1u64..=3600).prop_map(move |d| now.saturating_sub(d)),
        Just(now),
        (1u64..=3600).prop_map(move |d| now.saturating_add(d)),
    ]
}

/// Opaque argument bytes within the default value limit.
pub fn arg_bytes(max_len: usize) -> impl Strategy<Value = Bytes> {
    prop::collection::vec(any::<u8>(), 1..=max_len).prop_map(Bytes::from)
}

/// Either guard variant.
pub fn policy() -> impl Strategy<Value = PolicyConfig> {
    prop_oneof![
        Just(PolicyConfig::document_access()),
        Just(PolicyConfig::consent_manager()),
    ]
}

pub fn status() -> impl Strategy<Value = ConsentStatus> {
    prop_oneof![
        Just(ConsentStatus::Uninitialized),
        Just(ConsentStatus::Pending),
        Just(ConsentStatus::Granted),
        Just(ConsentStatus::Revoked),
    ]
}

/// A record owned by the fixture owner, in any status, with any requester
/// binding and an expiry near [`EPOCH`].
pub fn record(parties: Parties) -> impl Strategy<Value = ConsentRecord> {
    (
        status(),
        prop::option::of(caller(parties)),
        expiry_near(EPOCH),
        arg_bytes(16),
    )
        .prop_map(move |(status, requester, expiry, scope)| {
            let mut record = ConsentRecord::new(parties.owner);
            record.status = status;
            record.requester = requester;
            record.expiry = expiry;
            record.scope = scope;
            record
        })
}

fn terms(now: Timestamp) -> impl Strategy<Value = ConsentTerms> {
    (expiry_near(now), arg_bytes(16), prop::option::of(arg_bytes(16))).prop_map(
        |(expiry, scope, metadata)| ConsentTerms {
            expiry,
            scope,
            metadata: metadata.unwrap_or_default(),
        },
    )
}

/// Any business operation, with expiries near `now`.
pub fn operation(parties: Parties, now: Timestamp) -> impl Strategy<Value = Operation> {
    let request = (arg_bytes(8), arg_bytes(8), arg_bytes(8), caller(parties)).prop_map(
        |(document_ref, document_type, request_id, requester)| {
            Operation::RequestConsent(ConsentRequest {
                document_ref,
                document_type,
                request_id,
                requester,
            })
        },
    );
    let grant = (terms(now), prop::option::of(caller(parties)))
        .prop_map(|(terms, recipient)| Operation::GrantConsent(GrantTerms { terms, recipient }));
    let update = terms(now).prop_map(Operation::UpdateConsent);

    prop_oneof![
        request,
        grant,
        update,
        Just(Operation::RevokeConsent),
        Just(Operation::VerifyConsent),
    ]
}

/// Any call, mostly business operations.
pub fn call(parties: Parties, now: Timestamp) -> impl Strategy<Value = Call> {
    prop_oneof![
        8 => operation(parties, now).prop_map(Call::Business),
        1 => prop_oneof![
            Just(Lifecycle::Upgrade),
            Just(Lifecycle::CloseOut),
            Just(Lifecycle::OptIn),
        ]
        .prop_map(Call::Lifecycle),
    ]
}

/// Raw positional arguments, as a host would pass them.
pub fn raw_args() -> impl Strategy<Value = Vec<Bytes>> {
    let name = prop_oneof![
        Just(Bytes::from_static(b"request_consent")),
        Just(Bytes::from_static(b"grant_consent")),
        Just(Bytes::from_static(b"update_consent")),
        Just(Bytes::from_static(b"revoke_consent")),
        Just(Bytes::from_static(b"verify_consent")),
        Just(Bytes::from_static(b"view_document")),
        arg_bytes(20),
    ];
    let rest = prop::collection::vec(
        prop::collection::vec(any::<u8>(), 0..=160).prop_map(Bytes::from),
        0..6,
    );
    (name, rest).prop_map(|(name, rest)| {
        let mut args = Vec::with_capacity(rest.len() + 1);
        args.push(name);
        args.extend(rest);
        args
    })
}
