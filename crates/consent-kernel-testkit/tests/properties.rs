//! Property tests for the consent state machine.

use bytes::Bytes;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

use consent_kernel::{Effect, Outcome};
use consent_kernel_core::{
    ArgLimits, Call, ConsentError, ConsentRequest, ConsentStatus, ConsentTerms, GrantTerms,
    Invocation, OnCompletion, Operation, OperationKind, RejectKind,
};
use consent_kernel_policy::{apply, transition, PolicyConfig, Transition};
use consent_kernel_testkit::generators::{
    arg_bytes, call, caller, expiry_near, identity, operation, policy, raw_args, record,
    timestamp,
};
use consent_kernel_testkit::{Parties, TestFixture, EPOCH};

/// Whether `before -> after` is a legal move for `kind` under `config`.
fn adjacent(
    kind: OperationKind,
    before: ConsentStatus,
    after: ConsentStatus,
    config: &PolicyConfig,
) -> bool {
    match kind {
        OperationKind::RequestConsent => after == ConsentStatus::Pending,
        OperationKind::GrantConsent => {
            after == ConsentStatus::Granted
                && (!config.grant_requires_pending || before == ConsentStatus::Pending)
        }
        OperationKind::UpdateConsent => after == before,
        OperationKind::RevokeConsent => {
            after == ConsentStatus::Revoked
                && (!config.revoke_requires_granted || before == ConsentStatus::Granted)
        }
        OperationKind::VerifyConsent => false,
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn prop_status_follows_adjacency(
        start in record(Parties::new()),
        config in policy(),
        steps in prop::collection::vec(
            (caller(Parties::new()), call(Parties::new(), EPOCH)),
            1..24,
        ),
    ) {
        let mut current = start;
        for (who, step) in steps {
            match transition(&current, &step, &who, EPOCH, &config) {
                Ok(Transition::Updated { record, .. }) => {
                    let kind = match &step {
                        Call::Business(op) => op.kind(),
                        Call::Lifecycle(_) => {
                            return Err(TestCaseError::fail("lifecycle call mutated the record"));
                        }
                    };
                    prop_assert!(
                        adjacent(kind, current.status, record.status, &config),
                        "{} moved {} -> {}",
                        kind,
                        current.status,
                        record.status
                    );
                    prop_assert_eq!(record.owner, current.owner);
                    current = record;
                }
                Ok(Transition::Unchanged) | Err(_) => {}
                Ok(Transition::Destroy) => prop_assert!(false, "unexpected destroy"),
            }
        }
    }

    #[test]
    fn prop_request_always_forces_pending(
        start in record(Parties::new()),
        who in caller(Parties::new()),
        config in policy(),
        requester in identity(),
    ) {
        let op = Operation::RequestConsent(ConsentRequest {
            document_ref: Bytes::from_static(b"h1"),
            document_type: Bytes::from_static(b"Aadhaar"),
            request_id: Bytes::from_static(b"r1"),
            requester,
        });
        let next = apply(&start, &op, &who, EPOCH, &config).unwrap().unwrap();
        prop_assert_eq!(next.status, ConsentStatus::Pending);
        prop_assert_eq!(next.requester, Some(requester));
    }

    #[test]
    fn prop_grant_rejects_unless_expiry_after_now(
        start in record(Parties::new()),
        who in caller(Parties::new()),
        config in policy(),
        now in timestamp(),
        back in 0u64..=86_400,
        recipient in prop::option::of(identity()),
        scope in arg_bytes(16),
    ) {
        let op = Operation::GrantConsent(GrantTerms {
            terms: ConsentTerms {
                expiry: now.saturating_sub(back),
                scope,
                metadata: Bytes::new(),
            },
            recipient,
        });
        prop_assert!(apply(&start, &op, &who, now, &config).is_err());
    }

    #[test]
    fn prop_revoke_rejects_outsiders(
        start in record(Parties::new()),
        who in identity(),
        config in policy(),
    ) {
        prop_assume!(who != start.owner && Some(who) != start.requester);
        let err = apply(&start, &Operation::RevokeConsent, &who, EPOCH, &config).unwrap_err();
        prop_assert_eq!(err.kind(), RejectKind::Authorization);
    }

    #[test]
    fn prop_verify_rejects_at_or_after_expiry(
        start in record(Parties::new()),
        who in caller(Parties::new()),
        config in policy(),
        late in 0u64..=86_400,
    ) {
        let mut granted = start;
        granted.status = ConsentStatus::Granted;
        let now = granted.expiry.saturating_add(late);
        prop_assert!(apply(&granted, &Operation::VerifyConsent, &who, now, &config).is_err());
    }

    #[test]
    fn prop_update_never_changes_status(
        start in record(Parties::new()),
        who in caller(Parties::new()),
        config in policy(),
        expiry in expiry_near(EPOCH),
        scope in arg_bytes(16),
    ) {
        let op = Operation::UpdateConsent(ConsentTerms {
            expiry,
            scope,
            metadata: Bytes::new(),
        });
        match apply(&start, &op, &who, EPOCH, &config) {
            Ok(Some(next)) => prop_assert_eq!(next.status, start.status),
            Ok(None) => prop_assert!(false, "update accepted without a new record"),
            Err(err) => prop_assert!(
                matches!(err.kind(), RejectKind::Authorization | RejectKind::Expiry),
                "update rejected with {:?}",
                err.kind()
            ),
        }
    }

    #[test]
    fn prop_verify_is_idempotent(
        start in record(Parties::new()),
        who in caller(Parties::new()),
        config in policy(),
        now in expiry_near(EPOCH),
    ) {
        let first = apply(&start, &Operation::VerifyConsent, &who, now, &config);
        let second = apply(&start, &Operation::VerifyConsent, &who, now, &config);
        prop_assert_eq!(&first, &second);
        prop_assert!(matches!(first, Ok(None) | Err(_)));
    }

    #[test]
    fn prop_decode_is_total(
        args in raw_args(),
        accounts in prop::collection::vec(identity(), 0..2),
    ) {
        match Call::decode(OnCompletion::NoOp, &args, &accounts, &ArgLimits::default()) {
            Ok(call) => {
                let name = args[0].as_ref();
                let expected: &[u8] = if name == b"view_document" {
                    b"verify_consent"
                } else {
                    name
                };
                prop_assert_eq!(call.name().as_bytes(), expected);
            }
            Err(err) => {
                prop_assert_eq!(ConsentError::from(err).kind(), RejectKind::Validation);
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_engine_rejections_are_atomic(
        config in policy(),
        steps in prop::collection::vec(
            (caller(Parties::new()), operation(Parties::new(), EPOCH)),
            1..16,
        ),
    ) {
        let rt = runtime();
        rt.block_on(async {
            let fixture = TestFixture::with_policy(config);
            let instance = fixture.created().await.unwrap();
            let mut mutations = 0;

            for (who, op) in steps {
                let before = fixture.engine.record(instance).await.unwrap();
                let outcome = fixture
                    .engine
                    .invoke(instance, &Invocation::new(who, op))
                    .await
                    .unwrap();
                let after = fixture.engine.record(instance).await.unwrap();

                match outcome {
                    Outcome::Rejected(_) | Outcome::Accepted(Effect::Unchanged) => {
                        assert_eq!(after, before);
                    }
                    Outcome::Accepted(Effect::Updated(record)) => {
                        assert_eq!(after, record);
                        mutations += 1;
                    }
                    Outcome::Accepted(Effect::Destroyed) => panic!("unexpected destroy"),
                }
            }

            let history = fixture.engine.history(instance).await.unwrap();
            assert_eq!(history.len(), mutations + 1);
            assert!(fixture.engine.verify_history(instance).await.unwrap());
        });
    }

    #[test]
    fn prop_engine_verify_matches_clock(
        ttl in 1u64..=3600,
        elapsed in 0u64..=7200,
    ) {
        let rt = runtime();
        let accepted = rt.block_on(async {
            let fixture = TestFixture::new();
            let instance = fixture.granted(ttl).await.unwrap();
            fixture.clock.advance(elapsed);
            fixture
                .invoke(instance, fixture.parties.requester, Operation::VerifyConsent)
                .await
                .unwrap()
                .is_accepted()
        });
        prop_assert_eq!(accepted, elapsed < ttl);
    }
}
