//! End-to-end consent flows through the engine.

use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;
use tokio::sync::Barrier;

use consent_kernel::core::{JournalOp, ManualClock};
use consent_kernel::store::{MemoryStore, SqliteStore, Store};
use consent_kernel::{
    ConsentEngine, ConsentStatus, Effect, EffectiveStatus, EngineConfig, EngineError, Identity,
    InstanceId, OnCompletion, Outcome, PolicyConfig, RejectKind, Timestamp,
};

const NOW: Timestamp = Timestamp(1_736_870_400);
const THIRTY_DAYS: u64 = 2_592_000;

struct Parties {
    owner: Identity,
    requester: Identity,
    stranger: Identity,
}

fn parties() -> Parties {
    Parties {
        owner: Identity::derive("O"),
        requester: Identity::derive("R"),
        stranger: Identity::derive("X"),
    }
}

fn engine_with<S: Store>(store: S, policy: PolicyConfig) -> ConsentEngine<S, Arc<ManualClock>> {
    let config = EngineConfig {
        policy,
        ..EngineConfig::default()
    };
    ConsentEngine::with_clock(store, Arc::new(ManualClock::new(NOW)), config)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn memory_engine() -> ConsentEngine<MemoryStore, Arc<ManualClock>> {
    engine_with(MemoryStore::new(), PolicyConfig::default())
}

fn args(values: &[&[u8]]) -> Vec<Bytes> {
    values.iter().map(|v| Bytes::copy_from_slice(v)).collect()
}

fn request_args(requester: &Identity) -> Vec<Bytes> {
    let hex = requester.to_hex();
    args(&[b"request_consent", b"h1", b"Aadhaar", b"r1", hex.as_bytes()])
}

fn grant_args(expiry: Timestamp, scope: &str) -> Vec<Bytes> {
    let expiry = expiry.to_string();
    args(&[b"grant_consent", expiry.as_bytes(), scope.as_bytes()])
}

async fn call<S: Store>(
    engine: &ConsentEngine<S, Arc<ManualClock>>,
    instance: InstanceId,
    caller: Identity,
    args: &[Bytes],
) -> Result<Outcome> {
    Ok(engine
        .dispatch(instance, caller, OnCompletion::NoOp, args, &[])
        .await?)
}

fn rejected_with(outcome: &Outcome, kind: RejectKind) -> bool {
    outcome.rejection().map(|err| err.kind()) == Some(kind)
}

#[tokio::test]
async fn test_document_access_walkthrough() -> Result<()> {
    init_tracing();
    let p = parties();
    let engine = memory_engine();
    let id = engine.create(p.owner).await?;

    // Request opens a pending consent for R.
    let outcome = call(&engine, id, p.owner, &request_args(&p.requester)).await?;
    assert!(outcome.is_accepted());
    let record = engine.record(id).await?;
    assert_eq!(record.status, ConsentStatus::Pending);
    assert_eq!(record.requester, Some(p.requester));
    assert_eq!(record.document_ref, Bytes::from_static(b"h1"));

    // Owner grants for thirty days.
    let expiry = NOW.saturating_add(THIRTY_DAYS);
    let outcome = call(&engine, id, p.owner, &grant_args(expiry, "view,download")).await?;
    assert!(matches!(outcome, Outcome::Accepted(Effect::Updated(_))));
    let granted = engine.record(id).await?;
    assert_eq!(granted.status, ConsentStatus::Granted);
    assert_eq!(granted.expiry, expiry);

    // Requester verifies.
    let outcome = call(&engine, id, p.requester, &args(&[b"verify_consent"])).await?;
    assert_eq!(outcome, Outcome::Accepted(Effect::Unchanged));

    // A stranger cannot grant; nothing moves.
    let outcome = call(&engine, id, p.stranger, &grant_args(expiry, "view")).await?;
    assert!(rejected_with(&outcome, RejectKind::Authorization));
    assert_eq!(engine.record(id).await?, granted);

    // Requester revokes.
    let outcome = call(&engine, id, p.requester, &args(&[b"revoke_consent"])).await?;
    assert!(outcome.is_accepted());
    assert_eq!(engine.record(id).await?.status, ConsentStatus::Revoked);

    // Verification now fails on status.
    let outcome = call(&engine, id, p.requester, &args(&[b"verify_consent"])).await?;
    assert!(rejected_with(&outcome, RejectKind::State));

    let history = engine.history(id).await?;
    let ops: Vec<JournalOp> = history.iter().map(|e| e.operation).collect();
    assert_eq!(
        ops,
        vec![
            JournalOp::Create,
            JournalOp::Request,
            JournalOp::Grant,
            JournalOp::Revoke
        ]
    );
    assert!(engine.verify_history(id).await?);
    Ok(())
}

#[tokio::test]
async fn test_past_expiry_grant_mutates_nothing() -> Result<()> {
    let p = parties();
    let engine = memory_engine();
    let id = engine.create(p.owner).await?;
    call(&engine, id, p.owner, &request_args(&p.requester)).await?;
    let before = engine.record(id).await?;
    let journal_len = engine.history(id).await?.len();

    let outcome = call(&engine, id, p.owner, &grant_args(NOW.saturating_sub(1), "view")).await?;
    assert!(rejected_with(&outcome, RejectKind::Expiry));

    // Expiry equal to now is also in the past.
    let outcome = call(&engine, id, p.owner, &grant_args(NOW, "view")).await?;
    assert!(rejected_with(&outcome, RejectKind::Expiry));

    assert_eq!(engine.record(id).await?, before);
    assert_eq!(engine.history(id).await?.len(), journal_len);
    Ok(())
}

#[tokio::test]
async fn test_verify_fails_once_expired() -> Result<()> {
    let p = parties();
    let engine = memory_engine();
    let id = engine.create(p.owner).await?;
    call(&engine, id, p.owner, &request_args(&p.requester)).await?;
    call(&engine, id, p.owner, &grant_args(NOW.saturating_add(60), "view")).await?;

    let verify = args(&[b"verify_consent"]);
    assert!(call(&engine, id, p.requester, &verify).await?.is_accepted());
    assert_eq!(engine.view(id).await?.remaining(), Some(60));

    engine.clock().advance(60);
    let outcome = call(&engine, id, p.requester, &verify).await?;
    assert!(rejected_with(&outcome, RejectKind::Expiry));

    // Expiry is derived, never written.
    let view = engine.view(id).await?;
    assert_eq!(view.record.status, ConsentStatus::Granted);
    assert_eq!(view.effective, EffectiveStatus::Expired);
    assert!(!view.is_active());
    Ok(())
}

#[tokio::test]
async fn test_update_keeps_status() -> Result<()> {
    let p = parties();
    let engine = memory_engine();
    let id = engine.create(p.owner).await?;
    call(&engine, id, p.owner, &request_args(&p.requester)).await?;

    let expiry = NOW.saturating_add(THIRTY_DAYS).to_string();
    let update = args(&[b"update_consent", expiry.as_bytes(), b"view", b"note"]);

    // Update works on a pending record and leaves it pending.
    assert!(call(&engine, id, p.owner, &update).await?.is_accepted());
    let record = engine.record(id).await?;
    assert_eq!(record.status, ConsentStatus::Pending);
    assert_eq!(record.scope, Bytes::from_static(b"view"));
    assert_eq!(record.metadata, Bytes::from_static(b"note"));

    // Only the owner may update.
    let outcome = call(&engine, id, p.requester, &update).await?;
    assert!(rejected_with(&outcome, RejectKind::Authorization));
    Ok(())
}

#[tokio::test]
async fn test_rejections_by_kind() -> Result<()> {
    let p = parties();
    let engine = memory_engine();
    let id = engine.create(p.owner).await?;

    // Unknown and malformed calls are validation failures.
    let outcome = call(&engine, id, p.owner, &args(&[b"transfer_ownership"])).await?;
    assert!(rejected_with(&outcome, RejectKind::Validation));
    let outcome = call(&engine, id, p.owner, &args(&[b"grant_consent", b"soon", b"view"])).await?;
    assert!(rejected_with(&outcome, RejectKind::Validation));
    let outcome = call(&engine, id, p.owner, &[]).await?;
    assert!(rejected_with(&outcome, RejectKind::Validation));

    // Grant before any request hits the status guard.
    let outcome = call(
        &engine,
        id,
        p.owner,
        &grant_args(NOW.saturating_add(60), "view"),
    )
    .await?;
    assert!(rejected_with(&outcome, RejectKind::State));

    // A stranger cannot revoke even a pending record.
    call(&engine, id, p.owner, &request_args(&p.requester)).await?;
    let outcome = call(&engine, id, p.stranger, &args(&[b"revoke_consent"])).await?;
    assert!(rejected_with(&outcome, RejectKind::Authorization));
    Ok(())
}

#[tokio::test]
async fn test_view_document_alias() -> Result<()> {
    let p = parties();
    let engine = memory_engine();
    let id = engine.create(p.owner).await?;
    call(&engine, id, p.owner, &request_args(&p.requester)).await?;
    call(&engine, id, p.owner, &grant_args(NOW.saturating_add(60), "view")).await?;

    let accepted = engine
        .submit(
            id,
            p.owner,
            OnCompletion::NoOp,
            &args(&[b"view_document"]),
            &[],
        )
        .await?;
    assert!(accepted);

    let accepted = engine
        .submit(
            id,
            p.stranger,
            OnCompletion::NoOp,
            &args(&[b"view_document"]),
            &[],
        )
        .await?;
    assert!(!accepted);
    Ok(())
}

#[tokio::test]
async fn test_request_reopens_granted_record() -> Result<()> {
    let p = parties();
    let engine = memory_engine();
    let id = engine.create(p.owner).await?;
    call(&engine, id, p.owner, &request_args(&p.requester)).await?;
    call(&engine, id, p.owner, &grant_args(NOW.saturating_add(60), "view")).await?;

    // Any identity may reopen the request.
    let outcome = call(&engine, id, p.stranger, &request_args(&p.stranger)).await?;
    assert!(outcome.is_accepted());
    let record = engine.record(id).await?;
    assert_eq!(record.status, ConsentStatus::Pending);
    assert_eq!(record.requester, Some(p.stranger));
    Ok(())
}

#[tokio::test]
async fn test_consent_manager_variant() -> Result<()> {
    let p = parties();
    let engine = engine_with(MemoryStore::new(), PolicyConfig::consent_manager());
    let id = engine.create(p.owner).await?;

    // Grant without a prior request binds the recipient account.
    let outcome = engine
        .dispatch(
            id,
            p.owner,
            OnCompletion::NoOp,
            &grant_args(NOW.saturating_add(60), "view"),
            &[p.requester],
        )
        .await?;
    assert!(outcome.is_accepted());
    assert_eq!(engine.record(id).await?.requester, Some(p.requester));

    // Only the requester verifies.
    let verify = args(&[b"verify_consent"]);
    assert!(call(&engine, id, p.requester, &verify).await?.is_accepted());
    let outcome = call(&engine, id, p.owner, &verify).await?;
    assert!(rejected_with(&outcome, RejectKind::Authorization));

    // Revoke without Granted is allowed; so is revoking twice.
    let revoke = args(&[b"revoke_consent"]);
    assert!(call(&engine, id, p.owner, &revoke).await?.is_accepted());
    assert!(call(&engine, id, p.owner, &revoke).await?.is_accepted());
    assert_eq!(engine.record(id).await?.status, ConsentStatus::Revoked);
    Ok(())
}

#[tokio::test]
async fn test_lifecycle_actions() -> Result<()> {
    let p = parties();
    let engine = memory_engine();
    let id = engine.create(p.owner).await?;
    let before = engine.record(id).await?;

    for completion in [OnCompletion::OptIn, OnCompletion::CloseOut] {
        let outcome = engine.dispatch(id, p.stranger, completion, &[], &[]).await?;
        assert_eq!(outcome, Outcome::Accepted(Effect::Unchanged));
    }

    let outcome = engine
        .dispatch(id, p.stranger, OnCompletion::UpdateApplication, &[], &[])
        .await?;
    assert!(rejected_with(&outcome, RejectKind::Authorization));
    let outcome = engine
        .dispatch(id, p.owner, OnCompletion::UpdateApplication, &[], &[])
        .await?;
    assert_eq!(outcome, Outcome::Accepted(Effect::Unchanged));
    assert_eq!(engine.record(id).await?, before);

    let outcome = engine
        .dispatch(id, p.requester, OnCompletion::DeleteApplication, &[], &[])
        .await?;
    assert!(rejected_with(&outcome, RejectKind::Authorization));

    let outcome = engine
        .dispatch(id, p.owner, OnCompletion::DeleteApplication, &[], &[])
        .await?;
    assert_eq!(outcome, Outcome::Accepted(Effect::Destroyed));
    assert!(engine.instances().await?.is_empty());
    assert!(matches!(
        engine.record(id).await,
        Err(EngineError::InstanceNotFound(missing)) if missing == id
    ));

    // Ids are never reused.
    let next = engine.create(p.owner).await?;
    assert_ne!(next, id);
    Ok(())
}

#[tokio::test]
async fn test_grant_and_revoke_in_either_order() -> Result<()> {
    let p = parties();
    let grant = grant_args(NOW.saturating_add(60), "view");
    let revoke = args(&[b"revoke_consent"]);

    // Grant, then revoke: both land.
    let engine = memory_engine();
    let id = engine.create(p.owner).await?;
    call(&engine, id, p.owner, &request_args(&p.requester)).await?;
    assert!(call(&engine, id, p.owner, &grant).await?.is_accepted());
    assert!(call(&engine, id, p.requester, &revoke).await?.is_accepted());
    assert_eq!(engine.record(id).await?.status, ConsentStatus::Revoked);
    assert_eq!(engine.history(id).await?.len(), 4);

    // Revoke, then grant: revoke finds a pending record and changes nothing.
    let engine = memory_engine();
    let id = engine.create(p.owner).await?;
    call(&engine, id, p.owner, &request_args(&p.requester)).await?;
    let pending = engine.record(id).await?;
    let outcome = call(&engine, id, p.requester, &revoke).await?;
    assert!(rejected_with(&outcome, RejectKind::State));
    assert_eq!(engine.record(id).await?, pending);
    assert!(call(&engine, id, p.owner, &grant).await?.is_accepted());
    assert_eq!(engine.record(id).await?.status, ConsentStatus::Granted);
    assert_eq!(engine.history(id).await?.len(), 3);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_grant_and_revoke_serialize() -> Result<()> {
    init_tracing();
    let p = parties();
    let engine = Arc::new(memory_engine());
    let id = engine.create(p.owner).await?;
    call(&engine, id, p.owner, &request_args(&p.requester)).await?;
    let barrier = Arc::new(Barrier::new(2));

    let grant = {
        let engine = Arc::clone(&engine);
        let barrier = Arc::clone(&barrier);
        let owner = p.owner;
        tokio::spawn(async move {
            barrier.wait().await;
            call(&engine, id, owner, &grant_args(NOW.saturating_add(60), "view")).await
        })
    };
    let revoke = {
        let engine = Arc::clone(&engine);
        let barrier = Arc::clone(&barrier);
        let requester = p.requester;
        tokio::spawn(async move {
            barrier.wait().await;
            call(&engine, id, requester, &args(&[b"revoke_consent"])).await
        })
    };
    let granted = grant.await??;
    let revoked = revoke.await??;

    // Grant always lands. Revoke lands only if ordered after it.
    assert!(granted.is_accepted());
    let status = engine.record(id).await?.status;
    if revoked.is_accepted() {
        assert_eq!(status, ConsentStatus::Revoked);
    } else {
        assert!(rejected_with(&revoked, RejectKind::State));
        assert_eq!(status, ConsentStatus::Granted);
    }
    assert!(engine.verify_history(id).await?);
    Ok(())
}

#[tokio::test]
async fn test_sqlite_state_survives_reopen() -> Result<()> {
    let p = parties();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("consent.db");

    let id = {
        let engine = engine_with(SqliteStore::open(&path)?, PolicyConfig::default());
        let id = engine.create(p.owner).await?;
        call(&engine, id, p.owner, &request_args(&p.requester)).await?;
        call(&engine, id, p.owner, &grant_args(NOW.saturating_add(60), "view")).await?;
        id
    };

    let engine = engine_with(SqliteStore::open(&path)?, PolicyConfig::default());
    let record = engine.record(id).await?;
    assert_eq!(record.status, ConsentStatus::Granted);
    assert_eq!(record.requester, Some(p.requester));
    assert_eq!(engine.history(id).await?.len(), 3);
    assert!(engine.verify_history(id).await?);

    let verify = args(&[b"verify_consent"]);
    assert!(call(&engine, id, p.requester, &verify).await?.is_accepted());
    Ok(())
}
