//! The engine: dispatches invocations against stored consent instances.
//!
//! Each invocation runs load, evaluate, commit. Policy evaluation is pure
//! (see `consent_kernel_policy::transition`); the engine only supplies the
//! current record and time and commits the result atomically. A rejected
//! call never reaches the store.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use consent_kernel_core::{
    verify_chain, ArgLimits, Call, Clock, ConsentError, ConsentRecord, Identity, InstanceId,
    Invocation, JournalEntry, JournalOp, OnCompletion, SystemClock, Timestamp,
};
use consent_kernel_policy::{transition, ConsentView, PolicyConfig, Transition};
use consent_kernel_store::{CommitResult, Store, StoredInstance};

use crate::error::{EngineError, Result};

/// How many times a commit is re-evaluated after losing a revision race.
pub const MAX_COMMIT_ATTEMPTS: u32 = 8;

/// Configuration for the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Guard variant.
    pub policy: PolicyConfig,
    /// Argument limits applied when decoding wire calls.
    pub limits: ArgLimits,
    /// Whether accepted mutations are appended to the audit journal.
    pub journal: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            policy: PolicyConfig::default(),
            limits: ArgLimits::default(),
            journal: true,
        }
    }
}

/// What an accepted call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Nothing was written.
    Unchanged,
    /// The record was replaced; this is the new value.
    Updated(ConsentRecord),
    /// The instance was destroyed.
    Destroyed,
}

/// Result of evaluating one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Accepted(Effect),
    Rejected(ConsentError),
}

impl Outcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted(_))
    }

    pub fn rejection(&self) -> Option<&ConsentError> {
        match self {
            Outcome::Rejected(err) => Some(err),
            Outcome::Accepted(_) => None,
        }
    }
}

/// The consent engine.
///
/// Generic over storage and time source. Cheap to share behind an `Arc`;
/// every method takes `&self`.
pub struct ConsentEngine<S: Store, C: Clock = SystemClock> {
    store: Arc<S>,
    clock: C,
    config: EngineConfig,
}

impl<S: Store> ConsentEngine<S, SystemClock> {
    /// An engine reading wall-clock time.
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self::with_clock(store, SystemClock, config)
    }
}

impl<S: Store, C: Clock> ConsentEngine<S, C> {
    pub fn with_clock(store: S, clock: C, config: EngineConfig) -> Self {
        Self {
            store: Arc::new(store),
            clock,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new instance owned by `owner`.
    ///
    /// The record starts `Uninitialized` with every other field unset.
    pub async fn create(&self, owner: Identity) -> Result<InstanceId> {
        let now = self.clock.now();
        let record = ConsentRecord::new(owner);
        let entry = if self.config.journal {
            Some(JournalEntry::new(0, JournalOp::Create, owner, now, None, &record)?)
        } else {
            None
        };

        let instance = self
            .store
            .create_instance(&record.to_fields(), entry.as_ref())
            .await?;
        tracing::info!(%instance, %owner, "consent instance created");
        Ok(instance)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Dispatch
    // ─────────────────────────────────────────────────────────────────────────

    /// Decode a raw host invocation and evaluate it at the current time.
    ///
    /// `args[0]` is the operation name for plain calls. `accounts` are the
    /// invocation's foreign account references.
    pub async fn dispatch(
        &self,
        instance: InstanceId,
        caller: Identity,
        completion: OnCompletion,
        args: &[Bytes],
        accounts: &[Identity],
    ) -> Result<Outcome> {
        let call = match Call::decode(completion, args, accounts, &self.config.limits) {
            Ok(call) => call,
            Err(err) => {
                let err = ConsentError::from(err);
                self.log_rejection(instance, "decode", &caller, &err);
                return Ok(Outcome::Rejected(err));
            }
        };
        self.invoke(instance, &Invocation { caller, call }).await
    }

    /// Host boundary: evaluate a raw invocation and report accept or reject.
    pub async fn submit(
        &self,
        instance: InstanceId,
        caller: Identity,
        completion: OnCompletion,
        args: &[Bytes],
        accounts: &[Identity],
    ) -> Result<bool> {
        let outcome = self
            .dispatch(instance, caller, completion, args, accounts)
            .await?;
        Ok(outcome.is_accepted())
    }

    /// Evaluate a decoded invocation at the current time.
    pub async fn invoke(&self, instance: InstanceId, invocation: &Invocation) -> Result<Outcome> {
        self.invoke_at(instance, invocation, self.clock.now()).await
    }

    /// Evaluate a decoded invocation at an explicit time.
    ///
    /// If another writer commits between load and commit, the call is
    /// re-evaluated against the newer record, exactly as if it had been
    /// ordered after that writer.
    pub async fn invoke_at(
        &self,
        instance: InstanceId,
        invocation: &Invocation,
        now: Timestamp,
    ) -> Result<Outcome> {
        let name = invocation.call.name();
        let caller = &invocation.caller;

        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let (record, revision) = self.load(instance).await?;

            let policy = &self.config.policy;
            let next = match transition(&record, &invocation.call, caller, now, policy) {
                Ok(next) => next,
                Err(err) => {
                    self.log_rejection(instance, name, caller, &err);
                    return Ok(Outcome::Rejected(err));
                }
            };

            let committed = match next {
                Transition::Unchanged => {
                    tracing::debug!(
                        %instance,
                        operation = name,
                        %caller,
                        "accepted without mutation"
                    );
                    return Ok(Outcome::Accepted(Effect::Unchanged));
                }
                Transition::Updated { record, updates } => {
                    let entry = match journal_op(&invocation.call) {
                        Some(op) if self.config.journal => {
                            Some(self.next_entry(instance, op, *caller, now, &record).await?)
                        }
                        _ => None,
                    };
                    let result = self
                        .store
                        .commit(instance, revision, &updates, entry.as_ref())
                        .await?;
                    self.settle(instance, result)?
                        .then_some(Outcome::Accepted(Effect::Updated(record)))
                }
                Transition::Destroy => {
                    let result = self.store.destroy_instance(instance, revision).await?;
                    let destroyed = self.settle(instance, result)?;
                    if destroyed {
                        tracing::info!(%instance, %caller, "consent instance destroyed");
                    }
                    destroyed.then_some(Outcome::Accepted(Effect::Destroyed))
                }
            };

            if let Some(outcome) = committed {
                tracing::debug!(%instance, operation = name, %caller, "accepted");
                return Ok(outcome);
            }
            tracing::debug!(%instance, operation = name, "revision moved, re-evaluating");
        }

        Err(EngineError::CommitConflict {
            instance,
            attempts: MAX_COMMIT_ATTEMPTS,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// The current record.
    pub async fn record(&self, instance: InstanceId) -> Result<ConsentRecord> {
        Ok(self.load(instance).await?.0)
    }

    /// The current record interpreted at the current time.
    pub async fn view(&self, instance: InstanceId) -> Result<ConsentView> {
        self.view_at(instance, self.clock.now()).await
    }

    pub async fn view_at(&self, instance: InstanceId, now: Timestamp) -> Result<ConsentView> {
        Ok(ConsentView::new(self.record(instance).await?, now))
    }

    /// The audit journal, oldest first.
    pub async fn history(&self, instance: InstanceId) -> Result<Vec<JournalEntry>> {
        Ok(self.store.journal(instance).await?)
    }

    /// Whether the journal is intact.
    ///
    /// The last snapshot is also compared with the live record, but only
    /// when the journal covers every commit (head seq equals the revision).
    /// Commits made with journaling off leave a gap that is not an error.
    pub async fn verify_history(&self, instance: InstanceId) -> Result<bool> {
        let (record, revision) = self.load(instance).await?;
        let entries = self.history(instance).await?;
        if !verify_chain(&entries) {
            return Ok(false);
        }
        match entries.last() {
            Some(last) if last.seq == revision => Ok(last.record()? == record),
            Some(_) | None => Ok(true),
        }
    }

    /// All live instances.
    pub async fn instances(&self) -> Result<Vec<InstanceId>> {
        Ok(self.store.list_instances().await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    async fn load(&self, instance: InstanceId) -> Result<(ConsentRecord, u64)> {
        let StoredInstance { fields, revision } = self
            .store
            .load_fields(instance)
            .await?
            .ok_or(EngineError::InstanceNotFound(instance))?;
        Ok((ConsentRecord::from_fields(&fields)?, revision))
    }

    async fn next_entry(
        &self,
        instance: InstanceId,
        op: JournalOp,
        caller: Identity,
        now: Timestamp,
        record: &ConsentRecord,
    ) -> Result<JournalEntry> {
        let head = self.store.journal_head(instance).await?;
        let (seq, prev_hash) = match head {
            Some(head) => (head.seq + 1, Some(head.state_hash)),
            None => (0, None),
        };
        Ok(JournalEntry::new(seq, op, caller, now, prev_hash, record)?)
    }

    /// `Ok(true)` if the write landed, `Ok(false)` if it should be retried.
    fn settle(&self, instance: InstanceId, result: CommitResult) -> Result<bool> {
        match result {
            CommitResult::Committed { .. } => Ok(true),
            CommitResult::Conflict { .. } => Ok(false),
            CommitResult::NotFound => Err(EngineError::InstanceNotFound(instance)),
        }
    }

    fn log_rejection(
        &self,
        instance: InstanceId,
        operation: &str,
        caller: &Identity,
        err: &ConsentError,
    ) {
        tracing::info!(
            %instance,
            operation,
            %caller,
            kind = ?err.kind(),
            reason = %err,
            "rejected"
        );
    }
}

fn journal_op(call: &Call) -> Option<JournalOp> {
    match call {
        Call::Business(operation) => JournalOp::for_operation(operation.kind()),
        Call::Lifecycle(_) => None,
    }
}
