//! Test fixtures and helpers.
//!
//! Common setup code for integration and property tests.

use std::sync::Arc;

use bytes::Bytes;

use consent_kernel::{ConsentEngine, EngineConfig, Outcome};
use consent_kernel_core::{
    Clock, ConsentRecord, ConsentRequest, ConsentStatus, ConsentTerms, GrantTerms, Identity,
    InstanceId, Invocation, ManualClock, Operation, Timestamp,
};
use consent_kernel_policy::PolicyConfig;
use consent_kernel_store::MemoryStore;

/// Fixed start time for fixtures: 2025-01-14T16:00:00Z.
pub const EPOCH: Timestamp = Timestamp(1_736_870_400);

/// Thirty days in seconds.
pub const THIRTY_DAYS: u64 = 2_592_000;

/// The three identities every scenario needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parties {
    pub owner: Identity,
    pub requester: Identity,
    /// Neither owner nor requester.
    pub stranger: Identity,
}

impl Parties {
    pub fn new() -> Self {
        Self {
            owner: Identity::derive("owner"),
            requester: Identity::derive("requester"),
            stranger: Identity::derive("stranger"),
        }
    }

    /// A record owned by `owner`, requested by `requester`, in `status`.
    pub fn record(&self, status: ConsentStatus, expiry: Timestamp) -> ConsentRecord {
        let mut record = ConsentRecord::new(self.owner);
        if status != ConsentStatus::Uninitialized {
            record.requester = Some(self.requester);
            record.document_ref = Bytes::from_static(b"h1");
            record.document_type = Bytes::from_static(b"Aadhaar");
            record.request_id = Bytes::from_static(b"r1");
        }
        if status == ConsentStatus::Granted || status == ConsentStatus::Revoked {
            record.scope = Bytes::from_static(b"view,download");
            record.expiry = expiry;
        }
        record.status = status;
        record
    }
}

impl Default for Parties {
    fn default() -> Self {
        Self::new()
    }
}

/// A `request_consent` naming `requester`.
pub fn request(requester: Identity) -> Operation {
    Operation::RequestConsent(ConsentRequest {
        document_ref: Bytes::from_static(b"h1"),
        document_type: Bytes::from_static(b"Aadhaar"),
        request_id: Bytes::from_static(b"r1"),
        requester,
    })
}

/// A `grant_consent` expiring at `expiry` with no recipient account.
pub fn grant(expiry: Timestamp) -> Operation {
    Operation::GrantConsent(GrantTerms {
        terms: terms(expiry, "view,download"),
        recipient: None,
    })
}

/// An `update_consent` to `expiry` and `scope`.
pub fn update(expiry: Timestamp, scope: &str) -> Operation {
    Operation::UpdateConsent(terms(expiry, scope))
}

fn terms(expiry: Timestamp, scope: &str) -> ConsentTerms {
    ConsentTerms {
        expiry,
        scope: Bytes::copy_from_slice(scope.as_bytes()),
        metadata: Bytes::new(),
    }
}

/// An engine over a memory store with a manual clock starting at [`EPOCH`].
pub struct TestFixture {
    pub engine: ConsentEngine<MemoryStore, Arc<ManualClock>>,
    pub clock: Arc<ManualClock>,
    pub parties: Parties,
}

impl TestFixture {
    /// A fixture using the default (document-access) policy.
    pub fn new() -> Self {
        Self::with_policy(PolicyConfig::default())
    }

    pub fn with_policy(policy: PolicyConfig) -> Self {
        let clock = Arc::new(ManualClock::new(EPOCH));
        let config = EngineConfig {
            policy,
            ..EngineConfig::default()
        };
        Self {
            engine: ConsentEngine::with_clock(MemoryStore::new(), Arc::clone(&clock), config),
            clock,
            parties: Parties::new(),
        }
    }

    /// Invoke `operation` as `caller`.
    pub async fn invoke(
        &self,
        instance: InstanceId,
        caller: Identity,
        operation: Operation,
    ) -> consent_kernel::Result<Outcome> {
        let invocation = Invocation::new(caller, operation);
        self.engine.invoke(instance, &invocation).await
    }

    /// A fresh instance owned by the fixture's owner.
    pub async fn created(&self) -> consent_kernel::Result<InstanceId> {
        self.engine.create(self.parties.owner).await
    }

    /// An instance with a pending request from the fixture's requester.
    pub async fn pending(&self) -> consent_kernel::Result<InstanceId> {
        let instance = self.created().await?;
        self.invoke(instance, self.parties.requester, request(self.parties.requester))
            .await?;
        Ok(instance)
    }

    /// An instance granted for `ttl` seconds from now.
    pub async fn granted(&self, ttl: u64) -> consent_kernel::Result<InstanceId> {
        let instance = self.pending().await?;
        let expiry = self.clock.now().saturating_add(ttl);
        self.invoke(instance, self.parties.owner, grant(expiry)).await?;
        Ok(instance)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
