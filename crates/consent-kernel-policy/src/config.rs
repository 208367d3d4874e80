//! Policy configuration.
//!
//! Two deployed contract variants disagree on a few guards. Rather than pick
//! one, both are expressible here and selected by the host.

use serde::{Deserialize, Serialize};

use consent_kernel_core::Role;

/// Who may pass `verify_consent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Audience {
    /// The owner or the requester.
    OwnerOrRequester,
    /// Only the requester.
    RequesterOnly,
}

impl Audience {
    pub fn role(&self) -> Role {
        match self {
            Audience::OwnerOrRequester => Role::OwnerOrRequester,
            Audience::RequesterOnly => Role::Requester,
        }
    }
}

/// Variant-dependent guard settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// `grant_consent` requires `status == Pending`.
    pub grant_requires_pending: bool,

    /// `revoke_consent` requires `status == Granted`.
    pub revoke_requires_granted: bool,

    pub verify_audience: Audience,
}

impl PolicyConfig {
    /// The document-access variant: status preconditions on grant and
    /// revoke, verification by owner or requester.
    pub fn document_access() -> Self {
        Self {
            grant_requires_pending: true,
            revoke_requires_granted: true,
            verify_audience: Audience::OwnerOrRequester,
        }
    }

    /// The consent-manager variant: no status preconditions, verification by
    /// the requester only.
    pub fn consent_manager() -> Self {
        Self {
            grant_requires_pending: false,
            revoke_requires_granted: false,
            verify_audience: Audience::RequesterOnly,
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self::document_access()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_document_access() {
        assert_eq!(PolicyConfig::default(), PolicyConfig::document_access());
    }

    #[test]
    fn test_config_json() {
        let json = serde_json::to_string(&PolicyConfig::consent_manager()).unwrap();
        let parsed: PolicyConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.verify_audience, Audience::RequesterOnly);
        assert!(!parsed.grant_requires_pending);
    }
}
