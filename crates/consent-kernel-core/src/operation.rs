//! Operations and their wire decoding.
//!
//! The set of operations is closed: once decoded, a call is an enum matched
//! exhaustively downstream. Operation names are only ever compared here, in
//! [`Call::decode`].

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;
use crate::types::{Identity, Timestamp};
use crate::validation::{ArgLimits, Args};

/// Discriminator for business operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    RequestConsent,
    GrantConsent,
    UpdateConsent,
    RevokeConsent,
    VerifyConsent,
}

impl OperationKind {
    /// Canonical wire name.
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::RequestConsent => "request_consent",
            OperationKind::GrantConsent => "grant_consent",
            OperationKind::UpdateConsent => "update_consent",
            OperationKind::RevokeConsent => "revoke_consent",
            OperationKind::VerifyConsent => "verify_consent",
        }
    }

    /// Resolve a wire name. `view_document` is an alias of `verify_consent`.
    pub fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"request_consent" => Some(OperationKind::RequestConsent),
            b"grant_consent" => Some(OperationKind::GrantConsent),
            b"update_consent" => Some(OperationKind::UpdateConsent),
            b"revoke_consent" => Some(OperationKind::RevokeConsent),
            b"verify_consent" | b"view_document" => Some(OperationKind::VerifyConsent),
            _ => None,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Arguments of `request_consent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRequest {
    pub document_ref: Bytes,
    pub document_type: Bytes,
    pub request_id: Bytes,
    pub requester: Identity,
}

/// Expiry, scope, and metadata as written by `update_consent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentTerms {
    pub expiry: Timestamp,
    pub scope: Bytes,
    pub metadata: Bytes,
}

/// Arguments of `grant_consent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantTerms {
    pub terms: ConsentTerms,

    /// Recipient to bind when the record has no requester yet.
    pub recipient: Option<Identity>,
}

/// A business operation with its decoded arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    RequestConsent(ConsentRequest),
    GrantConsent(GrantTerms),
    UpdateConsent(ConsentTerms),
    RevokeConsent,
    VerifyConsent,
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::RequestConsent(_) => OperationKind::RequestConsent,
            Operation::GrantConsent(_) => OperationKind::GrantConsent,
            Operation::UpdateConsent(_) => OperationKind::UpdateConsent,
            Operation::RevokeConsent => OperationKind::RevokeConsent,
            Operation::VerifyConsent => OperationKind::VerifyConsent,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Decode a business operation from positional arguments.
    ///
    /// `args[0]` is the operation name. `accounts` are the foreign account
    /// references attached to the invocation; `grant_consent` reads its
    /// optional recipient from `accounts[0]`. Extra trailing arguments are
    /// ignored.
    pub fn decode(
        args: &[Bytes],
        accounts: &[Identity],
        limits: &ArgLimits,
    ) -> Result<Self, ValidationError> {
        let name = args.first().ok_or(ValidationError::MissingOperation)?;
        let kind = OperationKind::from_name(name).ok_or_else(|| {
            ValidationError::UnknownOperation(String::from_utf8_lossy(name).into_owned())
        })?;
        let reader = Args::new(kind.name(), args, limits);

        let operation = match kind {
            OperationKind::RequestConsent => Operation::RequestConsent(ConsentRequest {
                document_ref: reader.required(1, "document_ref")?,
                document_type: reader.required(2, "document_type")?,
                request_id: reader.required(3, "request_id")?,
                requester: reader.identity(4, "requester")?,
            }),
            OperationKind::GrantConsent => Operation::GrantConsent(GrantTerms {
                terms: ConsentTerms {
                    expiry: reader.expiry(1)?,
                    scope: reader.required(2, "scope")?,
                    metadata: reader.optional(3, "metadata")?,
                },
                recipient: accounts.first().copied(),
            }),
            OperationKind::UpdateConsent => Operation::UpdateConsent(ConsentTerms {
                expiry: reader.expiry(1)?,
                scope: reader.required(2, "scope")?,
                metadata: reader.optional(3, "metadata")?,
            }),
            OperationKind::RevokeConsent => Operation::RevokeConsent,
            OperationKind::VerifyConsent => Operation::VerifyConsent,
        };
        Ok(operation)
    }
}

/// Lifecycle actions on an existing instance, handled before business
/// dispatch. Creation is not an invocation: it happens when the instance is
/// allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lifecycle {
    Delete,
    Upgrade,
    CloseOut,
    OptIn,
}

impl Lifecycle {
    pub fn name(&self) -> &'static str {
        match self {
            Lifecycle::Delete => "delete",
            Lifecycle::Upgrade => "upgrade",
            Lifecycle::CloseOut => "close_out",
            Lifecycle::OptIn => "opt_in",
        }
    }
}

/// The host's on-completion action attached to an invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnCompletion {
    /// Plain call: dispatch on `args[0]`.
    #[default]
    NoOp,
    OptIn,
    CloseOut,
    UpdateApplication,
    DeleteApplication,
}

/// A decoded call: lifecycle or business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Call {
    Lifecycle(Lifecycle),
    Business(Operation),
}

impl Call {
    pub fn name(&self) -> &'static str {
        match self {
            Call::Lifecycle(lifecycle) => lifecycle.name(),
            Call::Business(operation) => operation.name(),
        }
    }

    /// Decode an invocation on an existing instance.
    ///
    /// Any completion other than `NoOp` is a lifecycle action and its
    /// arguments are not inspected.
    pub fn decode(
        completion: OnCompletion,
        args: &[Bytes],
        accounts: &[Identity],
        limits: &ArgLimits,
    ) -> Result<Self, ValidationError> {
        let call = match completion {
            OnCompletion::NoOp => Call::Business(Operation::decode(args, accounts, limits)?),
            OnCompletion::OptIn => Call::Lifecycle(Lifecycle::OptIn),
            OnCompletion::CloseOut => Call::Lifecycle(Lifecycle::CloseOut),
            OnCompletion::UpdateApplication => Call::Lifecycle(Lifecycle::Upgrade),
            OnCompletion::DeleteApplication => Call::Lifecycle(Lifecycle::Delete),
        };
        Ok(call)
    }
}

impl From<Operation> for Call {
    fn from(operation: Operation) -> Self {
        Call::Business(operation)
    }
}

impl From<Lifecycle> for Call {
    fn from(lifecycle: Lifecycle) -> Self {
        Call::Lifecycle(lifecycle)
    }
}

/// A call together with the identity that submitted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub caller: Identity,
    pub call: Call,
}

impl Invocation {
    pub fn new(caller: Identity, call: impl Into<Call>) -> Self {
        Self {
            caller,
            call: call.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(values: &[&[u8]]) -> Vec<Bytes> {
        values.iter().map(|v| Bytes::copy_from_slice(v)).collect()
    }

    #[test]
    fn test_decode_request_consent() {
        let requester = Identity::derive("R");
        let hex = requester.to_hex();
        let args = raw(&[b"request_consent", b"h1", b"Aadhaar", b"r1", hex.as_bytes()]);

        let op = Operation::decode(&args, &[], &ArgLimits::default()).unwrap();
        assert_eq!(
            op,
            Operation::RequestConsent(ConsentRequest {
                document_ref: Bytes::from_static(b"h1"),
                document_type: Bytes::from_static(b"Aadhaar"),
                request_id: Bytes::from_static(b"r1"),
                requester,
            })
        );
    }

    #[test]
    fn test_decode_request_missing_requester() {
        let args = raw(&[b"request_consent", b"h1", b"Aadhaar", b"r1"]);
        let result = Operation::decode(&args, &[], &ArgLimits::default());

        assert_eq!(
            result,
            Err(ValidationError::MissingArgument {
                operation: "request_consent",
                index: 4,
                name: "requester"
            })
        );
    }

    #[test]
    fn test_decode_grant_with_recipient() {
        let recipient = Identity::derive("R");
        let args = raw(&[b"grant_consent", b"1800000000", b"view,download"]);

        let op = Operation::decode(&args, &[recipient], &ArgLimits::default()).unwrap();
        match op {
            Operation::GrantConsent(grant) => {
                assert_eq!(grant.terms.expiry, Timestamp(1_800_000_000));
                assert_eq!(grant.terms.scope, "view,download");
                assert!(grant.terms.metadata.is_empty());
                assert_eq!(grant.recipient, Some(recipient));
            }
            other => panic!("unexpected operation: {:?}", other),
        }
    }

    #[test]
    fn test_decode_grant_empty_scope() {
        let args = raw(&[b"grant_consent", b"1800000000", b""]);
        let result = Operation::decode(&args, &[], &ArgLimits::default());

        assert!(matches!(
            result,
            Err(ValidationError::EmptyArgument { name: "scope", .. })
        ));
    }

    #[test]
    fn test_view_document_alias() {
        let args = raw(&[b"view_document"]);
        let op = Operation::decode(&args, &[], &ArgLimits::default()).unwrap();
        assert_eq!(op, Operation::VerifyConsent);
    }

    #[test]
    fn test_unknown_and_missing_operation() {
        let limits = ArgLimits::default();

        assert_eq!(
            Operation::decode(&raw(&[b"hello"]), &[], &limits),
            Err(ValidationError::UnknownOperation("hello".into()))
        );
        assert_eq!(
            Operation::decode(&[], &[], &limits),
            Err(ValidationError::MissingOperation)
        );
    }

    #[test]
    fn test_lifecycle_completions_skip_arguments() {
        let limits = ArgLimits::default();

        let call = Call::decode(OnCompletion::DeleteApplication, &[], &[], &limits).unwrap();
        assert_eq!(call, Call::Lifecycle(Lifecycle::Delete));

        let call = Call::decode(OnCompletion::OptIn, &raw(&[b"junk"]), &[], &limits).unwrap();
        assert_eq!(call, Call::Lifecycle(Lifecycle::OptIn));
    }
}
