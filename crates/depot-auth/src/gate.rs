//! The access decision for a file download.
//!
//! Precedence, evaluated fresh per request:
//!
//! 1. A request carrying a `signature` query parameter is judged by the
//!    signature alone. Valid means allow, even if the file is unverified.
//!    Invalid or expired means deny. Identity is never consulted.
//! 2. Otherwise an unverified file is denied to everyone.
//! 3. Otherwise the caller's identity decides: none is denied, admin and
//!    superadmin are allowed, users are allowed only for entitled warehouses.

use std::fmt;
use std::sync::Arc;

use depot_core::{EpochSeconds, FileAccessState, FileRef};
use http::request::Parts;
use tracing::{debug, warn};

use crate::canonical::split_file_path;
use crate::error::AuthError;
use crate::identity::IdentityResolver;
use crate::presigned::{CapabilityEngine, SIGNATURE_PARAM, parse_capability_query};

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Serve the file.
    Allow(AllowReason),
    /// Refuse the request.
    Deny(DenyReason),
}

impl Decision {
    /// Whether the decision allows access.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow(_))
    }
}

/// Why access was allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowReason {
    /// A valid capability URL.
    SignedUrl,
    /// An admin or superadmin identity.
    Privileged,
    /// A user entitled to the file's warehouse.
    Entitled,
}

/// Why access was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The request was signed but the signature is wrong, malformed, or expired.
    BadOrExpiredSignature,
    /// The file is not verified and the request was unsigned.
    NotVerified,
    /// The request was unsigned and carried no usable credential.
    AuthRequired,
    /// The caller is not entitled to the file's warehouse.
    NotEntitled,
}

impl DenyReason {
    /// Message returned to the client.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::BadOrExpiredSignature => "Invalid or expired signature",
            Self::NotVerified => "File not verified",
            Self::AuthRequired => "Authentication required",
            Self::NotEntitled => {
                "Access denied: You do not have permission to access this warehouse"
            }
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Decides whether a request may read a file.
pub struct AccessGate {
    engine: CapabilityEngine,
    resolver: Arc<dyn IdentityResolver>,
}

impl fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessGate")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl AccessGate {
    /// Create a gate.
    #[must_use]
    pub fn new(engine: CapabilityEngine, resolver: Arc<dyn IdentityResolver>) -> Self {
        Self { engine, resolver }
    }

    /// Decide access to `file` for the request described by `parts`.
    pub async fn decide(
        &self,
        parts: &Parts,
        file: &FileRef,
        state: FileAccessState,
        now: EpochSeconds,
    ) -> Decision {
        let query = parts.uri.query().unwrap_or("");
        if has_signature_param(query) {
            return match self.check_signed(parts.uri.path(), query, file, now) {
                Ok(()) => {
                    debug!(file = %file, "allowed by capability url");
                    Decision::Allow(AllowReason::SignedUrl)
                }
                Err(e) => {
                    warn!(file = %file, reason = %e, "capability url rejected");
                    Decision::Deny(DenyReason::BadOrExpiredSignature)
                }
            };
        }

        if !state.is_verified {
            debug!(file = %file, "unsigned request for unverified file");
            return Decision::Deny(DenyReason::NotVerified);
        }

        let Some(identity) = self.resolver.resolve(parts).await else {
            return Decision::Deny(DenyReason::AuthRequired);
        };

        if identity.role.is_privileged() {
            debug!(subject = %identity.subject_id, file = %file, "allowed by role");
            Decision::Allow(AllowReason::Privileged)
        } else if identity.entitled_warehouse_ids.contains(&file.warehouse_id) {
            debug!(subject = %identity.subject_id, file = %file, "allowed by entitlement");
            Decision::Allow(AllowReason::Entitled)
        } else {
            warn!(subject = %identity.subject_id, warehouse = %file.warehouse_id, "not entitled");
            Decision::Deny(DenyReason::NotEntitled)
        }
    }

    fn check_signed(
        &self,
        path: &str,
        query: &str,
        file: &FileRef,
        now: EpochSeconds,
    ) -> Result<(), AuthError> {
        let (warehouse_id, filename) = split_file_path(path)
            .ok_or(AuthError::MalformedCapability("not a file path"))?;
        let capability = parse_capability_query(warehouse_id, filename, query)?;
        if capability.warehouse_id != file.warehouse_id || capability.filename != file.filename {
            return Err(AuthError::FileMismatch);
        }
        self.engine.check(&capability, now)
    }
}

fn has_signature_param(query: &str) -> bool {
    form_urlencoded::parse(query.as_bytes()).any(|(key, _)| key == SIGNATURE_PARAM)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use depot_core::{Identity, Role};
    use http::Request;

    use super::*;
    use crate::signature::SigningKey;

    /// Resolver returning a fixed identity and counting calls.
    #[derive(Default)]
    struct StubResolver {
        identity: Option<Identity>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl IdentityResolver for StubResolver {
        async fn resolve(&self, _parts: &Parts) -> Option<Identity> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.identity.clone()
        }
    }

    fn engine() -> CapabilityEngine {
        CapabilityEngine::new(SigningKey::new("gate-secret"))
    }

    fn gate_with(identity: Option<Identity>) -> (AccessGate, Arc<StubResolver>) {
        let resolver = Arc::new(StubResolver {
            identity,
            calls: AtomicUsize::new(0),
        });
        (AccessGate::new(engine(), resolver.clone()), resolver)
    }

    fn parts(uri: &str) -> Parts {
        Request::get(uri).body(()).expect("request").into_parts().0
    }

    const VERIFIED: FileAccessState = FileAccessState { is_verified: true };
    const UNVERIFIED: FileAccessState = FileAccessState { is_verified: false };

    fn user(warehouses: &[&str]) -> Identity {
        Identity::new("u-1", Role::User, warehouses.iter().map(|w| (*w).to_owned()))
    }

    #[tokio::test]
    async fn test_should_allow_signed_request_for_unverified_file() {
        let file = FileRef::new("w-1", "a/b.png");
        let url = engine().issue(&file, 3600, 1000);
        let (gate, resolver) = gate_with(None);

        let decision = gate.decide(&parts(url.as_str()), &file, UNVERIFIED, 2000).await;
        assert_eq!(decision, Decision::Allow(AllowReason::SignedUrl));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_should_deny_expired_signature_without_falling_back() {
        let file = FileRef::new("w-1", "a/b.png");
        let url = engine().issue(&file, 3600, 1000);
        let (gate, resolver) = gate_with(Some(Identity::new("admin", Role::Admin, Vec::new())));

        let decision = gate.decide(&parts(url.as_str()), &file, VERIFIED, 4601).await;
        assert_eq!(decision, Decision::Deny(DenyReason::BadOrExpiredSignature));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_should_deny_signature_for_another_file() {
        let signed_for = FileRef::new("w-1", "a/b.png");
        let requested = FileRef::new("w-1", "other.png");
        let url = engine().issue(&signed_for, 3600, 1000);
        let (gate, _) = gate_with(None);

        let decision = gate.decide(&parts(url.as_str()), &requested, VERIFIED, 2000).await;
        assert_eq!(decision, Decision::Deny(DenyReason::BadOrExpiredSignature));
    }

    #[tokio::test]
    async fn test_should_deny_empty_signature_param() {
        let file = FileRef::new("w-1", "a.png");
        let (gate, _) = gate_with(Some(user(&["w-1"])));
        let decision = gate
            .decide(&parts("/api/files/w-1/a.png?signature="), &file, VERIFIED, 0)
            .await;
        assert_eq!(decision, Decision::Deny(DenyReason::BadOrExpiredSignature));
    }

    #[tokio::test]
    async fn test_should_deny_unsigned_unverified_even_when_entitled() {
        let file = FileRef::new("w-1", "a.png");
        let (gate, resolver) = gate_with(Some(user(&["w-1"])));
        let decision = gate.decide(&parts("/api/files/w-1/a.png"), &file, UNVERIFIED, 0).await;
        assert_eq!(decision, Decision::Deny(DenyReason::NotVerified));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_should_require_authentication_for_unsigned_request() {
        let file = FileRef::new("w-1", "a.png");
        let (gate, _) = gate_with(None);
        let decision = gate.decide(&parts("/api/files/w-1/a.png"), &file, VERIFIED, 0).await;
        assert_eq!(decision, Decision::Deny(DenyReason::AuthRequired));
    }

    #[tokio::test]
    async fn test_should_apply_entitlements() {
        let (gate, _) = gate_with(Some(user(&["w-1"])));

        let own = FileRef::new("w-1", "a.png");
        let decision = gate.decide(&parts("/api/files/w-1/a.png"), &own, VERIFIED, 0).await;
        assert_eq!(decision, Decision::Allow(AllowReason::Entitled));

        let other = FileRef::new("w-2", "a.png");
        let decision = gate.decide(&parts("/api/files/w-2/a.png"), &other, VERIFIED, 0).await;
        assert_eq!(decision, Decision::Deny(DenyReason::NotEntitled));
    }

    #[tokio::test]
    async fn test_should_allow_privileged_roles_anywhere() {
        for role in [Role::Admin, Role::Superadmin] {
            let (gate, _) = gate_with(Some(Identity::new("root", role, Vec::new())));
            let file = FileRef::new("w-9", "x.bin");
            let decision = gate.decide(&parts("/api/files/w-9/x.bin"), &file, VERIFIED, 0).await;
            assert_eq!(decision, Decision::Allow(AllowReason::Privileged));
        }
    }

    #[test]
    fn test_should_expose_client_messages() {
        assert_eq!(DenyReason::NotVerified.message(), "File not verified");
        assert_eq!(DenyReason::AuthRequired.to_string(), "Authentication required");
        assert!(Decision::Allow(AllowReason::Entitled).is_allowed());
        assert!(!Decision::Deny(DenyReason::NotEntitled).is_allowed());
    }
}
