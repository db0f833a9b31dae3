//! Resolving the caller behind an unsigned request.
//!
//! Exactly one credential scheme is consulted per request. An API key (the
//! `x-api-key` header, or `Authorization: Bearer <key>`) takes precedence; when
//! one is presented the session cookie is not looked at.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use depot_core::{Clock, Directory, Identity};
use http::HeaderMap;
use http::request::Parts;
use tracing::debug;

use crate::session::{SessionCodec, session_token_from_headers};

/// Header carrying a warehouse API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Produces the [`Identity`] behind a request, if any.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolve the caller from request metadata. `None` means unauthenticated.
    async fn resolve(&self, parts: &Parts) -> Option<Identity>;
}

/// The credential a request presents.
#[derive(Clone, PartialEq, Eq)]
pub enum PresentedCredential {
    /// A warehouse API key.
    ApiKey(String),
    /// A session token from the cookie.
    Session(String),
    /// Nothing.
    None,
}

impl PresentedCredential {
    /// Pick the credential from request headers.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        if let Some(key) = api_key_from_headers(headers) {
            return Self::ApiKey(key);
        }
        match session_token_from_headers(headers) {
            Some(token) => Self::Session(token),
            None => Self::None,
        }
    }
}

impl fmt::Debug for PresentedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
            Self::Session(_) => f.write_str("Session(<redacted>)"),
            Self::None => f.write_str("None"),
        }
    }
}

fn api_key_from_headers(headers: &HeaderMap) -> Option<String> {
    let direct = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(key) = direct {
        return Some(key.to_owned());
    }

    headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}

/// Resolves API keys and session cookies against a [`Directory`].
///
/// Session users are re-read from the directory so role and entitlement
/// changes take effect before the token expires.
pub struct CredentialResolver {
    directory: Arc<dyn Directory>,
    sessions: SessionCodec,
    clock: Arc<dyn Clock>,
}

impl CredentialResolver {
    /// Create a resolver.
    #[must_use]
    pub fn new(directory: Arc<dyn Directory>, sessions: SessionCodec, clock: Arc<dyn Clock>) -> Self {
        Self {
            directory,
            sessions,
            clock,
        }
    }

    /// Resolve from headers alone.
    #[must_use]
    pub fn resolve_headers(&self, headers: &HeaderMap) -> Option<Identity> {
        match PresentedCredential::from_headers(headers) {
            PresentedCredential::ApiKey(key) => {
                let record = self.directory.find_api_key(&key);
                if record.is_none() {
                    debug!("unknown api key presented");
                }
                record.map(|r| r.identity())
            }
            PresentedCredential::Session(token) => {
                let claims = match self.sessions.verify(&token, self.clock.now()) {
                    Ok(claims) => claims,
                    Err(e) => {
                        debug!(error = %e, "session rejected");
                        return None;
                    }
                };
                let user = self.directory.find_user(&claims.sub);
                if user.is_none() {
                    debug!(sub = %claims.sub, "session user no longer exists");
                }
                user.map(|u| u.identity())
            }
            PresentedCredential::None => None,
        }
    }
}

impl fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("sessions", &self.sessions)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl IdentityResolver for CredentialResolver {
    async fn resolve(&self, parts: &Parts) -> Option<Identity> {
        self.resolve_headers(&parts.headers)
    }
}
