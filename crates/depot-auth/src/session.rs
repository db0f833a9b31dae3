//! Signed session tokens and the `session` cookie.
//!
//! A token is `<base64url(json claims)>.<hex hmac>`, where the HMAC covers the
//! encoded claims segment. Tokens are stateless; logging out only clears the
//! cookie.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use depot_core::{EpochSeconds, Role, UserRecord};
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AuthError;
use crate::signature::SigningKey;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session";

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    /// User id.
    pub sub: String,
    /// User email at login time.
    pub email: String,
    /// Role at login time.
    pub role: Role,
    /// Entitled warehouses at login time.
    #[serde(default)]
    pub warehouse_ids: Vec<String>,
    /// Issued at, Unix seconds.
    pub iat: EpochSeconds,
    /// Expiry, Unix seconds.
    pub exp: EpochSeconds,
}

/// Mints and verifies session tokens.
#[derive(Debug, Clone)]
pub struct SessionCodec {
    key: SigningKey,
    ttl_secs: i64,
}

impl SessionCodec {
    /// Create a codec signing with `key` and issuing tokens valid for `ttl_secs`.
    #[must_use]
    pub fn new(key: SigningKey, ttl_secs: i64) -> Self {
        Self { key, ttl_secs }
    }

    /// Lifetime of minted tokens.
    #[must_use]
    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// Mint a token for `user`.
    #[must_use]
    pub fn mint(&self, user: &UserRecord, now: EpochSeconds) -> String {
        let claims = SessionClaims {
            sub: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            warehouse_ids: user.warehouse_ids.clone(),
            iat: now,
            exp: now.saturating_add(self.ttl_secs),
        };
        self.encode(&claims)
    }

    /// Sign an arbitrary claims set.
    #[must_use]
    pub fn encode(&self, claims: &SessionClaims) -> String {
        // Serializing a struct of strings and integers cannot fail.
        let json = serde_json::to_vec(claims).unwrap_or_default();
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = self.key.sign_hex(payload.as_bytes());
        format!("{payload}.{signature}")
    }

    /// Verify `token` and return its claims.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MalformedSessionToken`] if the token is not two
    /// segments or its payload is not valid claims JSON,
    /// [`AuthError::SignatureDoesNotMatch`] if the signature is wrong, and
    /// [`AuthError::SessionExpired`] when `now > exp`.
    pub fn verify(&self, token: &str, now: EpochSeconds) -> Result<SessionClaims, AuthError> {
        let (payload, signature) = token
            .split_once('.')
            .ok_or(AuthError::MalformedSessionToken)?;

        if !self.key.verify_hex(payload.as_bytes(), signature) {
            debug!("session token signature mismatch");
            return Err(AuthError::SignatureDoesNotMatch);
        }

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| AuthError::MalformedSessionToken)?;
        let claims: SessionClaims =
            serde_json::from_slice(&json).map_err(|_| AuthError::MalformedSessionToken)?;

        if now > claims.exp {
            debug!(sub = %claims.sub, "session expired");
            return Err(AuthError::SessionExpired);
        }
        Ok(claims)
    }
}

/// Extract the session token from the `Cookie` headers, if any.
#[must_use]
pub fn session_token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(http::header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim_matches('"').to_owned())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value establishing a session.
#[must_use]
pub fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie =
        format!("{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age_secs}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value clearing the session.
#[must_use]
pub fn expired_session_cookie(secure: bool) -> String {
    session_cookie("", 0, secure)
}
