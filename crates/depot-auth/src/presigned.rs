//! Capability URL issuance and verification.
//!
//! A capability URL grants time-limited read access to one file without any
//! other credential:
//!
//! ```text
//! /api/files/<warehouseId>/<filename>?expires=<unix-seconds>&signature=<hex>
//! ```
//!
//! - `expires` - absolute expiry, Unix seconds. Valid while `now <= expires`.
//! - `signature` - lowercase hex HMAC-SHA256 over
//!   [`string_to_sign`](crate::canonical::string_to_sign).
//!
//! Issued URLs are relative. Verification also accepts absolute URLs and
//! ignores their scheme and authority.

use depot_core::{EpochSeconds, FileRef};
use tracing::debug;

use crate::canonical::{clamp_ttl, file_path, split_file_path, string_to_sign};
use crate::error::AuthError;
use crate::signature::SigningKey;

/// Name of the expiry query parameter.
pub const EXPIRES_PARAM: &str = "expires";

/// Name of the signature query parameter.
pub const SIGNATURE_PARAM: &str = "signature";

/// A parsed, not yet verified, capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    /// Decoded warehouse id from the URL path.
    pub warehouse_id: String,
    /// Decoded filename from the URL path.
    pub filename: String,
    /// Absolute expiry in Unix seconds.
    pub expires_at: EpochSeconds,
    /// The signature as presented.
    pub signature: String,
}

impl Capability {
    /// The file this capability claims to cover.
    #[must_use]
    pub fn file_ref(&self) -> FileRef {
        FileRef::new(&self.warehouse_id, &self.filename)
    }
}

/// An issued capability URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityUrl {
    url: String,
    expires_at: EpochSeconds,
}

impl CapabilityUrl {
    /// The relative URL, including query string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.url
    }

    /// The absolute expiry embedded in the URL.
    #[must_use]
    pub fn expires_at(&self) -> EpochSeconds {
        self.expires_at
    }

    /// Consume into the URL string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.url
    }
}

/// Mints and checks capability URLs under one signing key.
///
/// Stateless apart from the key; safe to share across tasks.
///
/// # Examples
///
/// ```
/// use depot_auth::presigned::CapabilityEngine;
/// use depot_auth::signature::SigningKey;
/// use depot_core::FileRef;
///
/// let engine = CapabilityEngine::new(SigningKey::new("secret"));
/// let url = engine.issue(&FileRef::new("w-1", "a/b.png"), 3600, 1000);
/// assert!(url.as_str().starts_with("/api/files/w-1/a/b.png?expires=4600&signature="));
/// assert!(engine.verify(url.as_str(), 4600));
/// assert!(!engine.verify(url.as_str(), 4601));
/// ```
#[derive(Debug, Clone)]
pub struct CapabilityEngine {
    key: SigningKey,
}

impl CapabilityEngine {
    /// Create an engine signing with `key`.
    #[must_use]
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// Mint a capability URL for `file` valid for `ttl_secs` from `now`.
    ///
    /// `ttl_secs` is clamped into `[1, 86400]`.
    #[must_use]
    pub fn issue(&self, file: &FileRef, ttl_secs: i64, now: EpochSeconds) -> CapabilityUrl {
        let expires_at = now.saturating_add(clamp_ttl(ttl_secs));
        let canonical = string_to_sign(&file.warehouse_id, &file.filename, expires_at);
        let signature = self.key.sign_hex(canonical.as_bytes());

        debug!(file = %file, expires_at, "issued capability url");

        CapabilityUrl {
            url: format!(
                "{}?{EXPIRES_PARAM}={expires_at}&{SIGNATURE_PARAM}={signature}",
                file_path(&file.warehouse_id, &file.filename)
            ),
            expires_at,
        }
    }

    /// Parse a capability URL (relative or absolute) into its parts.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MalformedCapability`] if the input is not a URL or
    /// the path is not a file path, and [`AuthError::MissingQueryParam`] if
    /// `expires` or `signature` is absent.
    pub fn parse_capability_url(&self, input: &str) -> Result<Capability, AuthError> {
        let uri = http::Uri::try_from(input)
            .map_err(|_| AuthError::MalformedCapability("not a valid URL"))?;
        let (warehouse_id, filename) = split_file_path(uri.path())
            .ok_or(AuthError::MalformedCapability("not a file path"))?;
        parse_capability_query(warehouse_id, filename, uri.query().unwrap_or(""))
    }

    /// Check a parsed capability against the key and the current time.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RequestExpired`] when `now > expires_at`, or
    /// [`AuthError::SignatureDoesNotMatch`] when the signature is wrong.
    pub fn check(&self, capability: &Capability, now: EpochSeconds) -> Result<(), AuthError> {
        if now > capability.expires_at {
            debug!(expires_at = capability.expires_at, now, "capability expired");
            return Err(AuthError::RequestExpired);
        }

        let canonical = string_to_sign(
            &capability.warehouse_id,
            &capability.filename,
            capability.expires_at,
        );
        if !self
            .key
            .verify_hex(canonical.as_bytes(), &capability.signature)
        {
            debug!(file = %capability.file_ref(), "capability signature mismatch");
            return Err(AuthError::SignatureDoesNotMatch);
        }

        Ok(())
    }

    /// Whether `input` is a valid, unexpired capability URL at `now`.
    ///
    /// Never fails: every parse or check error becomes `false`.
    #[must_use]
    pub fn verify(&self, input: &str, now: EpochSeconds) -> bool {
        self.parse_capability_url(input)
            .and_then(|capability| self.check(&capability, now))
            .is_ok()
    }
}

/// Assemble a [`Capability`] from a decoded path and the raw query string.
///
/// # Errors
///
/// See [`CapabilityEngine::parse_capability_url`].
pub fn parse_capability_query(
    warehouse_id: String,
    filename: String,
    query: &str,
) -> Result<Capability, AuthError> {
    let mut expires = None;
    let mut signature = None;
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            EXPIRES_PARAM if expires.is_none() => expires = Some(value.into_owned()),
            SIGNATURE_PARAM if signature.is_none() => signature = Some(value.into_owned()),
            _ => {}
        }
    }

    let expires = expires.ok_or(AuthError::MissingQueryParam(EXPIRES_PARAM))?;
    let signature = signature.ok_or(AuthError::MissingQueryParam(SIGNATURE_PARAM))?;
    if signature.is_empty() {
        return Err(AuthError::MissingQueryParam(SIGNATURE_PARAM));
    }

    Ok(Capability {
        warehouse_id,
        filename,
        expires_at: parse_expires(&expires)?,
        signature,
    })
}

/// Parse `expires` in its canonical decimal form only.
///
/// Forms like `+4600` or `04600` parse to the same integer but are different
/// bytes on the wire, so they are rejected.
fn parse_expires(raw: &str) -> Result<EpochSeconds, AuthError> {
    let canonical_digits = !raw.is_empty()
        && raw.bytes().all(|b| b.is_ascii_digit())
        && (raw == "0" || !raw.starts_with('0'));
    if !canonical_digits {
        return Err(AuthError::MalformedCapability("expires is not a timestamp"));
    }
    raw.parse()
        .map_err(|_| AuthError::MalformedCapability("expires is out of range"))
}
