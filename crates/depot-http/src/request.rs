//! Typed JSON request bodies.
//!
//! Bodies are deserialized once at the boundary; handlers only see these
//! structs. Field names are camelCase on the wire.

use std::fmt;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// `POST /api/signed-url`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUrlRequest {
    /// Warehouse the file belongs to.
    #[serde(default)]
    pub warehouse_id: String,
    /// Stored filename.
    #[serde(default)]
    pub filename: String,
    /// Requested lifetime in seconds. Also accepted as `ttlSeconds`.
    #[serde(default, alias = "ttlSeconds")]
    pub expires_in: Option<i64>,
}

/// `POST /api/admin/verify-file`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyFileRequest {
    /// File id (`f-...`).
    #[serde(default)]
    pub file_id: String,
    /// New verification state.
    pub is_verified: bool,
}

/// `POST /api/auth/login`
#[derive(Clone, Deserialize)]
pub struct LoginRequest {
    /// Login email.
    #[serde(default)]
    pub email: String,
    /// Plain-text password.
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Deserialize a JSON request body.
///
/// # Errors
///
/// Returns 400 when the body is not valid JSON for `T`.
pub fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "rejected request body");
        ApiError::bad_request("Invalid JSON body")
    })
}
