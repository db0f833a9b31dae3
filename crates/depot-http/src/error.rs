//! HTTP-facing error type.
//!
//! [`ApiError`] pairs a status code with the message returned to the client as
//! `{"error": "<message>"}`. Conversions from the library error types live
//! here so handlers can use `?`.

use depot_auth::DenyReason;
use depot_store::StoreError;
use http::StatusCode;
use tracing::error;

/// An error response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{status}: {message}")]
pub struct ApiError {
    /// HTTP status.
    pub status: StatusCode,
    /// Client-facing message.
    pub message: String,
    /// Seconds until the client may retry, for 429 responses.
    pub retry_after: Option<u64>,
}

impl ApiError {
    /// Create an error with an explicit status.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            retry_after: None,
        }
    }

    /// 400 Bad Request.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// 401 Unauthorized.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    /// 403 Forbidden.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    /// 404 Not Found.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// 405 Method Not Allowed.
    #[must_use]
    pub fn method_not_allowed() -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    }

    /// 413 Payload Too Large.
    #[must_use]
    pub fn payload_too_large() -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
    }

    /// 429 Too Many Requests.
    #[must_use]
    pub fn too_many_requests(retry_after: u64) -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            message: "Too many requests".to_owned(),
            retry_after: Some(retry_after),
        }
    }

    /// 500 Internal Server Error. Details stay in the log.
    #[must_use]
    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

impl From<DenyReason> for ApiError {
    fn from(reason: DenyReason) -> Self {
        let status = match reason {
            DenyReason::AuthRequired => StatusCode::UNAUTHORIZED,
            DenyReason::BadOrExpiredSignature
            | DenyReason::NotVerified
            | DenyReason::NotEntitled => StatusCode::FORBIDDEN,
        };
        Self::new(status, reason.message())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::FileNotFound { .. } | StoreError::BlobNotFound { .. } => {
                Self::not_found("File not found")
            }
            StoreError::InvalidPath(_) => Self::bad_request("Invalid file path"),
            StoreError::CorruptSnapshot(_) | StoreError::Internal(_) => {
                error!(error = %err, "storage failure");
                Self::internal()
            }
        }
    }
}
