//! JSON response serialization and error formatting.

use depot_core::{Role, StoredFile};
use http::header::HeaderValue;
use serde::Serialize;
use tracing::error;

use crate::body::DepotResponseBody;
use crate::error::ApiError;

/// Content type for JSON responses.
pub const CONTENT_TYPE: &str = "application/json";

// ---- Response bodies ----

/// `{"success": true}`
#[derive(Debug, Clone, Serialize)]
pub struct SuccessResponse {
    /// Always `true`.
    pub success: bool,
}

impl SuccessResponse {
    /// The success body.
    #[must_use]
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Issued capability.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUrlResponse {
    /// The relative capability URL.
    pub capability_url: String,
    /// Same URL under the field name older clients read.
    pub signed_url: String,
    /// Expiry in epoch seconds.
    pub expires_at: i64,
}

/// One stored upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    /// New file id.
    pub file_id: String,
    /// Stored filename.
    pub filename: String,
    /// Name the client sent the file under.
    pub original_name: String,
    /// Size in bytes.
    pub size: u64,
    /// Unsigned download path.
    pub url: String,
}

/// Result of `POST /api/upload`.
#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    /// Always `true`.
    pub success: bool,
    /// Stored files in submission order.
    pub files: Vec<UploadedFile>,
    /// `files.len()`.
    pub count: usize,
}

/// Result of `POST /api/admin/verify-file`.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyFileResponse {
    /// Always `true`.
    pub success: bool,
    /// The updated record.
    pub file: StoredFile,
}

/// A file record as listed to clients; verification attribution is omitted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    /// File id.
    pub id: String,
    /// Stored filename.
    pub filename: String,
    /// Display name.
    pub original_name: String,
    /// Owning warehouse.
    pub warehouse_id: String,
    /// RFC 3339 upload time.
    pub uploaded_at: String,
    /// Who uploaded it.
    pub uploader: String,
    /// Verification flag.
    pub is_verified: bool,
    /// Size in bytes.
    pub size: u64,
    /// MIME type.
    pub mime_type: String,
}

impl From<StoredFile> for FileSummary {
    fn from(file: StoredFile) -> Self {
        Self {
            id: file.id,
            filename: file.filename,
            original_name: file.original_name,
            warehouse_id: file.warehouse_id,
            uploaded_at: file.uploaded_at,
            uploader: file.uploader,
            is_verified: file.is_verified,
            size: file.size,
            mime_type: file.mime_type,
        }
    }
}

/// Result of the file listing endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct FileListResponse {
    /// Listed files.
    pub files: Vec<FileSummary>,
}

/// The caller as seen by `login` and `me`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    /// User id, or the API key label.
    pub id: String,
    /// Login email; absent for API keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Role.
    pub role: Role,
    /// Entitled warehouses.
    pub warehouse_ids: Vec<String>,
}

// ---- Serialization ----

/// Serialize `value` into a JSON response with `status`.
#[must_use]
pub fn json_response<T: Serialize>(
    status: http::StatusCode,
    value: &T,
) -> http::Response<DepotResponseBody> {
    let json = match serde_json::to_vec(value) {
        Ok(json) => json,
        Err(e) => {
            error!(error = %e, "failed to serialize response");
            return error_to_response(&ApiError::internal());
        }
    };

    http::Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, CONTENT_TYPE)
        .body(DepotResponseBody::from_json(json))
        .expect("valid JSON response")
}

/// Serialize an [`ApiError`] into `{"error": "<message>"}`.
#[must_use]
pub fn error_to_json(err: &ApiError) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({ "error": err.message }))
        .expect("JSON serialization of error cannot fail")
}

/// Convert an [`ApiError`] into a complete HTTP response.
#[must_use]
pub fn error_to_response(err: &ApiError) -> http::Response<DepotResponseBody> {
    let mut response = http::Response::builder()
        .status(err.status)
        .header(http::header::CONTENT_TYPE, CONTENT_TYPE)
        .body(DepotResponseBody::from_json(error_to_json(err)))
        .expect("valid error response");

    if let Some(secs) = err.retry_after {
        response
            .headers_mut()
            .insert(http::header::RETRY_AFTER, HeaderValue::from(secs));
    }

    response
}

/// Attach a `Set-Cookie` header, skipping values that are not valid header text.
#[must_use]
pub fn with_cookie(
    mut response: http::Response<DepotResponseBody>,
    cookie: &str,
) -> http::Response<DepotResponseBody> {
    if let Ok(hv) = HeaderValue::from_str(cookie) {
        response.headers_mut().append(http::header::SET_COOKIE, hv);
    }
    response
}
