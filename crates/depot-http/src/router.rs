//! Request routing.
//!
//! Maps a method and path to a [`Route`]. File paths are decoded with the same
//! splitter the capability engine uses, so the file a request addresses and the
//! file a signature covers are always derived identically.

use std::fmt;

use depot_auth::canonical::{FILES_PREFIX, split_file_path};
use depot_store::RateClass;
use http::Method;

use crate::error::ApiError;

const USER_FILES_PREFIX: &str = "/api/user/files/";

/// An identified Depot endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `GET /api/files/{warehouseId}/{filename...}`
    GetFile {
        /// Decoded warehouse id.
        warehouse_id: String,
        /// Decoded filename, may contain `/`.
        filename: String,
    },
    /// `GET /api/user/files`
    ListFiles,
    /// `DELETE /api/user/files/{fileId}`
    DeleteFile {
        /// The file id.
        file_id: String,
    },
    /// `POST /api/signed-url`
    IssueSignedUrl,
    /// `POST /api/upload`
    Upload,
    /// `POST /api/admin/verify-file`
    VerifyFile,
    /// `GET /api/admin/list-files`
    ListAllFiles,
    /// `POST /api/auth/login`
    Login,
    /// `POST /api/auth/logout`
    Logout,
    /// `GET /api/auth/me`
    Me,
}

impl Route {
    /// Short operation name for logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetFile { .. } => "GetFile",
            Self::ListFiles => "ListFiles",
            Self::DeleteFile { .. } => "DeleteFile",
            Self::IssueSignedUrl => "IssueSignedUrl",
            Self::Upload => "Upload",
            Self::VerifyFile => "VerifyFile",
            Self::ListAllFiles => "ListAllFiles",
            Self::Login => "Login",
            Self::Logout => "Logout",
            Self::Me => "Me",
        }
    }

    /// Rate limit budget this route draws from.
    #[must_use]
    pub fn rate_class(&self) -> RateClass {
        match self {
            Self::GetFile { .. }
            | Self::IssueSignedUrl
            | Self::ListFiles
            | Self::DeleteFile { .. } => RateClass::Download,
            Self::Upload => RateClass::Upload,
            Self::VerifyFile | Self::ListAllFiles => RateClass::Admin,
            Self::Login | Self::Logout | Self::Me => RateClass::Auth,
        }
    }

    /// Whether the route accepts large multipart bodies.
    #[must_use]
    pub fn is_upload(&self) -> bool {
        matches!(self, Self::Upload)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve `method` and `path` to a route.
///
/// # Errors
///
/// Returns 404 for unknown or malformed paths and 405 when the path exists but
/// the method does not match.
pub fn resolve(method: &Method, path: &str) -> Result<Route, ApiError> {
    let (expected, route) = match path {
        "/api/signed-url" => (Method::POST, Route::IssueSignedUrl),
        "/api/upload" => (Method::POST, Route::Upload),
        "/api/admin/verify-file" => (Method::POST, Route::VerifyFile),
        "/api/auth/login" => (Method::POST, Route::Login),
        "/api/auth/logout" => (Method::POST, Route::Logout),
        "/api/auth/me" => (Method::GET, Route::Me),
        "/api/user/files" => (Method::GET, Route::ListFiles),
        "/api/admin/list-files" => (Method::GET, Route::ListAllFiles),
        p if p.starts_with(USER_FILES_PREFIX) => {
            let file_id = &p[USER_FILES_PREFIX.len()..];
            if file_id.is_empty() || file_id.contains('/') {
                return Err(ApiError::not_found("Not found"));
            }
            (
                Method::DELETE,
                Route::DeleteFile {
                    file_id: file_id.to_owned(),
                },
            )
        }
        p if p.starts_with(FILES_PREFIX) => {
            let (warehouse_id, filename) =
                split_file_path(p).ok_or_else(|| ApiError::not_found("File not found"))?;
            (
                Method::GET,
                Route::GetFile {
                    warehouse_id,
                    filename,
                },
            )
        }
        _ => return Err(ApiError::not_found("Not found")),
    };

    if *method != expected {
        return Err(ApiError::method_not_allowed());
    }
    Ok(route)
}
