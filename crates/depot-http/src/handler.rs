//! Depot business logic behind the HTTP routes.
//!
//! [`DepotProvider`] owns the capability engine, the access gate, the
//! credential resolver, and the storage handles, and implements
//! [`DepotHandler`] by dispatching each [`Route`] to one method.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat};
use depot_auth::canonical::file_path;
use depot_auth::password::verify_password;
use depot_auth::session::{expired_session_cookie, session_cookie};
use depot_auth::{
    AccessGate, CapabilityEngine, CredentialResolver, Decision, DenyReason, IdentityResolver,
    PresentedCredential, SessionCodec, SigningKey,
};
use depot_core::{Clock, DepotConfig, Directory, FileRef, Identity, StoredFile};
use depot_store::{BlobStore, MetadataStore};
use http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, HeaderValue};
use http::request::Parts;
use http::StatusCode;
use tracing::{debug, error, info, warn};

use crate::body::DepotResponseBody;
use crate::dispatch::{DepotHandler, HandlerFuture};
use crate::error::ApiError;
use crate::multipart::{FilePart, extract_boundary, parse_multipart};
use crate::request::{LoginRequest, SignedUrlRequest, VerifyFileRequest, parse_json};
use crate::response::{
    FileListResponse, FileSummary, SignedUrlResponse, SuccessResponse, UploadResponse,
    UploadedFile, UserSummary, VerifyFileResponse, json_response, with_cookie,
};
use crate::router::Route;

/// Attribution recorded on files verified at upload time.
const SYSTEM_VERIFIER: &str = "system";

/// Longest sanitised client filename kept in a stored name.
const MAX_STORED_NAME_LEN: usize = 128;

type HandlerResult = Result<http::Response<DepotResponseBody>, ApiError>;

/// The Depot request handler.
///
/// Cheap to clone; all state sits behind one [`Arc`].
#[derive(Debug, Clone)]
pub struct DepotProvider {
    inner: Arc<ProviderInner>,
}

#[derive(Debug)]
struct ProviderInner {
    config: DepotConfig,
    store: Arc<MetadataStore>,
    blobs: BlobStore,
    engine: CapabilityEngine,
    gate: AccessGate,
    resolver: Arc<CredentialResolver>,
    sessions: SessionCodec,
    clock: Arc<dyn Clock>,
}

impl DepotProvider {
    /// Build a provider from configuration, a metadata store, and a clock.
    #[must_use]
    pub fn new(config: DepotConfig, store: Arc<MetadataStore>, clock: Arc<dyn Clock>) -> Self {
        let engine = CapabilityEngine::new(SigningKey::new(&config.hmac_secret));
        let sessions = SessionCodec::new(
            SigningKey::new(&config.session_secret),
            config.session_ttl_secs,
        );
        let directory: Arc<dyn Directory> = Arc::<MetadataStore>::clone(&store);
        let resolver = Arc::new(CredentialResolver::new(
            directory,
            sessions.clone(),
            Arc::clone(&clock),
        ));
        let gate_resolver: Arc<dyn IdentityResolver> = Arc::<CredentialResolver>::clone(&resolver);
        let gate = AccessGate::new(engine.clone(), gate_resolver);
        let blobs = BlobStore::new(config.uploads_dir.clone());

        Self {
            inner: Arc::new(ProviderInner {
                config,
                store,
                blobs,
                engine,
                gate,
                resolver,
                sessions,
                clock,
            }),
        }
    }

    /// The metadata store.
    #[must_use]
    pub fn store(&self) -> &Arc<MetadataStore> {
        &self.inner.store
    }

    /// The capability engine.
    #[must_use]
    pub fn engine(&self) -> &CapabilityEngine {
        &self.inner.engine
    }

    /// The clock all handlers read.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    fn identity(&self, parts: &Parts) -> Option<Identity> {
        self.inner.resolver.resolve_headers(&parts.headers)
    }

    fn timestamp(&self) -> String {
        DateTime::from_timestamp_millis(self.inner.clock.now_millis())
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_default()
    }

    // ---- Files ----

    async fn get_file(&self, parts: &Parts, warehouse_id: &str, filename: &str) -> HandlerResult {
        let inner = &self.inner;
        let file = inner
            .store
            .find_file(warehouse_id, filename)
            .ok_or_else(|| ApiError::not_found("File not found"))?;

        let file_ref = file.file_ref();
        match inner
            .gate
            .decide(parts, &file_ref, file.access_state(), inner.clock.now())
            .await
        {
            Decision::Allow(reason) => debug!(file = %file_ref, ?reason, "serving file"),
            Decision::Deny(reason) => return Err(reason.into()),
        }

        let data = inner.blobs.read(warehouse_id, filename).await?;
        Ok(file_response(&file, data))
    }

    async fn issue_signed_url(&self, parts: &Parts, body: &Bytes) -> HandlerResult {
        let inner = &self.inner;
        let req: SignedUrlRequest = parse_json(body)?;
        if req.warehouse_id.is_empty() || req.filename.is_empty() {
            return Err(ApiError::bad_request("warehouseId and filename are required"));
        }

        let identity = self
            .identity(parts)
            .ok_or_else(|| ApiError::from(DenyReason::AuthRequired))?;
        if !identity.can_access(&req.warehouse_id) {
            warn!(subject = %identity.subject_id, warehouse = %req.warehouse_id, "capability refused");
            return Err(DenyReason::NotEntitled.into());
        }

        let file_ref = FileRef::new(req.warehouse_id, req.filename);
        if inner
            .store
            .find_file(&file_ref.warehouse_id, &file_ref.filename)
            .is_none()
        {
            return Err(ApiError::not_found("File not found"));
        }

        // Zero means "unset"; everything else is clamped by the engine.
        let ttl = match req.expires_in {
            None | Some(0) => inner.config.default_ttl_secs,
            Some(ttl) => ttl,
        };
        let url = inner.engine.issue(&file_ref, ttl, inner.clock.now());
        info!(subject = %identity.subject_id, file = %file_ref, expires_at = url.expires_at(), "capability issued");

        let expires_at = url.expires_at();
        let url = url.into_string();
        Ok(json_response(
            StatusCode::OK,
            &SignedUrlResponse {
                capability_url: url.clone(),
                signed_url: url,
                expires_at,
            },
        ))
    }

    // ---- Upload ----

    async fn upload(&self, parts: &Parts, body: &Bytes) -> HandlerResult {
        let inner = &self.inner;
        let content_type = parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        let boundary = extract_boundary(content_type)?;
        let form = parse_multipart(body, &boundary)?;

        if form.files.is_empty() {
            return Err(ApiError::bad_request("No files uploaded"));
        }
        let warehouse_id = form
            .field("warehouseId")
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .ok_or_else(|| ApiError::bad_request("Warehouse ID is required"))?
            .to_owned();

        let identity = self.upload_identity(parts)?;
        if !identity.can_access(&warehouse_id) {
            warn!(subject = %identity.subject_id, warehouse = %warehouse_id, "upload refused");
            return Err(ApiError::forbidden(
                "You do not have access to this warehouse",
            ));
        }

        let uploader = form
            .field("uploader")
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map_or_else(|| identity.subject_id.clone(), ToOwned::to_owned);
        let custom_names = form.field_values("originalName");

        let mut uploaded = Vec::with_capacity(form.files.len());
        for (index, part) in form.files.iter().enumerate() {
            let custom = custom_names.get(index).map(String::as_str);
            let file = self
                .store_upload(&warehouse_id, &uploader, part, custom)
                .await?;
            uploaded.push(UploadedFile {
                url: file_path(&file.warehouse_id, &file.filename),
                file_id: file.id,
                filename: file.filename,
                original_name: client_filename(part).to_owned(),
                size: file.size,
            });
        }

        info!(
            subject = %identity.subject_id,
            warehouse = %warehouse_id,
            count = uploaded.len(),
            auto_verified = inner.config.auto_verify_uploads,
            "files uploaded"
        );
        let count = uploaded.len();
        Ok(json_response(
            StatusCode::OK,
            &UploadResponse {
                success: true,
                files: uploaded,
                count,
            },
        ))
    }

    /// Uploads distinguish an unknown API key from no credential at all.
    fn upload_identity(&self, parts: &Parts) -> Result<Identity, ApiError> {
        let presented = PresentedCredential::from_headers(&parts.headers);
        match (self.identity(parts), presented) {
            (Some(identity), _) => Ok(identity),
            (None, PresentedCredential::ApiKey(_)) => Err(ApiError::forbidden("Invalid API key")),
            (None, _) => Err(ApiError::unauthorized(
                "Authentication required. Please provide an API key or log in.",
            )),
        }
    }

    async fn store_upload(
        &self,
        warehouse_id: &str,
        uploader: &str,
        part: &FilePart,
        custom_name: Option<&str>,
    ) -> Result<StoredFile, ApiError> {
        let inner = &self.inner;
        let client_name = client_filename(part);
        let stored_name = stored_filename(inner.clock.now_millis(), client_name);
        let size = inner
            .blobs
            .write(warehouse_id, &stored_name, &part.data)
            .await?;

        let now = self.timestamp();
        let auto_verify = inner.config.auto_verify_uploads;
        let record = StoredFile {
            id: format!("f-{}", uuid::Uuid::new_v4().simple()),
            warehouse_id: warehouse_id.to_owned(),
            filename: stored_name,
            original_name: display_name(custom_name, client_name),
            uploaded_at: now.clone(),
            uploader: uploader.to_owned(),
            size,
            mime_type: part_mime(part).to_string(),
            is_verified: auto_verify,
            verified_by: auto_verify.then(|| SYSTEM_VERIFIER.to_owned()),
            verified_at: auto_verify.then_some(now),
        };
        let stored_name = record.filename.clone();

        match inner.store.add_file(record).await {
            Ok(file) => Ok(file),
            Err(e) => {
                if let Err(cleanup) = inner.blobs.delete(warehouse_id, &stored_name).await {
                    warn!(error = %cleanup, file = %stored_name, "orphaned upload left on disk");
                }
                Err(e.into())
            }
        }
    }

    // ---- File management ----

    fn list_files(&self, parts: &Parts) -> HandlerResult {
        let identity = self
            .identity(parts)
            .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;
        let files = self
            .inner
            .store
            .list_files()
            .into_iter()
            .filter(|f| identity.can_access(&f.warehouse_id))
            .map(FileSummary::from)
            .collect();
        Ok(json_response(StatusCode::OK, &FileListResponse { files }))
    }

    fn list_all_files(&self, parts: &Parts) -> HandlerResult {
        let identity = self
            .identity(parts)
            .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;
        if !identity.role.is_privileged() {
            warn!(subject = %identity.subject_id, "list-files refused");
            return Err(ApiError::forbidden("Forbidden"));
        }
        let files = self
            .inner
            .store
            .list_files()
            .into_iter()
            .map(FileSummary::from)
            .collect();
        Ok(json_response(StatusCode::OK, &FileListResponse { files }))
    }

    /// Only the uploader or a privileged user may delete, and only inside an
    /// entitled warehouse.
    async fn delete_file(&self, parts: &Parts, file_id: &str) -> HandlerResult {
        let inner = &self.inner;
        let identity = self
            .identity(parts)
            .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;
        let file = inner
            .store
            .find_file_by_id(file_id)
            .ok_or_else(|| ApiError::not_found("File not found"))?;

        if !identity.can_access(&file.warehouse_id) {
            warn!(subject = %identity.subject_id, file_id, "delete refused: warehouse");
            return Err(ApiError::forbidden(
                "Forbidden: You do not have access to this warehouse",
            ));
        }
        if !identity.role.is_privileged() && file.uploader != identity.subject_id {
            warn!(subject = %identity.subject_id, file_id, "delete refused: not uploader");
            return Err(ApiError::forbidden(
                "Forbidden: You can only delete files you uploaded",
            ));
        }

        let removed = inner.store.remove_file(file_id).await?;
        if let Err(e) = inner
            .blobs
            .delete(&removed.warehouse_id, &removed.filename)
            .await
        {
            warn!(error = %e, file_id, "file record removed but bytes remain on disk");
        }
        info!(subject = %identity.subject_id, file_id, file = %removed.file_ref(), "file deleted");
        Ok(json_response(StatusCode::OK, &SuccessResponse::ok()))
    }

    // ---- Admin ----

    async fn verify_file(&self, parts: &Parts, body: &Bytes) -> HandlerResult {
        let identity = self
            .identity(parts)
            .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;
        if !identity.role.is_privileged() {
            warn!(subject = %identity.subject_id, "verify-file refused");
            return Err(ApiError::forbidden("Forbidden"));
        }

        let req: VerifyFileRequest = parse_json(body)?;
        if req.file_id.is_empty() {
            return Err(ApiError::bad_request("File ID required"));
        }

        let file = self
            .inner
            .store
            .set_verified(
                &req.file_id,
                req.is_verified,
                &identity.subject_id,
                &self.timestamp(),
            )
            .await?;
        Ok(json_response(
            StatusCode::OK,
            &VerifyFileResponse {
                success: true,
                file,
            },
        ))
    }

    // ---- Sessions ----

    async fn login(&self, body: &Bytes) -> HandlerResult {
        let inner = &self.inner;
        let req: LoginRequest = parse_json(body)?;
        if req.email.is_empty() || req.password.is_empty() {
            return Err(ApiError::bad_request("Email and password required"));
        }

        // bcrypt verification blocks the calling thread.
        let candidate = inner.store.find_user_by_email(&req.email);
        let password = req.password;
        let user = tokio::task::spawn_blocking(move || {
            candidate.filter(|u| verify_password(&password, &u.password_hash))
        })
        .await
        .map_err(|e| {
            error!(error = %e, "password check task failed");
            ApiError::internal()
        })?
        .ok_or_else(|| {
            warn!("login failed");
            ApiError::unauthorized("Invalid credentials")
        })?;

        let token = inner.sessions.mint(&user, inner.clock.now());
        let cookie = session_cookie(
            &token,
            inner.sessions.ttl_secs(),
            inner.config.secure_cookies,
        );
        info!(user_id = %user.id, role = %user.role, "logged in");

        let summary = UserSummary {
            id: user.id,
            email: Some(user.email),
            role: user.role,
            warehouse_ids: user.warehouse_ids,
        };
        Ok(with_cookie(json_response(StatusCode::OK, &summary), &cookie))
    }

    fn logout(&self) -> http::Response<DepotResponseBody> {
        with_cookie(
            json_response(StatusCode::OK, &SuccessResponse::ok()),
            &expired_session_cookie(self.inner.config.secure_cookies),
        )
    }

    fn me(&self, parts: &Parts) -> HandlerResult {
        let identity = self
            .identity(parts)
            .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;
        let email = self
            .inner
            .store
            .find_user(&identity.subject_id)
            .map(|u| u.email);

        Ok(json_response(
            StatusCode::OK,
            &UserSummary {
                id: identity.subject_id,
                email,
                role: identity.role,
                warehouse_ids: identity.entitled_warehouse_ids.into_iter().collect(),
            },
        ))
    }
}

impl DepotHandler for DepotProvider {
    fn handle_route(&self, route: Route, parts: Parts, body: Bytes) -> HandlerFuture {
        let provider = self.clone();
        Box::pin(async move {
            match route {
                Route::GetFile {
                    warehouse_id,
                    filename,
                } => provider.get_file(&parts, &warehouse_id, &filename).await,
                Route::IssueSignedUrl => provider.issue_signed_url(&parts, &body).await,
                Route::Upload => provider.upload(&parts, &body).await,
                Route::ListFiles => provider.list_files(&parts),
                Route::DeleteFile { file_id } => provider.delete_file(&parts, &file_id).await,
                Route::VerifyFile => provider.verify_file(&parts, &body).await,
                Route::ListAllFiles => provider.list_all_files(&parts),
                Route::Login => provider.login(&body).await,
                Route::Logout => Ok(provider.logout()),
                Route::Me => provider.me(&parts),
            }
        })
    }
}

// ---- Helpers ----

fn file_response(file: &StoredFile, data: Bytes) -> http::Response<DepotResponseBody> {
    let mime_type = file
        .mime_type
        .parse::<mime::Mime>()
        .unwrap_or(mime::APPLICATION_OCTET_STREAM);
    let disposition = format!(
        "inline; filename=\"{}\"",
        disposition_filename(&file.original_name)
    );

    let mut builder = http::Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_LENGTH, data.len());
    if let Ok(hv) = HeaderValue::from_str(mime_type.as_ref()) {
        builder = builder.header(CONTENT_TYPE, hv);
    }
    if let Ok(hv) = HeaderValue::from_bytes(disposition.as_bytes()) {
        builder = builder.header(CONTENT_DISPOSITION, hv);
    }
    builder
        .body(DepotResponseBody::from_bytes(data))
        .expect("valid file response")
}

/// Quotes and control characters cannot appear inside the quoted filename.
fn disposition_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c == '"' || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect()
}

fn client_filename(part: &FilePart) -> &str {
    part.filename
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or("file")
}

fn part_mime(part: &FilePart) -> mime::Mime {
    part.content_type
        .as_deref()
        .and_then(|ct| ct.parse::<mime::Mime>().ok())
        .unwrap_or(mime::APPLICATION_OCTET_STREAM)
}

/// `{millis}-{8 hex}-{sanitised name}`.
fn stored_filename(now_millis: i64, client_name: &str) -> String {
    let base = Path::new(client_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(client_name);
    let sanitized: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_STORED_NAME_LEN)
        .collect();
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    format!("{now_millis}-{}-{sanitized}", &nonce[..8])
}

/// A custom display name keeps the uploaded file's extension.
fn display_name(custom: Option<&str>, client_name: &str) -> String {
    let Some(custom) = custom.map(str::trim).filter(|c| !c.is_empty()) else {
        return client_name.to_owned();
    };
    let Some(ext) = Path::new(client_name).extension().and_then(|e| e.to_str()) else {
        return custom.to_owned();
    };
    let suffix = format!(".{ext}");
    if custom.to_ascii_lowercase().ends_with(&suffix.to_ascii_lowercase()) {
        custom.to_owned()
    } else {
        format!("{custom}{suffix}")
    }
}
