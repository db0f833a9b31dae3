//! The Depot HTTP service implementing hyper's `Service` trait.
//!
//! [`DepotHttpService`] runs every request through one pipeline:
//!
//! 1. Health check interception (`GET /health`, `GET /_health`)
//! 2. CORS preflight (`OPTIONS`)
//! 3. Routing via [`resolve`]
//! 4. Per-client rate limiting
//! 5. Size-limited body collection
//! 6. Dispatch to the [`DepotHandler`]
//! 7. Common response headers (`x-request-id`, `Server`, CORS)

use std::convert::Infallible;
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use depot_core::{Clock, DepotConfig};
use depot_store::RateLimiter;
use http::HeaderMap;
use http_body::Body;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::body::DepotResponseBody;
use crate::dispatch::{DepotHandler, dispatch_route};
use crate::error::ApiError;
use crate::response::{CONTENT_TYPE, error_to_response};
use crate::router::resolve;

/// Default limit for JSON request bodies.
pub const DEFAULT_MAX_JSON_BYTES: usize = 1024 * 1024;

/// Header carrying the per-request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Configuration for the HTTP layer.
#[derive(Debug, Clone)]
pub struct DepotHttpConfig {
    /// Whether per-client rate limiting is enforced.
    pub rate_limit: bool,
    /// Largest accepted upload body.
    pub max_upload_bytes: usize,
    /// Largest accepted body on every other route.
    pub max_json_bytes: usize,
}

impl Default for DepotHttpConfig {
    fn default() -> Self {
        Self::from(&DepotConfig::default())
    }
}

impl From<&DepotConfig> for DepotHttpConfig {
    fn from(config: &DepotConfig) -> Self {
        Self {
            rate_limit: config.rate_limit,
            max_upload_bytes: config.max_upload_bytes,
            max_json_bytes: DEFAULT_MAX_JSON_BYTES,
        }
    }
}

/// Hyper `Service` implementation for Depot.
///
/// Cloned once per connection; [`with_peer`](Self::with_peer) attaches the
/// remote address used as the rate limit key.
pub struct DepotHttpService<H: DepotHandler> {
    handler: Arc<H>,
    config: Arc<DepotHttpConfig>,
    limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
    peer: Option<SocketAddr>,
}

impl<H: DepotHandler> DepotHttpService<H> {
    /// Create a service around `handler`.
    pub fn new(handler: H, config: DepotHttpConfig, clock: Arc<dyn Clock>) -> Self {
        Self::from_shared(Arc::new(handler), config, clock)
    }

    /// Create a service from an already shared handler.
    pub fn from_shared(handler: Arc<H>, config: DepotHttpConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            handler,
            config: Arc::new(config),
            limiter: Arc::new(RateLimiter::new()),
            clock,
            peer: None,
        }
    }

    /// A copy of this service bound to one connection's remote address.
    #[must_use]
    pub fn with_peer(&self, peer: SocketAddr) -> Self {
        let mut svc = self.clone();
        svc.peer = Some(peer);
        svc
    }

    /// The shared rate limiter.
    #[must_use]
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Run one request through the full pipeline.
    pub async fn handle_request<B>(&self, req: http::Request<B>) -> http::Response<DepotResponseBody>
    where
        B: Body<Data = Bytes> + Send,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        let request_id = Uuid::new_v4().to_string();
        let method = req.method().clone();
        let path = req.uri().path().to_owned();

        let response = self.process_request(req).await;

        info!(
            request_id = %request_id,
            %method,
            path = %path,
            status = response.status().as_u16(),
            "request completed"
        );
        add_common_headers(response, &request_id)
    }

    async fn process_request<B>(&self, req: http::Request<B>) -> http::Response<DepotResponseBody>
    where
        B: Body<Data = Bytes> + Send,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        let (parts, body) = req.into_parts();

        // 1. Health check.
        if is_health_check(&parts.method, parts.uri.path()) {
            return health_check_response();
        }

        // 2. CORS preflight.
        if parts.method == http::Method::OPTIONS {
            return cors_preflight_response();
        }

        // 3. Route.
        let route = match resolve(&parts.method, parts.uri.path()) {
            Ok(route) => route,
            Err(err) => return error_to_response(&err),
        };

        // 4. Rate limit.
        if self.config.rate_limit {
            let client = client_key(&parts.headers, self.peer);
            let now_ms = self.clock.now_millis();
            if let Err(retry_after) = self.limiter.check(&client, route.rate_class(), now_ms) {
                warn!(client = %client, route = %route, retry_after, "rate limited");
                return error_to_response(&ApiError::too_many_requests(retry_after));
            }
        }

        // 5. Body.
        let limit = if route.is_upload() {
            self.config.max_upload_bytes
        } else {
            self.config.max_json_bytes
        };
        if declared_length(&parts.headers).is_some_and(|len| len > limit) {
            return error_to_response(&ApiError::payload_too_large());
        }
        let body = match collect_body(body, limit).await {
            Ok(body) => body,
            Err(err) => return error_to_response(&err),
        };

        // 6. Dispatch.
        match dispatch_route(self.handler.as_ref(), route, parts, body).await {
            Ok(response) => response,
            Err(err) => {
                debug!(status = %err.status, message = %err.message, "request failed");
                error_to_response(&err)
            }
        }
    }
}

impl<H: DepotHandler> Clone for DepotHttpService<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            config: Arc::clone(&self.config),
            limiter: Arc::clone(&self.limiter),
            clock: Arc::clone(&self.clock),
            peer: self.peer,
        }
    }
}

impl<H: DepotHandler> fmt::Debug for DepotHttpService<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DepotHttpService")
            .field("config", &self.config)
            .field("peer", &self.peer)
            .field("tracked_clients", &self.limiter.tracked())
            .finish_non_exhaustive()
    }
}

impl<H: DepotHandler> hyper::service::Service<http::Request<Incoming>> for DepotHttpService<H> {
    type Response = http::Response<DepotResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let svc = self.clone();
        Box::pin(async move { Ok(svc.handle_request(req).await) })
    }
}

/// Rate limit key: the first `x-forwarded-for` hop, else the peer IP.
fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
        .or_else(|| peer.map(|p| p.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_owned())
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Collect the body, failing with 413 once `limit` bytes are exceeded.
async fn collect_body<B>(body: B, limit: usize) -> Result<Bytes, ApiError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(ApiError::payload_too_large())
        }
        Err(e) => {
            warn!(error = %e, "failed to read request body");
            Err(ApiError::bad_request("Failed to read request body"))
        }
    }
}

fn is_health_check(method: &http::Method, path: &str) -> bool {
    *method == http::Method::GET && (path == "/health" || path == "/_health")
}

fn health_check_response() -> http::Response<DepotResponseBody> {
    http::Response::builder()
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, CONTENT_TYPE)
        .body(DepotResponseBody::from_bytes(Bytes::from_static(
            br#"{"status":"running","service":"depot"}"#,
        )))
        .expect("static health response should be valid")
}

fn cors_preflight_response() -> http::Response<DepotResponseBody> {
    http::Response::builder()
        .status(http::StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, DELETE, OPTIONS")
        .header(
            "Access-Control-Allow-Headers",
            "Authorization, Content-Type, X-Api-Key",
        )
        .header("Access-Control-Max-Age", "86400")
        .body(DepotResponseBody::empty())
        .expect("static CORS response should be valid")
}

fn add_common_headers(
    mut response: http::Response<DepotResponseBody>,
    request_id: &str,
) -> http::Response<DepotResponseBody> {
    let headers = response.headers_mut();

    if let Ok(hv) = http::HeaderValue::from_str(request_id) {
        headers.insert(REQUEST_ID_HEADER, hv);
    }
    headers.insert(http::header::SERVER, http::HeaderValue::from_static("depot"));
    headers.insert(
        http::header::ACCESS_CONTROL_ALLOW_ORIGIN,
        http::HeaderValue::from_static("*"),
    );

    response
}
