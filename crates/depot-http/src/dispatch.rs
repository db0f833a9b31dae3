//! Handler trait and route dispatch.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use http::request::Parts;

use crate::body::DepotResponseBody;
use crate::error::ApiError;
use crate::router::Route;

/// Boxed future returned by [`DepotHandler::handle_route`].
pub type HandlerFuture =
    Pin<Box<dyn Future<Output = Result<http::Response<DepotResponseBody>, ApiError>> + Send>>;

/// Boundary between the HTTP transport and the Depot business logic.
///
/// The handler receives the resolved route, the request head (for credentials
/// and query strings), and the collected body.
pub trait DepotHandler: Send + Sync + 'static {
    /// Handle one request.
    fn handle_route(&self, route: Route, parts: Parts, body: Bytes) -> HandlerFuture;
}

/// Dispatch a route to the handler.
pub async fn dispatch_route<H: DepotHandler>(
    handler: &H,
    route: Route,
    parts: Parts,
    body: Bytes,
) -> Result<http::Response<DepotResponseBody>, ApiError> {
    tracing::debug!(route = %route, "dispatching request");
    handler.handle_route(route, parts, body).await
}
