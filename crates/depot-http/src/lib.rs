//! Depot HTTP routing, request parsing, response serialization, and hyper service.
//!
//! - **Routing** ([`router`]): Maps method and path to a [`Route`](router::Route).
//!   File paths are decoded with the capability engine's own splitter.
//!
//! - **Requests** ([`request`], [`multipart`]): Typed JSON bodies and the
//!   `multipart/form-data` upload parser.
//!
//! - **Responses** ([`response`], [`body`], [`error`]): JSON bodies, the
//!   `{"error": ...}` format, and [`ApiError`](error::ApiError).
//!
//! - **Dispatch** ([`dispatch`]): The [`DepotHandler`](dispatch::DepotHandler)
//!   boundary between transport and business logic.
//!
//! - **Handler** ([`handler`]): [`DepotProvider`](handler::DepotProvider), which
//!   serves files through the access gate and implements upload, capability
//!   issuance, verification, and sessions.
//!
//! - **Service** ([`service`]): [`DepotHttpService`](service::DepotHttpService),
//!   the hyper `Service` tying it together.
//!
//! # Architecture
//!
//! ```text
//! HTTP Request
//!   -> DepotHttpService (hyper Service)
//!     -> Health check / CORS interception
//!     -> resolve (Route)
//!     -> RateLimiter (per client and route class)
//!     -> Size-limited body collection
//!     -> dispatch_route (DepotHandler)
//!       -> DepotProvider -> AccessGate / MetadataStore / BlobStore
//!     -> Common response headers (x-request-id, Server, CORS)
//!   <- HTTP Response
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use depot_core::{Clock, DepotConfig, SystemClock};
//! use depot_http::{DepotHttpConfig, DepotHttpService, DepotProvider};
//! use depot_store::MetadataStore;
//!
//! let config = DepotConfig::default();
//! let clock: Arc<dyn Clock> = Arc::new(SystemClock);
//! let provider = DepotProvider::new(
//!     config.clone(),
//!     Arc::new(MetadataStore::default()),
//!     Arc::clone(&clock),
//! );
//! let service = DepotHttpService::new(provider, DepotHttpConfig::from(&config), clock);
//! // Serve `service.with_peer(addr)` per connection with hyper-util.
//! # let _ = service;
//! ```

pub mod body;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod multipart;
pub mod request;
pub mod response;
pub mod router;
pub mod service;

pub use body::DepotResponseBody;
pub use dispatch::DepotHandler;
pub use error::ApiError;
pub use handler::DepotProvider;
pub use router::Route;
pub use service::{DepotHttpConfig, DepotHttpService};
