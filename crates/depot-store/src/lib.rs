//! Storage for Depot: metadata records, uploaded bytes, and rate limit state.
//!
//! - [`MetadataStore`] - `DashMap`-backed records with an atomic JSON snapshot;
//!   implements [`depot_core::Directory`]
//! - [`BlobStore`] - file bytes under `<uploads>/<warehouse>/<filename>`
//! - [`RateLimiter`] - fixed-window counters per client and endpoint class

pub mod blob;
pub mod error;
pub mod metadata;
pub mod rate_limit;

pub use blob::BlobStore;
pub use error::StoreError;
pub use metadata::MetadataStore;
pub use rate_limit::{RateClass, RateLimiter};
