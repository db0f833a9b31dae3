//! Core types, configuration, and lookup traits for Depot.
//!
//! This crate provides the building blocks shared by every Depot crate: the
//! file and identity types consulted by the access gate, the persisted record
//! shapes, the [`Directory`] lookup seam, a [`Clock`] abstraction, and
//! environment-driven configuration.

mod clock;
mod config;
mod directory;
mod error;
mod types;

pub use clock::{Clock, EpochSeconds, FixedClock, SystemClock};
pub use config::{DEV_HMAC_SECRET, DEV_SESSION_SECRET, DepotConfig};
pub use directory::Directory;
pub use error::{DepotError, DepotResult};
pub use types::{
    ApiKeyRecord, FileAccessState, FileRef, Identity, Metadata, Role, StoredFile, UserRecord,
    Warehouse,
};
