//! Capability URLs, sessions, and the access decision for Depot files.
//!
//! # Overview
//!
//! A file under `/api/files/<warehouse>/<filename>` can be reached in two ways:
//!
//! - with a capability URL, a time-limited HMAC-SHA256 signature over the
//!   file's address and expiry, which needs no other credential;
//! - unsigned, when the file is verified and the caller presents an API key or
//!   session cookie with access to the warehouse.
//!
//! The [`gate::AccessGate`] combines both into one decision.
//!
//! # Usage
//!
//! ```rust
//! use depot_auth::presigned::CapabilityEngine;
//! use depot_auth::signature::SigningKey;
//! use depot_core::FileRef;
//!
//! let engine = CapabilityEngine::new(SigningKey::new("secret"));
//! let url = engine.issue(&FileRef::new("w-1", "report.pdf"), 600, 1_700_000_000);
//! assert!(engine.verify(url.as_str(), 1_700_000_300));
//! ```
//!
//! # Modules
//!
//! - [`canonical`] - The signed string, TTL bounds, and file path encoding
//! - [`error`] - Authentication error types
//! - [`gate`] - The access decision
//! - [`identity`] - Resolving API keys and session cookies to an identity
//! - [`password`] - Salted password hashes
//! - [`presigned`] - Capability URL issuance and verification
//! - [`session`] - Signed session tokens and cookies
//! - [`signature`] - HMAC-SHA256 and constant-time comparison

pub mod canonical;
pub mod error;
pub mod gate;
pub mod identity;
pub mod password;
pub mod presigned;
pub mod session;
pub mod signature;

pub use error::AuthError;
pub use gate::{AccessGate, AllowReason, Decision, DenyReason};
pub use identity::{CredentialResolver, IdentityResolver, PresentedCredential};
pub use presigned::{Capability, CapabilityEngine, CapabilityUrl};
pub use session::{SessionClaims, SessionCodec};
pub use signature::{SigningKey, constant_time_eq};
