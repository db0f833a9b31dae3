//! Error types for capability and session authentication.
//!
//! All authentication failures are represented by [`AuthError`]. None of the
//! variants carry secret material: signatures, tokens, and keys are never
//! embedded in the message.

/// Errors that can occur while parsing or checking credentials.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// A required query parameter for capability authentication is missing.
    #[error("Missing required query parameter: {0}")]
    MissingQueryParam(&'static str),

    /// The capability URL could not be parsed.
    #[error("Malformed capability: {0}")]
    MalformedCapability(&'static str),

    /// The capability has expired (`now > expires`).
    #[error("Request has expired")]
    RequestExpired,

    /// The computed signature does not match the provided signature.
    #[error("Signature does not match")]
    SignatureDoesNotMatch,

    /// The capability was issued for a different file than the one requested.
    #[error("Capability does not cover the requested file")]
    FileMismatch,

    /// The session token could not be decoded.
    #[error("Malformed session token")]
    MalformedSessionToken,

    /// The session token has expired.
    #[error("Session has expired")]
    SessionExpired,

    /// The presented email/password pair did not match a user.
    #[error("Invalid email or password")]
    InvalidCredentials,
}
