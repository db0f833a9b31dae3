//! Error types for the Depot core.

/// Core error type for Depot infrastructure.
#[derive(Debug, thiserror::Error)]
pub enum DepotError {
    /// Unknown role name in a record or token.
    #[error("invalid role: {0}")]
    InvalidRole(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience result type for Depot operations.
pub type DepotResult<T> = Result<T, DepotError>;
