//! Storage error types.

/// Errors raised by the metadata store and blob store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No file record with the given id.
    #[error("File not found: {file_id}")]
    FileNotFound {
        /// The id that was looked up.
        file_id: String,
    },

    /// No stored bytes at the given address.
    #[error("Blob not found: {warehouse_id}/{filename}")]
    BlobNotFound {
        /// Warehouse id.
        warehouse_id: String,
        /// Stored filename.
        filename: String,
    },

    /// A warehouse id or filename would escape the uploads directory.
    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    /// The metadata snapshot could not be parsed.
    #[error("Corrupt metadata snapshot: {0}")]
    CorruptSnapshot(#[from] serde_json::Error),

    /// An unexpected I/O or internal failure.
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
