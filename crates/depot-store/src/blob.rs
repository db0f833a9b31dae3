//! On-disk storage for uploaded file bytes.
//!
//! Files live at `<root>/<warehouse_id>/<filename>`. Stored filenames may
//! contain `/`, which maps to subdirectories. Any segment that is empty, `.`,
//! or `..` is rejected so a path can never leave the root.

use std::path::{Path, PathBuf};

use anyhow::Context;
use bytes::Bytes;
use tracing::debug;

use crate::error::StoreError;

/// Blob storage rooted at one directory.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Create a store rooted at `root`. The directory is created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `data`, creating directories as needed. Returns the byte count.
    pub async fn write(
        &self,
        warehouse_id: &str,
        filename: &str,
        data: &[u8],
    ) -> Result<u64, StoreError> {
        let path = self.path_for(warehouse_id, filename)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&path, data)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        debug!(path = %path.display(), size = data.len(), "blob written");
        Ok(data.len() as u64)
    }

    /// Read a stored file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::BlobNotFound`] when nothing is stored there.
    pub async fn read(&self, warehouse_id: &str, filename: &str) -> Result<Bytes, StoreError> {
        let path = self.path_for(warehouse_id, filename)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::BlobNotFound {
                warehouse_id: warehouse_id.to_owned(),
                filename: filename.to_owned(),
            }),
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("failed to read {}", path.display()))
                .into()),
        }
    }

    /// Delete a stored file. Returns `false` if nothing was stored there.
    pub async fn delete(&self, warehouse_id: &str, filename: &str) -> Result<bool, StoreError> {
        let path = self.path_for(warehouse_id, filename)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "blob deleted");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("failed to delete {}", path.display()))
                .into()),
        }
    }

    /// Resolve the on-disk path for `(warehouse_id, filename)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidPath`] for ids or names that could escape
    /// the root.
    pub fn path_for(&self, warehouse_id: &str, filename: &str) -> Result<PathBuf, StoreError> {
        if warehouse_id.contains('/') || !is_safe_segment(warehouse_id) {
            return Err(StoreError::InvalidPath(warehouse_id.to_owned()));
        }
        if !filename.split('/').all(is_safe_segment) {
            return Err(StoreError::InvalidPath(filename.to_owned()));
        }

        let mut path = self.root.join(warehouse_id);
        for segment in filename.split('/') {
            path.push(segment);
        }
        Ok(path)
    }
}

fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".." && !segment.contains(['\\', '\0'])
}
