//! In-memory metadata store with a JSON snapshot on disk.
//!
//! [`MetadataStore`] keeps users, warehouses, API keys, and file records in
//! [`DashMap`]s and implements [`Directory`] over them. When opened with a
//! snapshot path, every mutation rewrites `metadata.json` atomically: the
//! snapshot is written to a sibling temp file and renamed over the original.

use std::path::{Path, PathBuf};

use anyhow::Context;
use dashmap::DashMap;
use depot_core::{ApiKeyRecord, Directory, Metadata, StoredFile, UserRecord, Warehouse};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::StoreError;

/// Composite key addressing a file: `(warehouse_id, filename)`.
type FileKey = (String, String);

/// Thread-safe metadata store.
pub struct MetadataStore {
    /// File records by address.
    files: DashMap<FileKey, StoredFile>,
    /// File id to address.
    file_ids: DashMap<String, FileKey>,
    /// API keys by secret value.
    api_keys: DashMap<String, ApiKeyRecord>,
    /// Users by id.
    users: DashMap<String, UserRecord>,
    /// Warehouses by id.
    warehouses: DashMap<String, Warehouse>,
    /// Where snapshots are written; `None` keeps the store memory-only.
    snapshot_path: Option<PathBuf>,
    /// Serializes snapshot writes.
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for MetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataStore")
            .field("file_count", &self.files.len())
            .field("user_count", &self.users.len())
            .field("warehouse_count", &self.warehouses.len())
            .field("api_key_count", &self.api_keys.len())
            .field("snapshot_path", &self.snapshot_path)
            .finish_non_exhaustive()
    }
}

impl Default for MetadataStore {
    fn default() -> Self {
        Self::in_memory(Metadata::default())
    }
}

impl MetadataStore {
    /// Create a memory-only store seeded from `metadata`.
    #[must_use]
    pub fn in_memory(metadata: Metadata) -> Self {
        let store = Self {
            files: DashMap::new(),
            file_ids: DashMap::new(),
            api_keys: DashMap::new(),
            users: DashMap::new(),
            warehouses: DashMap::new(),
            snapshot_path: None,
            write_lock: Mutex::new(()),
        };
        store.load(metadata);
        store
    }

    /// Open the snapshot at `path`, starting empty if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CorruptSnapshot`] if the file exists but is not a
    /// valid snapshot, or [`StoreError::Internal`] on I/O failure.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let metadata = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Metadata>(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no metadata snapshot, starting empty");
                Metadata::default()
            }
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("failed to read {}", path.display()))
                    .into());
            }
        };

        let mut store = Self::in_memory(metadata);
        store.snapshot_path = Some(path);
        info!(
            files = store.files.len(),
            users = store.users.len(),
            warehouses = store.warehouses.len(),
            "loaded metadata snapshot"
        );
        Ok(store)
    }

    fn load(&self, metadata: Metadata) {
        for user in metadata.users {
            self.users.insert(user.id.clone(), user);
        }
        for warehouse in metadata.warehouses {
            self.warehouses.insert(warehouse.id.clone(), warehouse);
        }
        for key in metadata.api_keys {
            self.api_keys.insert(key.key.clone(), key);
        }
        for file in metadata.files {
            self.index_file(file);
        }
    }

    fn index_file(&self, file: StoredFile) {
        let key = (file.warehouse_id.clone(), file.filename.clone());
        self.file_ids.insert(file.id.clone(), key.clone());
        self.files.insert(key, file);
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Find a file by id.
    #[must_use]
    pub fn find_file_by_id(&self, file_id: &str) -> Option<StoredFile> {
        let key = self.file_ids.get(file_id)?.clone();
        self.files.get(&key).map(|f| f.clone())
    }

    /// Every file record, oldest upload first.
    #[must_use]
    pub fn list_files(&self) -> Vec<StoredFile> {
        let mut files: Vec<_> = self.files.iter().map(|e| e.value().clone()).collect();
        files.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at).then(a.id.cmp(&b.id)));
        files
    }

    /// Number of file records.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// A consistent-enough copy of every record, sorted by id.
    #[must_use]
    pub fn snapshot(&self) -> Metadata {
        let mut users: Vec<_> = self.users.iter().map(|e| e.value().clone()).collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        let mut warehouses: Vec<_> = self.warehouses.iter().map(|e| e.value().clone()).collect();
        warehouses.sort_by(|a, b| a.id.cmp(&b.id));
        let mut api_keys: Vec<_> = self.api_keys.iter().map(|e| e.value().clone()).collect();
        api_keys.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.key.cmp(&b.key)));
        let mut files: Vec<_> = self.files.iter().map(|e| e.value().clone()).collect();
        files.sort_by(|a, b| a.id.cmp(&b.id));

        Metadata {
            users,
            warehouses,
            api_keys,
            files,
        }
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Insert or replace a file record and persist.
    ///
    /// The record is withdrawn again if the snapshot cannot be written.
    pub async fn add_file(&self, file: StoredFile) -> Result<StoredFile, StoreError> {
        debug!(file_id = %file.id, file = %file.file_ref(), "adding file record");
        let key = (file.warehouse_id.clone(), file.filename.clone());
        let previous = self.files.get(&key).map(|f| f.clone());
        self.index_file(file.clone());

        if let Err(e) = self.persist().await {
            warn!(file_id = %file.id, "snapshot failed, withdrawing file record");
            self.file_ids.remove(&file.id);
            match previous {
                Some(previous) => self.index_file(previous),
                None => {
                    self.files.remove(&key);
                }
            }
            return Err(e);
        }
        Ok(file)
    }

    /// Remove a file record by id and persist.
    ///
    /// The record is restored if the snapshot cannot be written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::FileNotFound`] if no file has `file_id`.
    pub async fn remove_file(&self, file_id: &str) -> Result<StoredFile, StoreError> {
        let not_found = || StoreError::FileNotFound {
            file_id: file_id.to_owned(),
        };
        let (_, key) = self.file_ids.remove(file_id).ok_or_else(not_found)?;
        let Some((_, removed)) = self.files.remove(&key) else {
            return Err(not_found());
        };

        if let Err(e) = self.persist().await {
            warn!(file_id, "snapshot failed, restoring file record");
            self.index_file(removed);
            return Err(e);
        }
        info!(file_id, file = %removed.file_ref(), "file record removed");
        Ok(removed)
    }

    /// Set a file's verification flag and persist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::FileNotFound`] if no file has `file_id`.
    pub async fn set_verified(
        &self,
        file_id: &str,
        is_verified: bool,
        verified_by: &str,
        verified_at: &str,
    ) -> Result<StoredFile, StoreError> {
        let key = self
            .file_ids
            .get(file_id)
            .map(|k| k.clone())
            .ok_or_else(|| StoreError::FileNotFound {
                file_id: file_id.to_owned(),
            })?;

        let (previous, updated) = {
            let mut entry = self
                .files
                .get_mut(&key)
                .ok_or_else(|| StoreError::FileNotFound {
                    file_id: file_id.to_owned(),
                })?;
            let previous = entry.clone();
            entry.is_verified = is_verified;
            entry.verified_by = Some(verified_by.to_owned());
            entry.verified_at = Some(verified_at.to_owned());
            (previous, entry.clone())
        };

        if let Err(e) = self.persist().await {
            warn!(file_id, "snapshot failed, reverting verification change");
            if let Some(mut entry) = self.files.get_mut(&key) {
                entry.is_verified = previous.is_verified;
                entry.verified_by = previous.verified_by;
                entry.verified_at = previous.verified_at;
            }
            return Err(e);
        }
        info!(file_id, is_verified, by = verified_by, "file verification changed");
        Ok(updated)
    }

    /// Insert or replace a user and persist.
    pub async fn upsert_user(&self, user: UserRecord) -> Result<(), StoreError> {
        debug!(user_id = %user.id, "upserting user");
        self.users.insert(user.id.clone(), user);
        self.persist().await
    }

    /// Insert or replace a warehouse and persist.
    pub async fn upsert_warehouse(&self, warehouse: Warehouse) -> Result<(), StoreError> {
        self.warehouses.insert(warehouse.id.clone(), warehouse);
        self.persist().await
    }

    /// Insert or replace an API key and persist.
    pub async fn upsert_api_key(&self, key: ApiKeyRecord) -> Result<(), StoreError> {
        debug!(key = %key.label(), warehouse = %key.warehouse_id, "upserting api key");
        self.api_keys.insert(key.key.clone(), key);
        self.persist().await
    }

    /// Write the current snapshot if the store is backed by a file.
    pub async fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let _guard = self.write_lock.lock().await;
        let json = serde_json::to_vec_pretty(&self.snapshot())?;
        write_atomically(path, &json).await?;
        debug!(path = %path.display(), bytes = json.len(), "metadata snapshot written");
        Ok(())
    }
}

async fn write_atomically(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, data)
        .await
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

impl Directory for MetadataStore {
    fn find_file(&self, warehouse_id: &str, filename: &str) -> Option<StoredFile> {
        self.files
            .get(&(warehouse_id.to_owned(), filename.to_owned()))
            .map(|f| f.clone())
    }

    fn find_api_key(&self, key: &str) -> Option<ApiKeyRecord> {
        self.api_keys.get(key).map(|k| k.clone())
    }

    fn find_user(&self, user_id: &str) -> Option<UserRecord> {
        self.users.get(user_id).map(|u| u.clone())
    }

    fn find_user_by_email(&self, email: &str) -> Option<UserRecord> {
        self.users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .map(|u| u.value().clone())
    }
}
