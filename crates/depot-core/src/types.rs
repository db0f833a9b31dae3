//! Common type definitions shared across Depot crates.
//!
//! The record types (`StoredFile`, `Warehouse`, `ApiKeyRecord`, `UserRecord`,
//! `Metadata`) serialize with camelCase field names so an existing
//! `metadata.json` snapshot loads unchanged.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::DepotError;

/// Identifies the object a capability URL or download request addresses.
///
/// `filename` is an object key and may contain `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    /// The warehouse the file belongs to.
    pub warehouse_id: String,
    /// The stored object key within the warehouse.
    pub filename: String,
}

impl FileRef {
    /// Create a new file reference.
    #[must_use]
    pub fn new(warehouse_id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            warehouse_id: warehouse_id.into(),
            filename: filename.into(),
        }
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.warehouse_id, self.filename)
    }
}

/// The part of a file record the access gate consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileAccessState {
    /// Whether the file is approved for direct (unsigned) access.
    pub is_verified: bool,
}

/// Role of an authenticated subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full administrative access, including other admins.
    Superadmin,
    /// Administrative access to every warehouse.
    Admin,
    /// Access limited to entitled warehouses.
    #[default]
    User,
}

impl Role {
    /// Returns the role as its wire string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Superadmin => "superadmin",
            Self::Admin => "admin",
            Self::User => "user",
        }
    }

    /// Whether the role grants access to every warehouse.
    #[must_use]
    pub fn is_privileged(&self) -> bool {
        matches!(self, Self::Superadmin | Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DepotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "superadmin" => Ok(Self::Superadmin),
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            other => Err(DepotError::InvalidRole(other.to_owned())),
        }
    }
}

/// A resolved caller, produced from a session cookie or an API key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// User id, or a redacted API key label.
    pub subject_id: String,
    /// The caller's role.
    pub role: Role,
    /// Warehouses a non-privileged caller may access.
    pub entitled_warehouse_ids: BTreeSet<String>,
}

impl Identity {
    /// Create a new identity.
    #[must_use]
    pub fn new(
        subject_id: impl Into<String>,
        role: Role,
        entitled_warehouse_ids: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            role,
            entitled_warehouse_ids: entitled_warehouse_ids.into_iter().collect(),
        }
    }

    /// Whether this identity may access `warehouse_id`, either through its
    /// role or an explicit entitlement.
    #[must_use]
    pub fn can_access(&self, warehouse_id: &str) -> bool {
        self.role.is_privileged() || self.entitled_warehouse_ids.contains(warehouse_id)
    }
}

/// Metadata for an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    /// Unique file id (`f-<millis>` or `f-<uuid>`).
    pub id: String,
    /// Owning warehouse.
    pub warehouse_id: String,
    /// Stored object key.
    pub filename: String,
    /// Name presented in `Content-Disposition`.
    pub original_name: String,
    /// RFC 3339 upload timestamp.
    pub uploaded_at: String,
    /// Subject that uploaded the file.
    pub uploader: String,
    /// Size in bytes.
    pub size: u64,
    /// MIME type served as `Content-Type`.
    pub mime_type: String,
    /// Whether unsigned access is permitted.
    pub is_verified: bool,
    /// Subject that last changed the verification flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_by: Option<String>,
    /// When the verification flag last changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<String>,
}

impl StoredFile {
    /// The `(warehouse, filename)` pair addressing this file.
    #[must_use]
    pub fn file_ref(&self) -> FileRef {
        FileRef::new(&self.warehouse_id, &self.filename)
    }

    /// The state consulted by the access gate.
    #[must_use]
    pub fn access_state(&self) -> FileAccessState {
        FileAccessState {
            is_verified: self.is_verified,
        }
    }
}

/// A tenant-scoped storage bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warehouse {
    /// Warehouse id (`w-...`).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

/// An API key bound to exactly one warehouse.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyRecord {
    /// The bearer secret.
    pub key: String,
    /// The warehouse this key grants access to.
    pub warehouse_id: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// RFC 3339 timestamp of the last successful use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<String>,
}

impl ApiKeyRecord {
    /// A short, non-secret label for logs and uploader attribution.
    ///
    /// Derived from a SHA-256 digest of the key, so no key characters leak.
    #[must_use]
    pub fn label(&self) -> String {
        let digest = Sha256::digest(self.key.as_bytes());
        format!("apikey:{}", hex::encode(&digest[..6]))
    }

    /// The identity this key authenticates as.
    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity::new(self.label(), Role::User, [self.warehouse_id.clone()])
    }
}

impl fmt::Debug for ApiKeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyRecord")
            .field("key", &"<redacted>")
            .field("warehouse_id", &self.warehouse_id)
            .field("created_at", &self.created_at)
            .field("last_used", &self.last_used)
            .finish()
    }
}

/// A dashboard user.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// User id.
    pub id: String,
    /// Login email.
    pub email: String,
    /// `salt:hex(sha256(salt + password))`.
    pub password_hash: String,
    /// Role.
    pub role: Role,
    /// Warehouses this user is entitled to.
    #[serde(default)]
    pub warehouse_ids: Vec<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// RFC 3339 creation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl UserRecord {
    /// The identity this user authenticates as.
    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity::new(&self.id, self.role, self.warehouse_ids.iter().cloned())
    }
}

impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("warehouse_ids", &self.warehouse_ids)
            .finish_non_exhaustive()
    }
}

/// Full metadata snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// All users.
    #[serde(default)]
    pub users: Vec<UserRecord>,
    /// All warehouses.
    #[serde(default)]
    pub warehouses: Vec<Warehouse>,
    /// All API keys.
    #[serde(default)]
    pub api_keys: Vec<ApiKeyRecord>,
    /// All files.
    #[serde(default)]
    pub files: Vec<StoredFile>,
}
