//! Read-only lookup seam between the access core and the metadata store.
//!
//! The gate and identity resolver only ever read records. Implementations may
//! back this with an in-memory map, a database, or anything else.

use crate::types::{ApiKeyRecord, StoredFile, UserRecord};

/// Trait for looking up the records the access core consults.
pub trait Directory: Send + Sync {
    /// Find a file by its `(warehouse, filename)` address.
    fn find_file(&self, warehouse_id: &str, filename: &str) -> Option<StoredFile>;

    /// Find an API key record by its secret value.
    fn find_api_key(&self, key: &str) -> Option<ApiKeyRecord>;

    /// Find a user by id.
    fn find_user(&self, user_id: &str) -> Option<UserRecord>;

    /// Find a user by login email.
    fn find_user_by_email(&self, email: &str) -> Option<UserRecord>;
}
