//! Password hashes.
//!
//! New hashes use the `salt:hex(sha256(salt + password))` format. Stored bcrypt
//! hashes (`$2a$`, `$2b$`, `$2y$`) are accepted on verification so existing user
//! records keep working.

use sha2::{Digest, Sha256};

use crate::signature::constant_time_eq;

/// Hash `password` with `salt`, producing the stored `salt:hash` form.
///
/// # Examples
///
/// ```
/// use depot_auth::password::{hash_password, verify_password};
///
/// let stored = hash_password("hunter2", "abc");
/// assert!(stored.starts_with("abc:"));
/// assert!(verify_password("hunter2", &stored));
/// ```
#[must_use]
pub fn hash_password(password: &str, salt: &str) -> String {
    format!("{salt}:{}", digest(salt, password))
}

/// A fresh random salt.
#[must_use]
pub fn generate_salt() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Check `password` against a stored `salt:hash` string or bcrypt hash.
///
/// Returns `false` for stored values in neither format.
#[must_use]
pub fn verify_password(password: &str, stored: &str) -> bool {
    if is_bcrypt(stored) {
        return bcrypt::verify(password, stored).unwrap_or(false);
    }
    let Some((salt, expected)) = stored.split_once(':') else {
        return false;
    };
    constant_time_eq(digest(salt, password).as_bytes(), expected.as_bytes())
}

fn is_bcrypt(stored: &str) -> bool {
    stored.starts_with("$2")
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}
