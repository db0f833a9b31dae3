//! HMAC-SHA256 signing and constant-time comparison.
//!
//! Every signature Depot produces (capability URLs and session tokens) is a
//! lowercase hex HMAC-SHA256 computed here, and every signature it checks is
//! compared with [`constant_time_eq`].

use std::fmt;
use std::sync::Arc;

use hmac::{Hmac, KeyInit, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// A server-held symmetric key.
///
/// Cheap to clone. Rotating the key invalidates every outstanding signature
/// made with it.
///
/// # Examples
///
/// ```
/// use depot_auth::signature::SigningKey;
///
/// let key = SigningKey::new("secret");
/// assert_eq!(key.sign_hex(b"data").len(), 64);
/// assert!(!format!("{key:?}").contains("secret"));
/// ```
#[derive(Clone)]
pub struct SigningKey {
    secret: Arc<[u8]>,
}

impl SigningKey {
    /// Create a signing key from secret bytes.
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: Arc::from(secret.as_ref()),
        }
    }

    /// Compute `hex(HMAC_SHA256(secret, data))` in lowercase.
    #[must_use]
    pub fn sign_hex(&self, data: &[u8]) -> String {
        hex::encode(hmac_sha256(&self.secret, data))
    }

    /// Check a provided lowercase hex signature over `data` in constant time.
    #[must_use]
    pub fn verify_hex(&self, data: &[u8], provided: &str) -> bool {
        let expected = self.sign_hex(data);
        constant_time_eq(expected.as_bytes(), provided.as_bytes())
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Compare two byte strings without short-circuiting on the first mismatch.
///
/// Slices of different lengths compare unequal; the length itself is not
/// treated as secret.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Compute HMAC-SHA256 of `data` under `key`.
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = <HmacSha256 as KeyInit>::new_from_slice(key)
        .expect("HMAC can accept keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
