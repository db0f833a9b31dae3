//! Depot service configuration.
//!
//! Provides [`DepotConfig`]. Values are loaded from environment variables with
//! sensible development defaults. Both signing secrets are excluded from
//! serialization and redacted from `Debug` output.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Development fallback for the capability signing secret.
pub const DEV_HMAC_SECRET: &str = "dev-hmac-secret-do-not-use-in-prod";

/// Development fallback for the session signing secret.
pub const DEV_SESSION_SECRET: &str = "dev-session-secret-do-not-use-in-prod";

/// Depot service configuration.
///
/// # Examples
///
/// ```
/// use depot_core::DepotConfig;
///
/// let config = DepotConfig::default();
/// assert_eq!(config.gateway_listen, "0.0.0.0:3000");
/// assert_eq!(config.default_ttl_secs, 3600);
/// ```
#[derive(Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct DepotConfig {
    /// Bind address for the HTTP server (e.g. `"0.0.0.0:3000"`).
    #[builder(default = String::from("0.0.0.0:3000"))]
    pub gateway_listen: String,

    /// Secret keying capability URL signatures.
    #[serde(skip_serializing, default = "default_hmac_secret")]
    #[builder(default = String::from(DEV_HMAC_SECRET))]
    pub hmac_secret: String,

    /// Secret keying session tokens.
    #[serde(skip_serializing, default = "default_session_secret")]
    #[builder(default = String::from(DEV_SESSION_SECRET))]
    pub session_secret: String,

    /// Directory holding the metadata snapshot.
    #[builder(default = PathBuf::from("./storage"))]
    pub data_dir: PathBuf,

    /// Directory holding uploaded file bytes, one subdirectory per warehouse.
    #[builder(default = PathBuf::from("./uploads"))]
    pub uploads_dir: PathBuf,

    /// Capability lifetime used when a request does not ask for one.
    #[builder(default = 3600)]
    pub default_ttl_secs: i64,

    /// Session cookie lifetime.
    #[builder(default = 28_800)]
    pub session_ttl_secs: i64,

    /// Whether per-client rate limiting is enforced.
    #[builder(default = true)]
    pub rate_limit: bool,

    /// Whether uploaded files are marked verified immediately.
    #[builder(default = true)]
    pub auto_verify_uploads: bool,

    /// Whether session cookies carry the `Secure` attribute.
    #[builder(default = false)]
    pub secure_cookies: bool,

    /// Largest accepted upload request body, in bytes.
    #[builder(default = 104_857_600)]
    pub max_upload_bytes: usize,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,
}

fn default_hmac_secret() -> String {
    DEV_HMAC_SECRET.to_owned()
}

fn default_session_secret() -> String {
    DEV_SESSION_SECRET.to_owned()
}

impl Default for DepotConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for DepotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DepotConfig")
            .field("gateway_listen", &self.gateway_listen)
            .field("hmac_secret", &"<redacted>")
            .field("session_secret", &"<redacted>")
            .field("data_dir", &self.data_dir)
            .field("uploads_dir", &self.uploads_dir)
            .field("default_ttl_secs", &self.default_ttl_secs)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("rate_limit", &self.rate_limit)
            .field("auto_verify_uploads", &self.auto_verify_uploads)
            .field("secure_cookies", &self.secure_cookies)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl DepotConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `GATEWAY_LISTEN` | `0.0.0.0:3000` |
    /// | `DEPOT_HMAC_SECRET` / `HMAC_SECRET` | development secret |
    /// | `DEPOT_SESSION_SECRET` / `SESSION_SECRET` | development secret |
    /// | `DEPOT_DATA_DIR` | `./storage` |
    /// | `DEPOT_UPLOADS_DIR` | `./uploads` |
    /// | `DEPOT_DEFAULT_TTL_SECS` | `3600` |
    /// | `DEPOT_SESSION_TTL_SECS` | `28800` |
    /// | `DEPOT_RATE_LIMIT` | `true` |
    /// | `DEPOT_AUTO_VERIFY_UPLOADS` | `true` |
    /// | `DEPOT_SECURE_COOKIES` | `false` |
    /// | `DEPOT_MAX_UPLOAD_BYTES` | `104857600` |
    /// | `DEPOT_LOG_LEVEL` / `LOG_LEVEL` | `info` |
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("GATEWAY_LISTEN") {
            config.gateway_listen = v;
        }
        if let Some(v) = first_env(&["DEPOT_HMAC_SECRET", "HMAC_SECRET"]) {
            config.hmac_secret = v;
        }
        if let Some(v) = first_env(&["DEPOT_SESSION_SECRET", "SESSION_SECRET"]) {
            config.session_secret = v;
        }
        if let Ok(v) = std::env::var("DEPOT_DATA_DIR") {
            config.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("DEPOT_UPLOADS_DIR") {
            config.uploads_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("DEPOT_DEFAULT_TTL_SECS") {
            if let Ok(n) = v.parse::<i64>() {
                config.default_ttl_secs = n;
            }
        }
        if let Ok(v) = std::env::var("DEPOT_SESSION_TTL_SECS") {
            if let Ok(n) = v.parse::<i64>() {
                config.session_ttl_secs = n;
            }
        }
        if let Ok(v) = std::env::var("DEPOT_RATE_LIMIT") {
            config.rate_limit = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("DEPOT_AUTO_VERIFY_UPLOADS") {
            config.auto_verify_uploads = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("DEPOT_SECURE_COOKIES") {
            config.secure_cookies = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("DEPOT_MAX_UPLOAD_BYTES") {
            if let Ok(n) = v.parse::<usize>() {
                config.max_upload_bytes = n;
            }
        }
        if let Some(v) = first_env(&["DEPOT_LOG_LEVEL", "LOG_LEVEL"]) {
            config.log_level = v;
        }

        config
    }

    /// Path of the JSON metadata snapshot.
    #[must_use]
    pub fn metadata_path(&self) -> PathBuf {
        self.data_dir.join("metadata.json")
    }

    /// Whether either signing secret is still the development fallback.
    #[must_use]
    pub fn uses_default_secrets(&self) -> bool {
        self.hmac_secret == DEV_HMAC_SECRET || self.session_secret == DEV_SESSION_SECRET
    }
}

/// Return the value of the first set environment variable in `names`.
fn first_env(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| std::env::var(name).ok())
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
