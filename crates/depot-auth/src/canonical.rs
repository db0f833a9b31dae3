//! Canonical string construction for capability URLs.
//!
//! Issuance and verification both go through [`string_to_sign`]; there is no
//! other place that builds the signed bytes. The format is:
//!
//! ```text
//! {warehouseId}/{filename}?expires={expiresAt}
//! ```
//!
//! built from the *decoded* warehouse id and filename. The URL path carries
//! the same values percent-encoded segment by segment, with `/` preserved so
//! that multi-segment object keys survive.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

use depot_core::EpochSeconds;

/// Route prefix under which files are served.
pub const FILES_PREFIX: &str = "/api/files/";

/// Shortest capability lifetime.
pub const MIN_TTL_SECS: i64 = 1;

/// Longest capability lifetime (24 hours).
pub const MAX_TTL_SECS: i64 = 86_400;

/// Characters percent-encoded inside a path segment.
///
/// Everything except RFC 3986 unreserved characters (A-Z, a-z, 0-9, `-`, `_`,
/// `.`, `~`) is encoded.
const SEGMENT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Build the canonical string that capability signatures cover.
///
/// # Examples
///
/// ```
/// use depot_auth::canonical::string_to_sign;
///
/// assert_eq!(string_to_sign("w-1", "a/b.png", 4600), "w-1/a/b.png?expires=4600");
/// ```
#[must_use]
pub fn string_to_sign(warehouse_id: &str, filename: &str, expires_at: EpochSeconds) -> String {
    format!("{warehouse_id}/{filename}?expires={expires_at}")
}

/// Clamp a requested lifetime into `[MIN_TTL_SECS, MAX_TTL_SECS]`.
///
/// Requests above the ceiling silently get the ceiling.
///
/// # Examples
///
/// ```
/// use depot_auth::canonical::clamp_ttl;
///
/// assert_eq!(clamp_ttl(999_999), 86_400);
/// assert_eq!(clamp_ttl(0), 1);
/// ```
#[must_use]
pub fn clamp_ttl(requested: i64) -> i64 {
    requested.clamp(MIN_TTL_SECS, MAX_TTL_SECS)
}

/// Build the relative file path for `(warehouse_id, filename)`.
///
/// # Examples
///
/// ```
/// use depot_auth::canonical::file_path;
///
/// assert_eq!(file_path("w-1", "a/b.png"), "/api/files/w-1/a/b.png");
/// assert_eq!(file_path("w-1", "my file.txt"), "/api/files/w-1/my%20file.txt");
/// ```
#[must_use]
pub fn file_path(warehouse_id: &str, filename: &str) -> String {
    format!(
        "{FILES_PREFIX}{}/{}",
        encode_segment(warehouse_id),
        encode_key(filename)
    )
}

/// Split a request path into a decoded `(warehouse_id, filename)` pair.
///
/// The filename is the entire remainder after the warehouse segment and may
/// contain `/`. Returns `None` if the path is not under [`FILES_PREFIX`],
/// either component is empty, or a segment is not valid UTF-8 once decoded.
///
/// # Examples
///
/// ```
/// use depot_auth::canonical::split_file_path;
///
/// let (w, f) = split_file_path("/api/files/w-1/a/b.png").unwrap();
/// assert_eq!((w.as_str(), f.as_str()), ("w-1", "a/b.png"));
/// assert!(split_file_path("/api/files/w-1").is_none());
/// ```
#[must_use]
pub fn split_file_path(path: &str) -> Option<(String, String)> {
    let rest = path.strip_prefix(FILES_PREFIX)?;
    let (raw_warehouse, raw_filename) = rest.split_once('/')?;
    if raw_warehouse.is_empty() || raw_filename.is_empty() {
        return None;
    }

    let warehouse_id = decode(raw_warehouse)?;
    let filename = raw_filename
        .split('/')
        .map(decode)
        .collect::<Option<Vec<_>>>()?
        .join("/");

    if warehouse_id.is_empty() || warehouse_id.contains('/') || filename.is_empty() {
        return None;
    }
    Some((warehouse_id, filename))
}

/// Percent-encode an object key, preserving `/` between segments.
fn encode_key(key: &str) -> String {
    key.split('/')
        .map(encode_segment)
        .collect::<Vec<_>>()
        .join("/")
}

fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT_ENCODE_SET).to_string()
}

fn decode(segment: &str) -> Option<String> {
    percent_decode_str(segment)
        .decode_utf8()
        .ok()
        .map(std::borrow::Cow::into_owned)
}
