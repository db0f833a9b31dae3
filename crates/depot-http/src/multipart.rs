//! `multipart/form-data` parser for uploads.
//!
//! Works on the already-collected body. Every part carrying a `filename`
//! parameter (or named `file`) becomes a [`FilePart`]; all other parts are
//! text fields. Repeated field names keep every value in submission order.

use std::collections::HashMap;

use bytes::Bytes;

use crate::error::ApiError;

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct FilePart {
    /// Form field name the file arrived under.
    pub field_name: String,
    /// Client-supplied filename.
    pub filename: Option<String>,
    /// Part `Content-Type`.
    pub content_type: Option<String>,
    /// File bytes.
    pub data: Bytes,
}

/// A parsed form submission.
#[derive(Debug, Default)]
pub struct MultipartForm {
    /// Text fields, every value in order.
    pub fields: HashMap<String, Vec<String>>,
    /// File parts in order.
    pub files: Vec<FilePart>,
}

impl MultipartForm {
    /// First value of a text field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// All values of a text field.
    #[must_use]
    pub fn field_values(&self, name: &str) -> &[String] {
        self.fields.get(name).map_or(&[], Vec::as_slice)
    }
}

/// Extract the boundary from a `multipart/form-data; boundary=...` content type.
///
/// # Errors
///
/// Returns 400 when the content type is not multipart or has no boundary.
pub fn extract_boundary(content_type: &str) -> Result<String, ApiError> {
    if !content_type
        .to_ascii_lowercase()
        .starts_with("multipart/form-data")
    {
        return Err(ApiError::bad_request(
            "Content-Type must be multipart/form-data",
        ));
    }

    for param in content_type.split(';').skip(1) {
        let Some((key, val)) = param.split_once('=') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case("boundary") {
            let boundary = val.trim().trim_matches('"');
            if boundary.is_empty() {
                return Err(ApiError::bad_request("Empty multipart boundary"));
            }
            return Ok(boundary.to_owned());
        }
    }

    Err(ApiError::bad_request("Missing multipart boundary"))
}

/// Parse `body` delimited by `boundary`.
///
/// # Errors
///
/// Returns 400 when the body contains no boundary delimiter at all.
pub fn parse_multipart(body: &[u8], boundary: &str) -> Result<MultipartForm, ApiError> {
    let delimiter = format!("--{boundary}");
    let end_delimiter = format!("--{boundary}--");

    if find_bytes(body, delimiter.as_bytes()).is_none() {
        return Err(ApiError::bad_request("Malformed multipart body"));
    }

    let mut form = MultipartForm::default();
    for part in split_parts(body, delimiter.as_bytes(), end_delimiter.as_bytes()) {
        let Some((headers, content)) = split_headers_body(part) else {
            continue;
        };
        let headers = String::from_utf8_lossy(headers);
        let disposition = parse_content_disposition(&headers);
        let Some(name) = disposition.name else {
            continue;
        };

        if disposition.filename.is_some() || name == "file" {
            form.files.push(FilePart {
                field_name: name,
                filename: disposition.filename.filter(|f| !f.is_empty()),
                content_type: parse_part_content_type(&headers),
                data: Bytes::copy_from_slice(content),
            });
        } else {
            form.fields
                .entry(name)
                .or_default()
                .push(String::from_utf8_lossy(content).into_owned());
        }
    }

    Ok(form)
}

fn split_parts<'a>(body: &'a [u8], delimiter: &[u8], end_delimiter: &[u8]) -> Vec<&'a [u8]> {
    let mut parts = Vec::new();
    let Some(first) = find_bytes(body, delimiter) else {
        return parts;
    };
    let mut remaining = skip_crlf(&body[first + delimiter.len()..]);

    loop {
        if remaining.starts_with(b"--") {
            break;
        }
        if remaining
            .strip_prefix(b"\r\n")
            .is_some_and(|r| r.starts_with(end_delimiter))
        {
            break;
        }

        if let Some(pos) = find_bytes(remaining, delimiter) {
            parts.push(strip_trailing_crlf(&remaining[..pos]));
            remaining = skip_crlf(&remaining[pos + delimiter.len()..]);
        } else {
            let part = strip_trailing_crlf(remaining);
            if !part.is_empty() {
                parts.push(part);
            }
            break;
        }
    }

    parts
}

fn split_headers_body(part: &[u8]) -> Option<(&[u8], &[u8])> {
    let separator = b"\r\n\r\n";
    find_bytes(part, separator).map(|pos| (&part[..pos], &part[pos + separator.len()..]))
}

#[derive(Debug, Default)]
struct ContentDisposition {
    name: Option<String>,
    filename: Option<String>,
}

fn parse_content_disposition(headers: &str) -> ContentDisposition {
    let mut disposition = ContentDisposition::default();

    for line in headers.split("\r\n") {
        let Some((header, value)) = line.split_once(':') else {
            continue;
        };
        if !header.trim().eq_ignore_ascii_case("content-disposition") {
            continue;
        }
        // Parameters are matched by exact key so `name` never hits `filename`.
        for param in value.split(';').skip(1) {
            let Some((key, val)) = param.split_once('=') else {
                continue;
            };
            let val = unquote(val.trim());
            match key.trim().to_ascii_lowercase().as_str() {
                "name" => disposition.name = Some(val),
                "filename" => disposition.filename = Some(val),
                _ => {}
            }
        }
    }

    disposition
}

fn parse_part_content_type(headers: &str) -> Option<String> {
    headers.split("\r\n").find_map(|line| {
        let (header, value) = line.split_once(':')?;
        header
            .trim()
            .eq_ignore_ascii_case("content-type")
            .then(|| value.trim().to_owned())
            .filter(|v| !v.is_empty())
    })
}

fn unquote(value: &str) -> String {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
        .to_owned()
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn skip_crlf(data: &[u8]) -> &[u8] {
    data.strip_prefix(b"\r\n").unwrap_or(data)
}

fn strip_trailing_crlf(data: &[u8]) -> &[u8] {
    data.strip_suffix(b"\r\n").unwrap_or(data)
}
