//! Upload body decoding module
//!
//! Extracts the single uploaded value from a form-encoded POST body.
//! Supports `multipart/form-data` and `application/x-www-form-urlencoded`.

use hyper::body::Bytes;
use thiserror::Error;

/// Uploaded value, resolved once at the request boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Bytes),
}

impl Payload {
    /// Bytes to persist; text is stored as UTF-8
    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Text(text) => Bytes::from(text),
            Self::Binary(bytes) => bytes,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Binary(bytes) => bytes.is_empty(),
        }
    }
}

/// One decoded form field
#[derive(Debug, Clone)]
pub struct FormField {
    pub name: String,
    pub value: Payload,
}

#[derive(Debug, Error)]
pub enum FormError {
    #[error("unsupported content type: {0}")]
    Unsupported(String),

    #[error("malformed multipart body: {0}")]
    Malformed(&'static str),

    #[error("invalid urlencoded body: {0}")]
    UrlEncoded(#[from] serde_urlencoded::de::Error),
}

/// Extract the uploaded value from a request body
///
/// Blank fields are discarded and the last remaining field wins.
/// Returns `Ok(None)` when the body holds no usable field.
pub fn extract_payload(content_type: Option<&str>, body: &Bytes) -> Result<Option<Payload>, FormError> {
    let fields = parse_form(content_type, body)?;
    Ok(fields
        .into_iter()
        .rev()
        .find(|field| !field.value.is_empty())
        .map(|field| {
            crate::logger::log_debug(&format!("Upload taken from field '{}'", field.name));
            field.value
        }))
}

/// Decode every field of a form body
pub fn parse_form(content_type: Option<&str>, body: &Bytes) -> Result<Vec<FormField>, FormError> {
    let content_type = content_type.unwrap_or("application/x-www-form-urlencoded");
    let (essence, params) = content_type
        .split_once(';')
        .unwrap_or((content_type, ""));

    match essence.trim().to_ascii_lowercase().as_str() {
        "application/x-www-form-urlencoded" => parse_urlencoded(body),
        "multipart/form-data" => {
            let boundary = header_param(params, "boundary").ok_or(FormError::Malformed("missing boundary"))?;
            parse_multipart(body, &boundary)
        }
        other => Err(FormError::Unsupported(other.to_string())),
    }
}

fn parse_urlencoded(body: &[u8]) -> Result<Vec<FormField>, FormError> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body)?;
    Ok(pairs
        .into_iter()
        .map(|(name, value)| FormField {
            name,
            value: Payload::Text(value),
        })
        .collect())
}

fn parse_multipart(body: &Bytes, boundary: &str) -> Result<Vec<FormField>, FormError> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();
    let next_delimiter = format!("\r\n--{boundary}");
    let next_delimiter = next_delimiter.as_bytes();

    let mut pos = find(body, delimiter, 0).ok_or(FormError::Malformed("no opening boundary"))? + delimiter.len();
    let mut fields = Vec::new();

    loop {
        let rest = &body[pos..];
        if rest.starts_with(b"--") {
            return Ok(fields);
        }
        if !rest.starts_with(b"\r\n") {
            return Err(FormError::Malformed("boundary not followed by CRLF"));
        }
        pos += 2;

        // A part may carry no headers at all: the blank line follows the boundary
        let (headers, content_start) = if body[pos..].starts_with(b"\r\n") {
            ("", pos + 2)
        } else {
            let headers_end =
                find(body, b"\r\n\r\n", pos).ok_or(FormError::Malformed("unterminated part headers"))?;
            let headers = std::str::from_utf8(&body[pos..headers_end])
                .map_err(|_| FormError::Malformed("part headers are not UTF-8"))?;
            (headers, headers_end + 4)
        };
        let content_end =
            find(body, next_delimiter, content_start).ok_or(FormError::Malformed("unterminated part"))?;

        if let Some(field) = parse_part(headers, body.slice(content_start..content_end)) {
            fields.push(field);
        }
        pos = content_end + next_delimiter.len();
    }
}

/// Build a field from one part; parts without a form-data name are skipped
fn parse_part(headers: &str, content: Bytes) -> Option<FormField> {
    let disposition = headers.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case("content-disposition")
            .then(|| value.trim())
    })?;

    let (kind, params) = disposition.split_once(';').unwrap_or((disposition, ""));
    if !kind.trim().eq_ignore_ascii_case("form-data") {
        return None;
    }
    let name = header_param(params, "name")?;

    // File uploads stay binary; plain fields are text when they decode
    let value = if header_param(params, "filename").is_some() {
        Payload::Binary(content)
    } else {
        match std::str::from_utf8(&content) {
            Ok(text) => Payload::Text(text.to_string()),
            Err(_) => Payload::Binary(content),
        }
    };
    Some(FormField { name, value })
}

/// Look up `key` in a `; key=value; key="value"` parameter list
fn header_param(params: &str, key: &str) -> Option<String> {
    params.split(';').find_map(|param| {
        let (k, v) = param.split_once('=')?;
        k.trim()
            .eq_ignore_ascii_case(key)
            .then(|| v.trim().trim_matches('"').to_string())
    })
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|i| i + from)
}
