//! MIME type sniffing module
//!
//! Classifies stored content by its bytes, never by a client-supplied hint.
//! The raw detection is then passed through a serving policy that collapses
//! every text subtype and the binary fallback into `text/plain`.

/// Generic binary fallback returned when nothing matches
pub const OCTET_STREAM: &str = "application/octet-stream";

/// The single type served for text and unidentified content
pub const TEXT_PLAIN: &str = "text/plain";

/// How many leading bytes the text heuristics look at
const TEXT_SCAN_LIMIT: usize = 8192;

/// Classify content for serving
///
/// Detected `application/octet-stream` and any `text/*` become `text/plain`;
/// everything else is returned as detected.
pub fn classify(content: &[u8]) -> &'static str {
    let detected = detect(content);
    if detected == OCTET_STREAM || detected.starts_with("text/") {
        TEXT_PLAIN
    } else {
        detected
    }
}

/// Detect MIME type from magic bytes and content heuristics
pub fn detect(content: &[u8]) -> &'static str {
    if content.is_empty() {
        return "application/x-empty";
    }
    if let Some(mime) = detect_magic(content) {
        return mime;
    }
    if is_json(content) {
        return "application/json";
    }
    if looks_like_text(content) {
        return detect_text_subtype(content);
    }
    OCTET_STREAM
}

fn detect_magic(c: &[u8]) -> Option<&'static str> {
    let mime = match c {
        // Images
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => "image/png",
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        [b'B', b'M', _, _, _, _, 0, 0, 0, 0, ..] => "image/bmp",
        [0, 0, 1, 0, ..] => "image/vnd.microsoft.icon",
        [b'I', b'I', 0x2A, 0, ..] | [b'M', b'M', 0, 0x2A, ..] => "image/tiff",

        // Audio / video
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'A', b'V', b'E', ..] => "audio/x-wav",
        [b'I', b'D', b'3', ..] => "audio/mpeg",
        [b'O', b'g', b'g', b'S', ..] => "audio/ogg",
        [b'f', b'L', b'a', b'C', ..] => "audio/flac",
        [_, _, _, _, b'f', b't', b'y', b'p', ..] => "video/mp4",
        [0x1A, 0x45, 0xDF, 0xA3, ..] => "video/webm",

        // Documents and archives
        [b'%', b'P', b'D', b'F', b'-', ..] => "application/pdf",
        [b'P', b'K', 0x03, 0x04, ..] => "application/zip",
        [0x1F, 0x8B, ..] => "application/gzip",
        [b'B', b'Z', b'h', ..] => "application/x-bzip2",
        [0xFD, b'7', b'z', b'X', b'Z', 0x00, ..] => "application/x-xz",
        [b'7', b'z', 0xBC, 0xAF, 0x27, 0x1C, ..] => "application/x-7z-compressed",
        [b'R', b'a', b'r', b'!', 0x1A, 0x07, ..] => "application/x-rar",

        // Executables and databases
        [0x7F, b'E', b'L', b'F', ..] => "application/x-executable",
        [b'M', b'Z', ..] if !looks_like_text(c) => "application/x-dosexec",
        [0x00, b'a', b's', b'm', ..] => "application/wasm",
        [b'S', b'Q', b'L', b'i', b't', b'e', b' ', b'f', b'o', b'r', b'm', b'a', b't', b' ', b'3', 0, ..] => {
            "application/vnd.sqlite3"
        }

        _ if is_tar(c) => "application/x-tar",
        _ => return None,
    };
    Some(mime)
}

/// POSIX tar keeps its "ustar" magic at offset 257
fn is_tar(c: &[u8]) -> bool {
    c.get(257..262) == Some(b"ustar".as_slice())
}

fn is_json(c: &[u8]) -> bool {
    let trimmed = c.trim_ascii_start();
    matches!(trimmed.first(), Some(b'{' | b'['))
        && serde_json::from_slice::<serde_json::Value>(c).is_ok()
}

/// No NULs and almost no C0 control characters beyond whitespace
fn looks_like_text(c: &[u8]) -> bool {
    let sample = &c[..c.len().min(TEXT_SCAN_LIMIT)];
    let binary = sample
        .iter()
        .filter(|&&b| b == 0 || (b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0C | 0x1B)))
        .count();
    !sample.contains(&0) && binary * 100 <= sample.len()
}

fn detect_text_subtype(c: &[u8]) -> &'static str {
    let trimmed = c.trim_ascii_start();
    let head = String::from_utf8_lossy(&trimmed[..trimmed.len().min(256)]).to_ascii_lowercase();
    if head.starts_with("<!doctype html") || head.starts_with("<html") {
        "text/html"
    } else if head.starts_with("<?xml") {
        "text/xml"
    } else if head.starts_with("#!") {
        "text/x-shellscript"
    } else {
        TEXT_PLAIN
    }
}
