//! PDF header detection and cheap structural probes on raw bytes.

use crate::error::LoadError;

/// PDF format information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfFormat {
    /// PDF version (e.g., "1.7", "2.0")
    pub version: String,
    /// Byte offset of the `%PDF-` marker (usually 0)
    pub header_offset: usize,
    /// Whether the file declares itself linearized (fast web view)
    pub linearized: bool,
}

impl std::fmt::Display for PdfFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PDF {}", self.version)
    }
}

/// PDF magic bytes: %PDF-
const PDF_MAGIC: &[u8] = b"%PDF-";
const PDF_MAGIC_LEN: usize = 5;
const VERSION_LEN: usize = 3; // e.g., "1.7"

/// Readers accept junk before the header as long as it starts in this window.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// The end-of-file marker is searched for in this many trailing bytes.
const EOF_SEARCH_WINDOW: usize = 1024;

/// Detect the PDF format from the leading bytes of a document.
///
/// # Returns
/// * `Ok(PdfFormat)` if a valid header is found
/// * `Err(LoadError::Truncated)` for empty input
/// * `Err(LoadError::Malformed)` if the data is not a PDF
pub fn detect_format_from_bytes(data: &[u8]) -> Result<PdfFormat, LoadError> {
    if data.is_empty() {
        return Err(LoadError::Truncated("input is empty".to_string()));
    }

    let window = &data[..data.len().min(HEADER_SEARCH_WINDOW)];
    let header_offset = find(window, PDF_MAGIC)
        .ok_or_else(|| LoadError::Malformed("missing %PDF- header".to_string()))?;

    let version_start = header_offset + PDF_MAGIC_LEN;
    let version_bytes = data
        .get(version_start..version_start + VERSION_LEN)
        .ok_or_else(|| LoadError::Truncated("input ends inside the header".to_string()))?;
    let version = String::from_utf8_lossy(version_bytes).to_string();

    if !is_valid_version(&version) {
        return Err(LoadError::Malformed(format!(
            "unsupported PDF version: {}",
            version
        )));
    }

    Ok(PdfFormat {
        version,
        header_offset,
        linearized: find(window, b"/Linearized").is_some(),
    })
}

/// Check if a version string is valid.
fn is_valid_version(version: &str) -> bool {
    if version.len() != 3 {
        return false;
    }

    let chars: Vec<char> = version.chars().collect();
    chars[0].is_ascii_digit() && chars[1] == '.' && chars[2].is_ascii_digit()
}

/// Check if bytes start like a PDF.
pub fn is_pdf_bytes(data: &[u8]) -> bool {
    detect_format_from_bytes(data).is_ok()
}

/// Whether the document ends with an `%%EOF` marker.
///
/// Its absence on an unreadable file usually means an interrupted transfer.
pub fn has_eof_marker(data: &[u8]) -> bool {
    let start = data.len().saturating_sub(EOF_SEARCH_WINDOW);
    find(&data[start..], b"%%EOF").is_some()
}

/// Whether any trailer in the file references an encryption dictionary.
///
/// Only `trailer` dictionaries and cross-reference stream dictionaries are
/// looked at; the same bytes inside page content or strings do not count.
pub fn has_encrypt_entry(data: &[u8]) -> bool {
    let mut rest = data;
    while let Some(pos) = find(rest, b"trailer") {
        let after = &rest[pos + 7..];
        let skip = after.iter().take_while(|b| b.is_ascii_whitespace()).count();
        if after[skip..].starts_with(b"<<") {
            if let Some(dict) = dictionary_at(&after[skip..]) {
                if has_encrypt_key(dict) {
                    return true;
                }
            }
        }
        rest = after;
    }

    let mut offset = 0;
    while let Some(pos) = find(&data[offset..], b"/XRef") {
        let at = offset + pos;
        offset = at + 5;
        let before = trim_end(&data[..at]);
        if !before.ends_with(b"/Type") {
            continue;
        }
        // The enclosing dictionary starts after the nearest `obj` keyword.
        let Some(obj) = rfind(&data[..at], b"obj") else {
            continue;
        };
        let Some(open) = find(&data[obj..at], b"<<") else {
            continue;
        };
        if let Some(dict) = dictionary_at(&data[obj + open..]) {
            if has_encrypt_key(dict) {
                return true;
            }
        }
    }
    false
}

/// The balanced `<< ... >>` at the start of `data`.
fn dictionary_at(data: &[u8]) -> Option<&[u8]> {
    let mut depth = 0usize;
    let mut i = 0;
    while i + 1 < data.len() {
        match &data[i..i + 2] {
            b"<<" => {
                depth += 1;
                i += 2;
            }
            b">>" => {
                depth = depth.checked_sub(1)?;
                i += 2;
                if depth == 0 {
                    return Some(&data[..i]);
                }
            }
            _ => i += 1,
        }
    }
    None
}

fn has_encrypt_key(dict: &[u8]) -> bool {
    let mut rest = dict;
    while let Some(pos) = find(rest, b"/Encrypt") {
        let after = rest.get(pos + 8).copied();
        // Keys like /EncryptMetadata are not the trailer entry.
        if !matches!(after, Some(b) if b.is_ascii_alphanumeric()) {
            return true;
        }
        rest = &rest[pos + 8..];
    }
    false
}

fn trim_end(data: &[u8]) -> &[u8] {
    let len = data.len() - data.iter().rev().take_while(|b| b.is_ascii_whitespace()).count();
    &data[..len]
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
