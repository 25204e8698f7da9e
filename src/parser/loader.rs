//! Document loading on top of lopdf.

use std::io::Read;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use lopdf::{Dictionary, Document as LopdfDocument, Object};

use crate::detect::{detect_format_from_bytes, has_encrypt_entry, has_eof_marker};
use crate::error::{LoadError, Result};
use crate::geometry::Rect;
use crate::model::{Document, LoadWarning, Metadata, PageEntry, PageGeometry, Validity};

use super::objects::{self, get_inherited};
use super::options::LoadOptions;
use super::recovery;

/// Opens PDF bytes and produces a read-only [`Document`].
#[derive(Debug, Clone, Default)]
pub struct DocumentLoader {
    options: LoadOptions,
}

impl DocumentLoader {
    pub fn new(options: LoadOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Load a document from a file on disk.
    pub fn load_path<P: AsRef<Path>>(&self, path: P) -> Result<Document> {
        let data = std::fs::read(path)?;
        Ok(self.load(&data)?)
    }

    /// Load a document from a reader. The input is read fully into memory.
    pub fn load_reader<R: Read>(&self, mut reader: R) -> Result<Document> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(self.load(&data)?)
    }

    /// Load a document from bytes.
    pub fn load(&self, data: &[u8]) -> std::result::Result<Document, LoadError> {
        let format = detect_format_from_bytes(data)?;
        let body = &data[format.header_offset..];

        let (doc, warnings) = match parse_lopdf(body) {
            Ok(doc) if has_page_tree(&doc) => (doc, Vec::new()),
            Ok(_) => self.recover(body, "document has no readable page tree".to_string())?,
            Err(LoadError::Encrypted) => return Err(LoadError::Encrypted),
            Err(err) => {
                if has_encrypt_entry(body) {
                    return Err(LoadError::Encrypted);
                }
                self.recover(body, err.to_string())?
            }
        };

        let doc = self.unlock(doc, body, !warnings.is_empty())?;
        let validity = if warnings.is_empty() {
            Validity::Valid
        } else {
            Validity::PartiallyCorrupt
        };
        build_document(doc, &format.version, validity, warnings)
    }

    /// Rebuild the cross-reference table by scanning, or report why we can't.
    fn recover(
        &self,
        body: &[u8],
        reason: String,
    ) -> std::result::Result<(LopdfDocument, Vec<LoadWarning>), LoadError> {
        if !self.options.recovery_enabled() {
            return Err(classify_failure(body, reason));
        }

        log::debug!("Regular load failed ({}), scanning for objects", reason);

        let recovered = recovery::rebuild(body).map_err(|e| classify_failure(body, e.to_string()))?;
        let doc = parse_lopdf(&recovered.bytes).map_err(|e| match e {
            LoadError::Encrypted => LoadError::Encrypted,
            other => classify_failure(body, other.to_string()),
        })?;
        if !has_page_tree(&doc) {
            return Err(classify_failure(
                body,
                "recovered document has no pages".to_string(),
            ));
        }

        log::warn!(
            "Recovered damaged cross-reference table ({} objects): {}",
            recovered.object_count,
            reason
        );
        Ok((
            doc,
            vec![LoadWarning::XrefRecovered {
                objects: recovered.object_count,
                reason,
            }],
        ))
    }

    /// Refuse or decrypt an encrypted document. A recovered document carries
    /// a synthesized trailer, so the original trailers are checked as well.
    fn unlock(
        &self,
        mut doc: LopdfDocument,
        body: &[u8],
        recovered: bool,
    ) -> std::result::Result<LopdfDocument, LoadError> {
        let encrypted = doc.is_encrypted()
            || trailer_has_encrypt(&doc)
            || (recovered && has_encrypt_entry(body));
        if !encrypted {
            return Ok(doc);
        }
        let Some(password) = self.options.password.as_deref() else {
            return Err(LoadError::Encrypted);
        };
        if doc.is_encrypted() {
            doc.decrypt(password).map_err(|e| {
                log::debug!("Decryption failed: {}", e);
                LoadError::Encrypted
            })?;
        }
        Ok(doc)
    }
}

/// Load with default options.
pub fn load(data: &[u8], options: &LoadOptions) -> std::result::Result<Document, LoadError> {
    DocumentLoader::new(options.clone()).load(data)
}

/// Parse with lopdf, turning parser panics on hostile input into errors.
fn parse_lopdf(data: &[u8]) -> std::result::Result<LopdfDocument, LoadError> {
    match panic::catch_unwind(AssertUnwindSafe(|| LopdfDocument::load_mem(data))) {
        Ok(result) => result.map_err(LoadError::from),
        Err(_) => Err(LoadError::Malformed("parser aborted on invalid input".to_string())),
    }
}

/// A file cut short usually lost its `%%EOF`; anything else is malformed.
fn classify_failure(body: &[u8], reason: String) -> LoadError {
    if has_eof_marker(body) {
        LoadError::Malformed(reason)
    } else {
        LoadError::Truncated(reason)
    }
}

fn has_page_tree(doc: &LopdfDocument) -> bool {
    doc.catalog().is_ok() && !doc.get_pages().is_empty()
}

fn trailer_has_encrypt(doc: &LopdfDocument) -> bool {
    doc.trailer.get(b"Encrypt").is_ok()
}

fn build_document(
    doc: LopdfDocument,
    header_version: &str,
    validity: Validity,
    mut warnings: Vec<LoadWarning>,
) -> std::result::Result<Document, LoadError> {
    let mut pages = Vec::new();
    for (index, (_, page_id)) in doc.get_pages().into_iter().enumerate() {
        let media_box = get_inherited(&doc, page_id, b"MediaBox")
            .and_then(|obj| objects::rect(&doc, obj))
            .filter(|r| !r.is_empty());
        let media_box = match media_box {
            Some(r) => r,
            None => {
                log::warn!("Page {} has no usable MediaBox, assuming Letter", index);
                warnings.push(LoadWarning::MissingMediaBox { page_index: index });
                Rect::letter()
            }
        };
        let crop_box = get_inherited(&doc, page_id, b"CropBox")
            .and_then(|obj| objects::rect(&doc, obj));
        let rotate = match get_inherited(&doc, page_id, b"Rotate") {
            Some(Object::Integer(r)) => *r,
            Some(Object::Real(r)) => *r as i64,
            _ => 0,
        };
        pages.push(PageEntry {
            id: page_id,
            geometry: PageGeometry::new(media_box, crop_box, rotate),
        });
    }

    if pages.is_empty() {
        return Err(LoadError::Malformed("document has no pages".to_string()));
    }

    let mut metadata = extract_metadata(&doc, header_version);
    metadata.page_count = pages.len() as u32;

    log::info!(
        "Loaded PDF {} with {} pages ({:?})",
        metadata.pdf_version,
        pages.len(),
        validity
    );

    Ok(Document::new(doc, pages, metadata, validity, warnings))
}

fn extract_metadata(doc: &LopdfDocument, header_version: &str) -> Metadata {
    let version = if doc.version.is_empty() {
        header_version.to_string()
    } else {
        doc.version.to_string()
    };
    let mut metadata = Metadata::with_version(version);

    let info = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|obj| objects::resolve(doc, obj))
        .and_then(|obj| obj.as_dict().ok());
    if let Some(info) = info {
        metadata.title = info_string(doc, info, b"Title");
        metadata.author = info_string(doc, info, b"Author");
        metadata.creator = info_string(doc, info, b"Creator");
        metadata.producer = info_string(doc, info, b"Producer");
        metadata.created = info_string(doc, info, b"CreationDate").and_then(|s| parse_pdf_date(&s));
    }
    metadata.encrypted = trailer_has_encrypt(doc);
    metadata
}

fn info_string(doc: &LopdfDocument, dict: &Dictionary, key: &[u8]) -> Option<String> {
    match objects::get(doc, dict, key)? {
        Object::String(bytes, _) => {
            let text = objects::decode_text_simple(bytes);
            let text = text.trim_end_matches('\0').trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        Object::Name(bytes) => String::from_utf8(bytes.clone()).ok(),
        _ => None,
    }
}

/// Parse a PDF date string (D:YYYYMMDDHHmmSSOHH'mm').
fn parse_pdf_date(s: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    let s = s.strip_prefix("D:").unwrap_or(s);

    if s.len() < 4 {
        return None;
    }

    let year: i32 = s.get(0..4)?.parse().ok()?;
    let month: u32 = s.get(4..6).and_then(|m| m.parse().ok()).unwrap_or(1);
    let day: u32 = s.get(6..8).and_then(|d| d.parse().ok()).unwrap_or(1);
    let hour: u32 = s.get(8..10).and_then(|h| h.parse().ok()).unwrap_or(0);
    let minute: u32 = s.get(10..12).and_then(|m| m.parse().ok()).unwrap_or(0);
    let second: u32 = s.get(12..14).and_then(|s| s.parse().ok()).unwrap_or(0);

    chrono::NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .map(|dt| chrono::DateTime::from_naive_utc_and_offset(dt, chrono::Utc))
}
