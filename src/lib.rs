//! # pdfslides
//!
//! Split PDF documents into per-page SVG drawings and JPEG thumbnails.
//!
//! Each page is interpreted once per output: the vector exporter replays
//! the page's content stream into a standalone SVG document at 1:1 page
//! scale, and the thumbnail generator rasterizes it into a fitted JPEG.
//! Pages are processed in parallel and every selected page reports an
//! outcome for both outputs, even when the document needed repair.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdfslides::{load_bytes, DirectoryWriter, OutputConfig, Pipeline};
//!
//! fn main() -> pdfslides::Result<()> {
//!     let data = std::fs::read("deck.pdf")?;
//!     let document = load_bytes(&data)?;
//!
//!     let writer = DirectoryWriter::new("out")?;
//!     let config = OutputConfig::new().with_max_size(320, 240).with_thumbnail_quality(80);
//!     let report = Pipeline::new(config).process_and_write(&document, &writer);
//!
//!     println!("{:?}: {} pages", report.status, report.page_count());
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Vector output**: paths, clipping, transparency, embedded images and
//!   embedded TrueType/OpenType glyph outlines
//! - **Thumbnails**: anti-aliased rasterization with aspect-preserving fit
//! - **Damaged files**: cross-reference reconstruction for broken trailers
//! - **Parallel processing**: Uses Rayon across pages, with cancellation

pub mod detect;
pub mod error;
pub mod export;
pub mod geometry;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod render;

// Re-export commonly used types
pub use detect::{detect_format_from_bytes, is_pdf_bytes, PdfFormat};
pub use error::{Error, ExportError, LoadError, RenderError, Result, ThumbnailError};
pub use export::{ThumbnailGenerator, ThumbnailOptions, VectorExporter, VectorFormat, VectorOptions};
pub use model::{
    ArtifactFormat, ArtifactKind, Document, LoadWarning, Metadata, OutputArtifact, Page, Validity,
};
pub use parser::{DocumentLoader, LoadOptions};
pub use pipeline::{
    ArtifactWriter, CancelToken, DirectoryWriter, FailureReason, NamingScheme, Outcome,
    OutputConfig, PageReport, PageSelection, Pipeline, RunReport, RunStatus,
};
pub use render::{PageRenderer, RenderOptions, RenderResult, RenderScale, RenderWarning};

use std::io::Read;
use std::path::Path;

/// Load a PDF from bytes with default options.
///
/// # Example
///
/// ```no_run
/// use pdfslides::load_bytes;
///
/// let data = std::fs::read("deck.pdf").unwrap();
/// let doc = load_bytes(&data).unwrap();
/// println!("Pages: {}", doc.page_count());
/// ```
pub fn load_bytes(data: &[u8]) -> Result<Document> {
    Ok(parser::load(data, &LoadOptions::default())?)
}

/// Load a PDF from bytes with custom options.
///
/// # Example
///
/// ```no_run
/// use pdfslides::{load_bytes_with_options, LoadOptions};
///
/// let data = std::fs::read("secret.pdf").unwrap();
/// let options = LoadOptions::new().with_password("hunter2");
/// let doc = load_bytes_with_options(&data, &options).unwrap();
/// ```
pub fn load_bytes_with_options(data: &[u8], options: &LoadOptions) -> Result<Document> {
    Ok(parser::load(data, options)?)
}

/// Load a PDF file.
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Document> {
    DocumentLoader::new(LoadOptions::default()).load_path(path)
}

/// Load a PDF from a reader.
pub fn load_reader<R: Read>(reader: R) -> Result<Document> {
    DocumentLoader::new(LoadOptions::default()).load_reader(reader)
}

/// Load `data` and export every page with `config`.
///
/// Never fails: a document that cannot be loaded yields a report with
/// [`RunStatus::Failure`] and no pages.
pub fn process_bytes(data: &[u8], config: OutputConfig) -> RunReport {
    Pipeline::new(config).process_bytes(data, &LoadOptions::default())
}

/// Export one page as SVG text.
pub fn page_to_svg(document: &Document, index: usize) -> Result<String> {
    let page = page_at(document, index)?;
    let artifact = VectorExporter::default().export(&page).map_err(|e| Error::Other(e.to_string()))?;
    String::from_utf8(artifact.bytes).map_err(|e| Error::Other(e.to_string()))
}

/// Export one page as a JPEG thumbnail fitted to `max_width x max_height`.
pub fn page_to_thumbnail(
    document: &Document,
    index: usize,
    max_width: u32,
    max_height: u32,
) -> Result<Vec<u8>> {
    let page = page_at(document, index)?;
    ThumbnailGenerator::default()
        .thumbnail(&page, max_width, max_height, export::DEFAULT_QUALITY)
        .map(|artifact| artifact.bytes)
        .map_err(|e| Error::Other(e.to_string()))
}

fn page_at(document: &Document, index: usize) -> Result<Page<'_>> {
    document.page(index).ok_or_else(|| {
        Error::PageOutOfRange(
            u32::try_from(index + 1).unwrap_or(u32::MAX),
            u32::try_from(document.page_count()).unwrap_or(u32::MAX),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_bytes_rejects_garbage() {
        assert!(matches!(
            load_bytes(b"not a pdf at all"),
            Err(Error::Load(LoadError::Malformed(_)))
        ));
    }

    #[test]
    fn test_process_bytes_load_failure() {
        let report = process_bytes(b"", OutputConfig::default());
        assert_eq!(report.status, RunStatus::Failure);
        assert!(report.pages.is_empty());
        assert!(matches!(report.error, Some(LoadError::Truncated(_))));
    }
}
