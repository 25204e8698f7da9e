//! Error types for pdfslides.
//!
//! Errors are scoped the same way failures are: a [`LoadError`] aborts the
//! whole run, a [`RenderError`] belongs to one page, and [`ExportError`] /
//! [`ThumbnailError`] belong to one artifact of one page.

use std::io;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Result type alias for pdfslides operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-level error for the convenience API and the artifact writers.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading input or writing artifacts.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The document could not be loaded.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Report serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Page number is out of range.
    #[error("Page {0} is out of range (document has {1} pages)")]
    PageOutOfRange(u32, u32),

    /// Invalid page range specification.
    #[error("Invalid page range: {0}")]
    InvalidPageRange(String),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

/// Fatal document-level failures. Any of these aborts the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The bytes are not a PDF, or its structure is beyond recovery.
    #[error("Malformed PDF: {0}")]
    Malformed(String),

    /// The document is encrypted and no usable password was supplied.
    #[error("Document is encrypted")]
    Encrypted,

    /// The input ends before the document does.
    #[error("Truncated PDF: {0}")]
    Truncated(String),
}

/// Page-scoped rendering failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// A sub-object could not be painted. Recoverable: it becomes a warning.
    #[error("Unsupported content: {0}")]
    UnsupportedContent(String),

    /// The page's content stream cannot be read. Fatal for the page.
    #[error("Corrupt content stream: {0}")]
    CorruptContentStream(String),
}

impl RenderError {
    /// Whether rendering can continue past this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RenderError::UnsupportedContent(_))
    }
}

/// Vector export failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExportError {
    /// The vector document could not be serialized.
    #[error("Vector encoding failed: {0}")]
    EncodingFailure(String),

    /// The page could not be rendered.
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Thumbnail generation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailError {
    /// The raster could not be encoded.
    #[error("Thumbnail encoding failed: {0}")]
    EncodingFailure(String),

    /// The page or the requested box has no usable size.
    #[error("Invalid thumbnail dimensions: {0}")]
    InvalidDimensions(String),

    /// The page could not be rendered.
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl From<lopdf::Error> for LoadError {
    fn from(err: lopdf::Error) -> Self {
        match &err {
            lopdf::Error::Decryption(_) => LoadError::Encrypted,
            lopdf::Error::IO(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                LoadError::Truncated(e.to_string())
            }
            _ => LoadError::Malformed(err.to_string()),
        }
    }
}

macro_rules! serialize_as_display {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Serialize for $ty {
                fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
                where
                    S: Serializer,
                {
                    serializer.serialize_str(&self.to_string())
                }
            }
        )*
    };
}

serialize_as_display!(LoadError, RenderError, ExportError, ThumbnailError);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LoadError::Encrypted;
        assert_eq!(err.to_string(), "Document is encrypted");

        let err = Error::PageOutOfRange(10, 5);
        assert_eq!(
            err.to_string(),
            "Page 10 is out of range (document has 5 pages)"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_render_error_recoverability() {
        assert!(RenderError::UnsupportedContent("shading".into()).is_recoverable());
        assert!(!RenderError::CorruptContentStream("eof".into()).is_recoverable());
    }

    #[test]
    fn test_export_error_wraps_render_error() {
        let err: ExportError = RenderError::CorruptContentStream("bad".into()).into();
        assert_eq!(err.to_string(), "Corrupt content stream: bad");
    }

    #[test]
    fn test_errors_serialize_as_strings() {
        let json = serde_json::to_string(&ThumbnailError::EncodingFailure("x".into())).unwrap();
        assert_eq!(json, "\"Thumbnail encoding failed: x\"");
    }
}
