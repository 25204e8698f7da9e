//! Document-level types.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use lopdf::{Document as LopdfDocument, ObjectId};
use serde::{Deserialize, Serialize};

use super::page::{Page, PageGeometry};

/// A loaded PDF document.
///
/// The decoded object graph sits behind an `Arc` and is never mutated after
/// loading, so a `&Document` can be shared freely between page workers.
#[derive(Debug, Clone)]
pub struct Document {
    inner: Arc<LopdfDocument>,
    pages: Vec<PageEntry>,
    metadata: Metadata,
    validity: Validity,
    warnings: Vec<LoadWarning>,
}

/// Per-page data resolved once at load time.
#[derive(Debug, Clone)]
pub(crate) struct PageEntry {
    pub(crate) id: ObjectId,
    pub(crate) geometry: PageGeometry,
}

impl Document {
    pub(crate) fn new(
        inner: LopdfDocument,
        pages: Vec<PageEntry>,
        metadata: Metadata,
        validity: Validity,
        warnings: Vec<LoadWarning>,
    ) -> Self {
        Self {
            inner: Arc::new(inner),
            pages,
            metadata,
            validity,
            warnings,
        }
    }

    /// Get the number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Check if the document has any pages.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Get a page by zero-based index.
    pub fn page(&self, index: usize) -> Option<Page<'_>> {
        let entry = self.pages.get(index)?;
        Some(Page::new(self, index, entry))
    }

    /// Iterate over all pages in order.
    pub fn pages(&self) -> impl Iterator<Item = Page<'_>> + '_ {
        self.pages
            .iter()
            .enumerate()
            .map(move |(index, entry)| Page::new(self, index, entry))
    }

    /// Structural health of the document.
    pub fn validity(&self) -> Validity {
        self.validity
    }

    /// Problems encountered (and worked around) while loading.
    pub fn warnings(&self) -> &[LoadWarning] {
        &self.warnings
    }

    /// Document metadata.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Get PDF version.
    pub fn version(&self) -> &str {
        &self.metadata.pdf_version
    }

    /// The underlying lopdf object graph.
    pub fn raw(&self) -> &LopdfDocument {
        &self.inner
    }
}

/// Structural health of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validity {
    /// Loaded through its own cross-reference data.
    Valid,
    /// Loaded only after repairs; some content may be missing.
    PartiallyCorrupt,
    /// Could not be loaded at all.
    Invalid,
}

/// A problem the loader worked around.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadWarning {
    /// The cross-reference table was rebuilt by scanning the file.
    XrefRecovered {
        /// Objects located by the scan
        objects: usize,
        /// Why the regular load failed
        reason: String,
    },
    /// A page had no usable `/MediaBox`; US Letter was assumed.
    MissingMediaBox {
        /// Zero-based page index
        page_index: usize,
    },
}

impl std::fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadWarning::XrefRecovered { objects, reason } => write!(
                f,
                "cross-reference table rebuilt from {} objects ({})",
                objects, reason
            ),
            LoadWarning::MissingMediaBox { page_index } => {
                write!(f, "page {} has no media box, assuming Letter", page_index)
            }
        }
    }
}

/// Document metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    /// Document title
    pub title: Option<String>,

    /// Document author
    pub author: Option<String>,

    /// Creator application
    pub creator: Option<String>,

    /// PDF producer
    pub producer: Option<String>,

    /// Creation date
    pub created: Option<DateTime<Utc>>,

    /// PDF version (e.g., "1.7")
    pub pdf_version: String,

    /// Total number of pages
    pub page_count: u32,

    /// Whether the document was encrypted
    pub encrypted: bool,
}

impl Metadata {
    /// Create new metadata with PDF version.
    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            pdf_version: version.into(),
            ..Default::default()
        }
    }
}
