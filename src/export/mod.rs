//! Per-page artifact producers.
//!
//! Each exporter wraps the [`PageRenderer`](crate::render::PageRenderer)
//! with its own render target and encodes the result into an
//! [`OutputArtifact`].

mod thumbnail;
mod vector;

pub use thumbnail::{
    ThumbnailGenerator, ThumbnailOptions, DEFAULT_MAX_HEIGHT, DEFAULT_MAX_WIDTH, DEFAULT_QUALITY,
};
pub use vector::{VectorExporter, VectorFormat, VectorOptions};

use crate::model::{ArtifactKind, OutputArtifact, Page};

/// Something that turns one page into one artifact.
///
/// Implementations must be usable from several worker threads at once.
pub trait PageExporter: Send + Sync {
    /// Error produced when the page cannot be exported.
    type Error: std::error::Error + Send + 'static;

    /// Kind of artifact this exporter produces.
    fn kind(&self) -> ArtifactKind;

    /// Produce the artifact for `page`.
    fn export_page(&self, page: &Page<'_>) -> Result<OutputArtifact, Self::Error>;
}
