//! Finished per-page outputs.

use serde::{Deserialize, Serialize};

use crate::render::RenderWarning;

/// What an artifact represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Scalable page drawing
    Vector,
    /// Raster preview
    Thumbnail,
}

/// Encoding of an artifact's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactFormat {
    Svg,
    Svgz,
    Jpeg,
}

impl ArtifactFormat {
    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactFormat::Svg => "svg",
            ArtifactFormat::Svgz => "svgz",
            ArtifactFormat::Jpeg => "jpg",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ArtifactFormat::Svg | ArtifactFormat::Svgz => "image/svg+xml",
            ArtifactFormat::Jpeg => "image/jpeg",
        }
    }
}

/// A finished output unit, ready to be persisted.
#[derive(Debug, Clone, Serialize)]
pub struct OutputArtifact {
    /// Zero-based index of the source page
    pub page_index: usize,

    pub kind: ArtifactKind,

    pub format: ArtifactFormat,

    /// Encoded file contents
    #[serde(skip)]
    pub bytes: Vec<u8>,

    /// Width in output units (points for vectors, pixels for thumbnails)
    pub width: f64,

    /// Height in output units
    pub height: f64,

    /// Content that was skipped while rendering
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<RenderWarning>,
}

impl OutputArtifact {
    /// Whether the page was rendered with omissions.
    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Size of the encoded bytes.
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// Default file name: `page-<index>.svg` or `page-<index>-thumb.jpg`.
    pub fn suggested_filename(&self) -> String {
        match self.kind {
            ArtifactKind::Vector => {
                format!("page-{}.{}", self.page_index, self.format.extension())
            }
            ArtifactKind::Thumbnail => {
                format!("page-{}-thumb.{}", self.page_index, self.format.extension())
            }
        }
    }
}
