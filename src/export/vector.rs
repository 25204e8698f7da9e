//! SVG export of single pages.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use super::PageExporter;
use crate::error::ExportError;
use crate::model::{ArtifactFormat, ArtifactKind, OutputArtifact, Page};
use crate::render::{PageRenderer, RenderOptions, RenderScale, SvgTarget};

/// Serialization of vector artifacts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorFormat {
    /// Plain SVG text
    #[default]
    Svg,
    /// Gzip-compressed SVG
    Svgz,
}

impl VectorFormat {
    fn artifact_format(self) -> ArtifactFormat {
        match self {
            VectorFormat::Svg => ArtifactFormat::Svg,
            VectorFormat::Svgz => ArtifactFormat::Svgz,
        }
    }
}

/// Options for vector export.
#[derive(Debug, Clone, Default)]
pub struct VectorOptions {
    /// Output serialization
    pub format: VectorFormat,

    /// Renderer configuration
    pub render: RenderOptions,
}

impl VectorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output serialization.
    pub fn with_format(mut self, format: VectorFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the resolution for text that has to be rasterized.
    pub fn with_fallback_resolution(mut self, dpi: f64) -> Self {
        self.render = self.render.with_fallback_resolution(dpi);
        self
    }

    /// Replace the renderer configuration.
    pub fn with_render_options(mut self, render: RenderOptions) -> Self {
        self.render = render;
        self
    }
}

/// Exports pages as standalone SVG documents at 1:1 page scale.
#[derive(Debug, Clone, Default)]
pub struct VectorExporter {
    options: VectorOptions,
    renderer: PageRenderer,
}

impl VectorExporter {
    pub fn new(options: VectorOptions) -> Self {
        let renderer = PageRenderer::new(options.render.clone());
        Self { options, renderer }
    }

    pub fn options(&self) -> &VectorOptions {
        &self.options
    }

    /// Export `page`. A page rendered with omissions still exports; the
    /// omissions are listed on the artifact.
    pub fn export(&self, page: &Page<'_>) -> Result<OutputArtifact, ExportError> {
        let target = SvgTarget::new(page.width(), page.height())
            .with_fallback_resolution(self.options.render.fallback_resolution);
        let (svg, warnings) = self
            .renderer
            .render(page, target, RenderScale::Factor(1.0))
            .into_result()?;

        let bytes = match self.options.format {
            VectorFormat::Svg => svg.into_bytes(),
            VectorFormat::Svgz => gzip(svg.as_bytes())?,
        };
        log::debug!(
            "Page {}: exported {} bytes of vector output",
            page.index(),
            bytes.len()
        );

        Ok(OutputArtifact {
            page_index: page.index(),
            kind: ArtifactKind::Vector,
            format: self.options.format.artifact_format(),
            bytes,
            width: page.width(),
            height: page.height(),
            warnings,
        })
    }
}

impl PageExporter for VectorExporter {
    type Error = ExportError;

    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Vector
    }

    fn export_page(&self, page: &Page<'_>) -> Result<OutputArtifact, ExportError> {
        self.export(page)
    }
}

fn gzip(data: &[u8]) -> Result<Vec<u8>, ExportError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| ExportError::EncodingFailure(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| ExportError::EncodingFailure(e.to_string()))
}
