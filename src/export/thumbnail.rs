//! JPEG thumbnails of single pages.

use image::codecs::jpeg::JpegEncoder;
use image::ImageEncoder;

use super::PageExporter;
use crate::error::ThumbnailError;
use crate::model::{ArtifactFormat, ArtifactKind, OutputArtifact, Page};
use crate::render::{pixmap_to_rgb, PageRenderer, RasterTarget, RenderOptions, RenderScale};

/// Default thumbnail box width in pixels.
pub const DEFAULT_MAX_WIDTH: u32 = 512;

/// Default thumbnail box height in pixels.
pub const DEFAULT_MAX_HEIGHT: u32 = 512;

/// Default JPEG quality.
pub const DEFAULT_QUALITY: u8 = 75;

/// Options for thumbnail generation.
#[derive(Debug, Clone, Default)]
pub struct ThumbnailOptions {
    /// Render onto the full box instead of the page's fitted size.
    pub pad_to_box: bool,

    /// Renderer configuration
    pub render: RenderOptions,
}

impl ThumbnailOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Letterbox thumbnails to exactly the requested box.
    pub fn with_pad_to_box(mut self, pad: bool) -> Self {
        self.pad_to_box = pad;
        self
    }

    pub fn with_render_options(mut self, render: RenderOptions) -> Self {
        self.render = render;
        self
    }
}

/// Renders pages into fitted raster previews.
#[derive(Debug, Clone)]
pub struct ThumbnailGenerator {
    options: ThumbnailOptions,
    renderer: PageRenderer,
    max_width: u32,
    max_height: u32,
    quality: u8,
}

impl Default for ThumbnailGenerator {
    fn default() -> Self {
        Self::new(ThumbnailOptions::default())
    }
}

impl ThumbnailGenerator {
    pub fn new(options: ThumbnailOptions) -> Self {
        let renderer = PageRenderer::new(options.render.clone());
        Self {
            options,
            renderer,
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            quality: DEFAULT_QUALITY,
        }
    }

    /// Box and quality used by [`PageExporter::export_page`].
    pub fn with_limits(mut self, max_width: u32, max_height: u32, quality: u8) -> Self {
        self.max_width = max_width;
        self.max_height = max_height;
        self.quality = quality;
        self
    }

    pub fn options(&self) -> &ThumbnailOptions {
        &self.options
    }

    /// Render `page` to fit within `max_width x max_height` pixels and
    /// encode it as JPEG.
    ///
    /// `quality` is clamped to `1..=100`. The pixel buffer is released
    /// before this returns.
    pub fn thumbnail(
        &self,
        page: &Page<'_>,
        max_width: u32,
        max_height: u32,
        quality: u8,
    ) -> Result<OutputArtifact, ThumbnailError> {
        let (width, height) = if self.options.pad_to_box {
            check_dimension(page.width(), "page width")?;
            check_dimension(page.height(), "page height")?;
            check_box(max_width, max_height)?;
            (max_width, max_height)
        } else {
            fitted_size(page.width(), page.height(), max_width, max_height)?
        };

        let target = RasterTarget::new(width, height).ok_or_else(|| {
            ThumbnailError::InvalidDimensions(format!("{}x{} surface", width, height))
        })?;
        let scale = RenderScale::FitBox {
            width: width as f64,
            height: height as f64,
        };
        let (pixmap, warnings) = self.renderer.render(page, target, scale).into_result()?;

        let rgb = pixmap_to_rgb(&pixmap);
        drop(pixmap);
        let bytes = encode_jpeg(&rgb, quality)?;
        log::debug!(
            "Page {}: {}x{} thumbnail, {} bytes",
            page.index(),
            width,
            height,
            bytes.len()
        );

        Ok(OutputArtifact {
            page_index: page.index(),
            kind: ArtifactKind::Thumbnail,
            format: ArtifactFormat::Jpeg,
            bytes,
            width: width as f64,
            height: height as f64,
            warnings,
        })
    }
}

impl PageExporter for ThumbnailGenerator {
    type Error = ThumbnailError;

    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Thumbnail
    }

    fn export_page(&self, page: &Page<'_>) -> Result<OutputArtifact, ThumbnailError> {
        self.thumbnail(page, self.max_width, self.max_height, self.quality)
    }
}

/// Pixel size of a page scaled to fit the box, aspect preserved.
pub(crate) fn fitted_size(
    page_width: f64,
    page_height: f64,
    max_width: u32,
    max_height: u32,
) -> Result<(u32, u32), ThumbnailError> {
    check_dimension(page_width, "page width")?;
    check_dimension(page_height, "page height")?;
    check_box(max_width, max_height)?;

    let scale = (max_width as f64 / page_width).min(max_height as f64 / page_height);
    let width = (page_width * scale).round().clamp(1.0, max_width as f64);
    let height = (page_height * scale).round().clamp(1.0, max_height as f64);
    Ok((width as u32, height as u32))
}

fn check_dimension(value: f64, what: &str) -> Result<(), ThumbnailError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ThumbnailError::InvalidDimensions(format!(
            "{} is {}",
            what, value
        )))
    }
}

fn check_box(max_width: u32, max_height: u32) -> Result<(), ThumbnailError> {
    if max_width == 0 || max_height == 0 {
        return Err(ThumbnailError::InvalidDimensions(format!(
            "{}x{} box",
            max_width, max_height
        )));
    }
    Ok(())
}

fn encode_jpeg(image: &image::RgbImage, quality: u8) -> Result<Vec<u8>, ThumbnailError> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100))
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| ThumbnailError::EncodingFailure(e.to_string()))?;
    Ok(bytes)
}
