//! Pipeline configuration.

use std::ops::RangeInclusive;

use super::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::export::{
    ThumbnailOptions, VectorFormat, VectorOptions, DEFAULT_MAX_HEIGHT, DEFAULT_MAX_WIDTH,
    DEFAULT_QUALITY,
};
use crate::render::{RenderOptions, DEFAULT_FALLBACK_DPI};

/// Configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Thumbnail box width in pixels
    pub max_width: u32,

    /// Thumbnail box height in pixels
    pub max_height: u32,

    /// JPEG quality, 0-100
    pub thumbnail_quality: u8,

    /// Worker threads
    pub parallelism: usize,

    /// Polled between page units
    pub cancel: CancelToken,

    /// Vector serialization
    pub vector_format: VectorFormat,

    /// Letterbox thumbnails to the full box
    pub pad_to_box: bool,

    /// DPI for text that has to be rasterized in vector output
    pub fallback_resolution: f64,

    /// Pages to process
    pub pages: PageSelection,
}

impl OutputConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the thumbnail box.
    pub fn with_max_size(mut self, width: u32, height: u32) -> Self {
        self.max_width = width;
        self.max_height = height;
        self
    }

    pub fn with_max_width(mut self, width: u32) -> Self {
        self.max_width = width;
        self
    }

    pub fn with_max_height(mut self, height: u32) -> Self {
        self.max_height = height;
        self
    }

    /// Set the JPEG quality (values above 100 are clamped).
    pub fn with_thumbnail_quality(mut self, quality: u8) -> Self {
        self.thumbnail_quality = quality.min(100);
        self
    }

    /// Set the number of worker threads (at least one).
    pub fn with_parallelism(mut self, threads: usize) -> Self {
        self.parallelism = threads.max(1);
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_vector_format(mut self, format: VectorFormat) -> Self {
        self.vector_format = format;
        self
    }

    pub fn with_pad_to_box(mut self, pad: bool) -> Self {
        self.pad_to_box = pad;
        self
    }

    pub fn with_fallback_resolution(mut self, dpi: f64) -> Self {
        if dpi.is_finite() && dpi > 0.0 {
            self.fallback_resolution = dpi;
        }
        self
    }

    /// Set the pages to process.
    pub fn with_pages(mut self, selection: PageSelection) -> Self {
        self.pages = selection;
        self
    }

    /// Set a 1-based inclusive page range.
    pub fn with_page_range(mut self, range: RangeInclusive<u32>) -> Self {
        self.pages = PageSelection::Range(range);
        self
    }

    /// Set specific 1-based pages.
    pub fn with_page_list(mut self, pages: Vec<u32>) -> Self {
        self.pages = PageSelection::Pages(pages);
        self
    }

    pub(crate) fn vector_options(&self) -> VectorOptions {
        VectorOptions::new()
            .with_format(self.vector_format)
            .with_render_options(self.render_options())
    }

    pub(crate) fn thumbnail_options(&self) -> ThumbnailOptions {
        ThumbnailOptions::new()
            .with_pad_to_box(self.pad_to_box)
            .with_render_options(self.render_options())
    }

    fn render_options(&self) -> RenderOptions {
        RenderOptions::new().with_fallback_resolution(self.fallback_resolution)
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            thumbnail_quality: DEFAULT_QUALITY,
            parallelism: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            cancel: CancelToken::new(),
            vector_format: VectorFormat::Svg,
            pad_to_box: false,
            fallback_resolution: DEFAULT_FALLBACK_DPI,
            pages: PageSelection::All,
        }
    }
}

/// Page selection for processing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PageSelection {
    /// Process all pages
    #[default]
    All,
    /// Process a range of pages (inclusive, 1-indexed)
    Range(RangeInclusive<u32>),
    /// Process specific pages (1-indexed)
    Pages(Vec<u32>),
}

impl PageSelection {
    /// Check if a page number should be included.
    pub fn includes(&self, page: u32) -> bool {
        match self {
            PageSelection::All => true,
            PageSelection::Range(range) => range.contains(&page),
            PageSelection::Pages(pages) => pages.contains(&page),
        }
    }

    /// Parse a page selection string (e.g., "1-10", "1,3,5,7-10", "1 3 5").
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        let s = s.trim();

        if s.is_empty() || s == "all" {
            return Ok(PageSelection::All);
        }

        // Simple range (e.g., "1-10")
        if let Some((start, end)) = s.split_once('-') {
            let is_list = |part: &str| part.contains(',') || part.trim().contains(char::is_whitespace);
            if !is_list(start) && !is_list(end) {
                let start: u32 = start.trim().parse().map_err(|_| "Invalid start page")?;
                let end: u32 = end.trim().parse().map_err(|_| "Invalid end page")?;
                if start == 0 || end < start {
                    return Err(format!("Invalid range {}-{}", start, end));
                }
                return Ok(PageSelection::Range(start..=end));
            }
        }

        // Comma or whitespace separated list with possible ranges
        let mut pages = Vec::new();
        for part in s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|p| !p.is_empty())
        {
            if let Some((start, end)) = part.split_once('-') {
                let start: u32 = start.trim().parse().map_err(|_| "Invalid page number")?;
                let end: u32 = end.trim().parse().map_err(|_| "Invalid page number")?;
                for p in start..=end {
                    if !pages.contains(&p) {
                        pages.push(p);
                    }
                }
            } else {
                let p: u32 = part.parse().map_err(|_| "Invalid page number")?;
                if !pages.contains(&p) {
                    pages.push(p);
                }
            }
        }

        if pages.contains(&0) {
            return Err("Page numbers start at 1".to_string());
        }
        pages.sort();
        Ok(PageSelection::Pages(pages))
    }

    /// Zero-based page indices selected in a document of `page_count`
    /// pages, in ascending order.
    pub fn to_indices(&self, page_count: usize) -> Result<Vec<usize>> {
        let count = u32::try_from(page_count).unwrap_or(u32::MAX);
        match self {
            PageSelection::All => Ok((0..page_count).collect()),
            PageSelection::Range(range) => {
                if *range.start() == 0 || range.is_empty() {
                    return Err(Error::InvalidPageRange(format!(
                        "{}-{}",
                        range.start(),
                        range.end()
                    )));
                }
                if *range.end() > count {
                    return Err(Error::PageOutOfRange(*range.end(), count));
                }
                Ok(range.clone().map(|p| p as usize - 1).collect())
            }
            PageSelection::Pages(pages) => {
                let mut indices = Vec::with_capacity(pages.len());
                for &page in pages {
                    if page == 0 {
                        return Err(Error::InvalidPageRange("page 0".to_string()));
                    }
                    if page > count {
                        return Err(Error::PageOutOfRange(page, count));
                    }
                    indices.push(page as usize - 1);
                }
                indices.sort_unstable();
                indices.dedup();
                Ok(indices)
            }
        }
    }
}

impl std::str::FromStr for PageSelection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}
