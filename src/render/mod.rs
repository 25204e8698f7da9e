//! Page rendering: content stream interpretation onto vector or raster
//! surfaces.

pub mod font;
pub mod image;
mod interpreter;
mod options;
mod raster;
mod result;
pub mod state;
mod svg;
mod target;

pub use interpreter::{render, PageRenderer};
pub use options::{RenderOptions, RenderScale, DEFAULT_FALLBACK_DPI, DEFAULT_MAX_FORM_DEPTH};
pub use raster::{pixmap_to_rgb, pixmap_to_rgba, RasterTarget};
pub use result::{RenderResult, RenderWarning, WarningKind};
pub use svg::SvgTarget;
pub use target::{
    Capability, ClipPath, FillStyle, GlyphOutline, ImagePaint, Paint, PathPaint,
    PositionedGlyph, RenderTarget, StrokeStyle, TextRun,
};
