//! The surface abstraction the page interpreter paints onto.
//!
//! The interpreter is written once against [`RenderTarget`]; the SVG and
//! raster targets only differ in how they realize each paint call. All
//! geometry handed to a target comes with a transform into the target's own
//! coordinate space (y down, origin top-left, units given by
//! [`RenderTarget::surface_size`]).

use std::rc::Rc;

use super::font::FontStyle;
use super::image::DecodedImage;
use super::result::RenderWarning;
use super::state::{DashPattern, LineCap, LineJoin, Rgb};
use crate::geometry::{FillRule, Matrix, PathData};

/// What kind of output a target produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Resolution-independent drawing commands.
    Vector,
    /// A fixed grid of pixels.
    Raster,
}

/// A colour with constant opacity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paint {
    pub color: Rgb,
    pub alpha: f64,
}

/// How to fill a path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillStyle {
    pub paint: Paint,
    pub rule: FillRule,
}

/// How to stroke a path. Lengths are in the path's user space.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeStyle {
    pub paint: Paint,
    pub width: f64,
    pub cap: LineCap,
    pub join: LineJoin,
    pub miter_limit: f64,
    pub dash: Option<DashPattern>,
}

/// A path paint request.
#[derive(Debug, Clone)]
pub struct PathPaint<'a> {
    pub path: &'a PathData,
    /// User space to target space.
    pub transform: Matrix,
    pub fill: Option<FillStyle>,
    pub stroke: Option<StrokeStyle>,
}

/// A clip region; clips nest and intersect.
#[derive(Debug, Clone)]
pub struct ClipPath<'a> {
    pub path: &'a PathData,
    pub transform: Matrix,
    pub rule: FillRule,
}

/// Shape of one glyph from an embedded font program.
#[derive(Debug, Clone)]
pub struct GlyphOutline {
    /// Identifies the shape across a document: `(font serial, glyph id)`.
    pub key: (usize, u16),
    /// Outline in font units, y up.
    pub path: Rc<PathData>,
    pub units_per_em: f64,
}

/// One glyph of a text run.
#[derive(Debug, Clone)]
pub struct PositionedGlyph {
    /// Offset of the glyph origin from the run origin, in text space.
    pub x: f64,
    /// Baseline shift (text rise), in text space.
    pub y: f64,
    /// Horizontal advance, in text space.
    pub advance: f64,
    /// Unicode text for the glyph, empty when unknown.
    pub unicode: String,
    pub outline: Option<GlyphOutline>,
}

/// A run of glyphs shown by one text operator.
#[derive(Debug, Clone)]
pub struct TextRun<'a> {
    pub glyphs: &'a [PositionedGlyph],
    pub style: &'a FontStyle,
    /// False when the run's font resource could not be found.
    pub resolved: bool,
    pub font_size: f64,
    /// `Tz / 100`
    pub horizontal_scale: f64,
    /// Text space at the start of the run to target space.
    pub transform: Matrix,
    pub fill: Option<Paint>,
    pub stroke: Option<StrokeStyle>,
}

impl PositionedGlyph {
    /// Neither a shape nor text is known; only a placeholder can be drawn.
    pub fn is_blind(&self) -> bool {
        self.outline.is_none() && self.unicode.is_empty()
    }

    /// Whether a placeholder for this glyph should leave a mark. Glyphs with
    /// unknown text are assumed to be visible; known whitespace is not.
    pub fn is_inked(&self) -> bool {
        self.advance > 0.0 && (self.unicode.is_empty() || !self.unicode.trim().is_empty())
    }

    /// Glyph space to text space for an outline glyph.
    pub fn glyph_matrix(&self, outline: &GlyphOutline, run: &TextRun<'_>) -> Matrix {
        let unit = run.font_size / outline.units_per_em;
        Matrix::new(unit * run.horizontal_scale, 0.0, 0.0, unit, self.x, self.y)
    }
}

/// An image paint request.
#[derive(Debug, Clone)]
pub struct ImagePaint<'a> {
    pub image: &'a DecodedImage,
    /// Identifies the image within a page so it can be embedded once.
    pub key: Option<String>,
    /// The image unit square to target space.
    pub transform: Matrix,
    pub alpha: f64,
}

impl ImagePaint<'_> {
    /// Pixel space (y down, `width x height`) to target space.
    pub fn pixel_transform(&self) -> Matrix {
        let w = self.image.width.max(1) as f64;
        let h = self.image.height.max(1) as f64;
        Matrix::new(1.0 / w, 0.0, 0.0, -1.0 / h, 0.0, 1.0).then(&self.transform)
    }
}

/// An output surface accepting paint operations.
pub trait RenderTarget {
    /// What [`finalize`](RenderTarget::finalize) produces.
    type Output;

    fn capability(&self) -> Capability;

    /// Width and height of the surface in target units.
    fn surface_size(&self) -> (f64, f64);

    /// Intersect the clip with a path until the matching `pop_clip`.
    fn push_clip(&mut self, clip: &ClipPath<'_>);

    fn pop_clip(&mut self);

    fn paint_path(&mut self, paint: &PathPaint<'_>);

    fn paint_text(&mut self, run: &TextRun<'_>);

    fn paint_image(&mut self, image: &ImagePaint<'_>);

    /// Problems the target ran into while painting.
    fn drain_warnings(&mut self) -> Vec<RenderWarning> {
        Vec::new()
    }

    /// Finish the surface and hand back its contents.
    fn finalize(self) -> Self::Output;
}
