//! Pixel output.

use std::collections::HashMap;

use image::{Rgb as RgbPixel, RgbImage, Rgba, RgbaImage};
use tiny_skia::{
    FillRule as SkiaFillRule, FilterQuality, IntSize, Mask, Paint as SkiaPaint, PathBuilder,
    Pixmap, PixmapPaint, Stroke, StrokeDash, Transform,
};

use super::result::{RenderWarning, WarningKind};
use super::state::{LineCap, LineJoin};
use super::target::{
    Capability, ClipPath, ImagePaint, Paint, PathPaint, RenderTarget, StrokeStyle, TextRun,
};
use crate::geometry::{FillRule, Matrix, PathData, PathSegment};

/// Height of a greeked glyph bar, relative to the font size.
const GREEK_HEIGHT: f64 = 0.5;

/// A render target that rasterizes into a pixmap.
///
/// One target unit is one pixel. Text whose font has no usable outlines is
/// greeked: each glyph becomes a bar in the text colour.
pub struct RasterTarget {
    pixmap: Pixmap,
    clips: Vec<Option<Mask>>,
    images: HashMap<String, Pixmap>,
    warnings: Vec<RenderWarning>,
}

impl RasterTarget {
    /// A white surface. `None` if either dimension is zero.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        let mut target = Self::transparent(width, height)?;
        target.pixmap.fill(tiny_skia::Color::WHITE);
        Some(target)
    }

    /// A fully transparent surface.
    pub fn transparent(width: u32, height: u32) -> Option<Self> {
        Some(Self {
            pixmap: Pixmap::new(width, height)?,
            clips: Vec::new(),
            images: HashMap::new(),
            warnings: Vec::new(),
        })
    }

    fn mask(&self) -> Option<&Mask> {
        self.clips.last().and_then(Option::as_ref)
    }

    fn fill(&mut self, path: &tiny_skia::Path, paint: &Paint, rule: FillRule, m: &Matrix) {
        let paint = skia_paint(paint);
        let mask = self.clips.last().and_then(Option::as_ref);
        self.pixmap
            .fill_path(path, &paint, skia_rule(rule), transform(m), mask);
    }

    fn stroke(&mut self, path: &tiny_skia::Path, style: &StrokeStyle, width: f64, m: &Matrix) {
        let paint = skia_paint(&style.paint);
        let stroke = Stroke {
            width: width as f32,
            miter_limit: style.miter_limit as f32,
            line_cap: match style.cap {
                LineCap::Butt => tiny_skia::LineCap::Butt,
                LineCap::Round => tiny_skia::LineCap::Round,
                LineCap::Square => tiny_skia::LineCap::Square,
            },
            line_join: match style.join {
                LineJoin::Miter => tiny_skia::LineJoin::Miter,
                LineJoin::Round => tiny_skia::LineJoin::Round,
                LineJoin::Bevel => tiny_skia::LineJoin::Bevel,
            },
            dash: style.dash.as_ref().and_then(|dash| {
                let mut array: Vec<f32> = dash.array.iter().map(|v| *v as f32).collect();
                // An odd-length PDF dash array repeats to even length.
                if array.len() % 2 == 1 {
                    array.extend_from_within(..);
                }
                StrokeDash::new(array, dash.phase as f32)
            }),
        };
        let mask = self.clips.last().and_then(Option::as_ref);
        self.pixmap
            .stroke_path(path, &paint, &stroke, transform(m), mask);
    }

    fn image_pixmap(&mut self, paint: &ImagePaint<'_>) -> Option<Pixmap> {
        if let Some(pixmap) = paint.key.as_ref().and_then(|key| self.images.get(key)) {
            return Some(pixmap.clone());
        }
        let pixmap = paint
            .image
            .to_rgba()
            .and_then(|rgba| rgba_to_pixmap(&rgba).ok_or_else(|| "empty image".to_string()));
        match pixmap {
            Ok(pixmap) => {
                if let Some(key) = &paint.key {
                    self.images.insert(key.clone(), pixmap.clone());
                }
                Some(pixmap)
            }
            Err(e) => {
                self.warnings
                    .push(RenderWarning::new(WarningKind::Image, e));
                None
            }
        }
    }
}

impl RenderTarget for RasterTarget {
    type Output = Pixmap;

    fn capability(&self) -> Capability {
        Capability::Raster
    }

    fn surface_size(&self) -> (f64, f64) {
        (self.pixmap.width() as f64, self.pixmap.height() as f64)
    }

    fn push_clip(&mut self, clip: &ClipPath<'_>) {
        let mut mask = match self.mask() {
            Some(mask) => Some(mask.clone()),
            None => Mask::new(self.pixmap.width(), self.pixmap.height()).map(|mut mask| {
                mask.data_mut().fill(255);
                mask
            }),
        };
        if let Some(mask) = mask.as_mut() {
            match skia_path(clip.path) {
                Some(path) => {
                    mask.intersect_path(&path, skia_rule(clip.rule), true, transform(&clip.transform))
                }
                None => mask.data_mut().fill(0),
            }
        }
        self.clips.push(mask);
    }

    fn pop_clip(&mut self) {
        self.clips.pop();
    }

    fn paint_path(&mut self, paint: &PathPaint<'_>) {
        let Some(path) = skia_path(paint.path) else {
            return;
        };
        if let Some(fill) = &paint.fill {
            self.fill(&path, &fill.paint, fill.rule, &paint.transform);
        }
        if let Some(stroke) = &paint.stroke {
            self.stroke(&path, stroke, stroke.width, &paint.transform);
        }
    }

    fn paint_text(&mut self, run: &TextRun<'_>) {
        for glyph in run.glyphs {
            match &glyph.outline {
                Some(outline) => {
                    let Some(path) = skia_path(&outline.path) else {
                        continue;
                    };
                    let glyph_matrix = glyph.glyph_matrix(outline, run);
                    let m = glyph_matrix.then(&run.transform);
                    if let Some(fill) = &run.fill {
                        self.fill(&path, fill, FillRule::NonZero, &m);
                    }
                    if let Some(stroke) = &run.stroke {
                        let scale = glyph_matrix.expansion();
                        if scale > 0.0 {
                            self.stroke(&path, stroke, stroke.width / scale, &m);
                        }
                    }
                }
                None => {
                    if !glyph.is_inked() {
                        continue;
                    }
                    let bar = PathData::rect(
                        glyph.x,
                        glyph.y,
                        glyph.advance * 0.85,
                        run.font_size * GREEK_HEIGHT,
                    );
                    let Some(path) = skia_path(&bar) else {
                        continue;
                    };
                    let paint = run.fill.or_else(|| run.stroke.as_ref().map(|s| s.paint));
                    if let Some(paint) = paint {
                        self.fill(&path, &paint, FillRule::NonZero, &run.transform);
                    }
                }
            }
        }
    }

    fn paint_image(&mut self, paint: &ImagePaint<'_>) {
        let Some(image) = self.image_pixmap(paint) else {
            return;
        };
        let pixmap_paint = PixmapPaint {
            opacity: paint.alpha.clamp(0.0, 1.0) as f32,
            quality: FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };
        let m = paint.pixel_transform();
        let mask = self.clips.last().and_then(Option::as_ref);
        self.pixmap
            .draw_pixmap(0, 0, image.as_ref(), &pixmap_paint, transform(&m), mask);
    }

    fn drain_warnings(&mut self) -> Vec<RenderWarning> {
        std::mem::take(&mut self.warnings)
    }

    fn finalize(self) -> Pixmap {
        self.pixmap
    }
}

/// Straight-alpha pixels of a pixmap.
pub fn pixmap_to_rgba(pixmap: &Pixmap) -> RgbaImage {
    let mut image = RgbaImage::new(pixmap.width(), pixmap.height());
    for (out, px) in image.pixels_mut().zip(pixmap.pixels()) {
        let c = px.demultiply();
        *out = Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
    }
    image
}

/// Opaque pixels of a pixmap, composited over white.
pub fn pixmap_to_rgb(pixmap: &Pixmap) -> RgbImage {
    let mut image = RgbImage::new(pixmap.width(), pixmap.height());
    for (out, px) in image.pixels_mut().zip(pixmap.pixels()) {
        // Premultiplied: white contributes (255 - alpha) to each channel.
        let white = 255 - px.alpha();
        *out = RgbPixel([
            px.red().saturating_add(white),
            px.green().saturating_add(white),
            px.blue().saturating_add(white),
        ]);
    }
    image
}

fn rgba_to_pixmap(image: &RgbaImage) -> Option<Pixmap> {
    let size = IntSize::from_wh(image.width(), image.height())?;
    let mut data = Vec::with_capacity(image.as_raw().len());
    for px in image.pixels() {
        let [r, g, b, a] = px.0;
        let premultiply = |v: u8| ((v as u16 * a as u16 + 127) / 255) as u8;
        data.extend_from_slice(&[premultiply(r), premultiply(g), premultiply(b), a]);
    }
    Pixmap::from_vec(data, size)
}

fn skia_path(path: &PathData) -> Option<tiny_skia::Path> {
    let mut builder = PathBuilder::new();
    for segment in &path.segments {
        match *segment {
            PathSegment::MoveTo(p) => builder.move_to(p.x as f32, p.y as f32),
            PathSegment::LineTo(p) => builder.line_to(p.x as f32, p.y as f32),
            PathSegment::CurveTo(p1, p2, p3) => builder.cubic_to(
                p1.x as f32,
                p1.y as f32,
                p2.x as f32,
                p2.y as f32,
                p3.x as f32,
                p3.y as f32,
            ),
            PathSegment::Close => builder.close(),
        }
    }
    builder.finish()
}

fn skia_paint(paint: &Paint) -> SkiaPaint<'static> {
    let [r, g, b] = paint.color.to_u8();
    let alpha = (paint.alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
    let mut skia = SkiaPaint::default();
    skia.set_color_rgba8(r, g, b, alpha);
    skia.anti_alias = true;
    skia
}

fn skia_rule(rule: FillRule) -> SkiaFillRule {
    match rule {
        FillRule::NonZero => SkiaFillRule::Winding,
        FillRule::EvenOdd => SkiaFillRule::EvenOdd,
    }
}

fn transform(m: &Matrix) -> Transform {
    Transform::from_row(
        m.a as f32, m.b as f32, m.c as f32, m.d as f32, m.e as f32, m.f as f32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::state::Rgb;
    use crate::render::target::FillStyle;

    fn red_square(target: &mut RasterTarget) {
        let path = PathData::rect(2.0, 2.0, 4.0, 4.0);
        target.paint_path(&PathPaint {
            path: &path,
            transform: Matrix::IDENTITY,
            fill: Some(FillStyle {
                paint: Paint {
                    color: Rgb::new(1.0, 0.0, 0.0),
                    alpha: 1.0,
                },
                rule: FillRule::NonZero,
            }),
            stroke: None,
        });
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(RasterTarget::new(0, 10).is_none());
        assert!(RasterTarget::transparent(10, 0).is_none());
    }

    #[test]
    fn test_fill_path() {
        let mut target = RasterTarget::new(8, 8).unwrap();
        red_square(&mut target);
        let image = pixmap_to_rgb(&target.finalize());
        assert_eq!(image.get_pixel(4, 4).0, [255, 0, 0]);
        assert_eq!(image.get_pixel(0, 0).0, [255, 255, 255]);
    }

    #[test]
    fn test_clip_limits_painting() {
        let mut target = RasterTarget::new(8, 8).unwrap();
        let clip = PathData::rect(0.0, 0.0, 4.0, 8.0);
        target.push_clip(&ClipPath {
            path: &clip,
            transform: Matrix::IDENTITY,
            rule: FillRule::NonZero,
        });
        red_square(&mut target);
        target.pop_clip();
        let image = pixmap_to_rgb(&target.finalize());
        assert_eq!(image.get_pixel(3, 4).0, [255, 0, 0]);
        assert_eq!(image.get_pixel(5, 4).0, [255, 255, 255]);
    }

    #[test]
    fn test_empty_clip_hides_everything() {
        let mut target = RasterTarget::new(8, 8).unwrap();
        let empty = PathData::new();
        target.push_clip(&ClipPath {
            path: &empty,
            transform: Matrix::IDENTITY,
            rule: FillRule::NonZero,
        });
        red_square(&mut target);
        let image = pixmap_to_rgb(&target.finalize());
        assert_eq!(image.get_pixel(4, 4).0, [255, 255, 255]);
    }

    #[test]
    fn test_unknown_glyphs_are_greeked() {
        use crate::render::font::FontStyle;
        use crate::render::target::PositionedGlyph;

        let mut target = RasterTarget::new(40, 20).unwrap();
        let style = FontStyle::unresolved();
        let glyph = |x: f64, unicode: &str| PositionedGlyph {
            x,
            y: 0.0,
            advance: 12.0,
            unicode: unicode.to_string(),
            outline: None,
        };
        let glyphs = vec![glyph(2.0, ""), glyph(20.0, " ")];
        target.paint_text(&TextRun {
            glyphs: &glyphs,
            style: &style,
            resolved: true,
            font_size: 10.0,
            horizontal_scale: 1.0,
            transform: Matrix::new(1.0, 0.0, 0.0, -1.0, 0.0, 16.0),
            fill: Some(Paint {
                color: Rgb::new(0.0, 0.0, 0.0),
                alpha: 1.0,
            }),
            stroke: None,
        });
        let image = pixmap_to_rgb(&target.finalize());
        assert_eq!(image.get_pixel(6, 13).0, [0, 0, 0]);
        assert_eq!(image.get_pixel(25, 13).0, [255, 255, 255]);
    }

    #[test]
    fn test_transparent_round_trip() {
        let target = RasterTarget::transparent(2, 2).unwrap();
        let rgba = pixmap_to_rgba(&target.finalize());
        assert_eq!(rgba.get_pixel(1, 1).0[3], 0);
    }

    #[test]
    fn test_rgba_to_pixmap_premultiplies() {
        let mut image = RgbaImage::new(1, 1);
        image.put_pixel(0, 0, Rgba([200, 100, 0, 128]));
        let pixmap = rgba_to_pixmap(&image).unwrap();
        let px = pixmap.pixels()[0];
        assert_eq!(px.alpha(), 128);
        assert_eq!(px.red(), 100);
    }
}
