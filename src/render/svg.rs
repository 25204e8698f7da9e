//! SVG output.
//!
//! [`SvgTarget`] writes one standalone SVG 1.1 document. Ids are allocated
//! sequentially and numbers are printed with a fixed precision, so the same
//! page always serializes to the same bytes.

use std::collections::HashMap;
use std::fmt::Write as _;

use base64::Engine as _;

use super::image::encode_png;
use super::options::DEFAULT_FALLBACK_DPI;
use super::raster::{pixmap_to_rgba, RasterTarget};
use super::result::{RenderWarning, WarningKind};
use super::state::{LineCap, LineJoin};
use super::target::{
    Capability, ClipPath, ImagePaint, Paint, PathPaint, PositionedGlyph, RenderTarget,
    StrokeStyle, TextRun,
};
use crate::geometry::{FillRule, Matrix, PathData, PathSegment, Rect};

/// Largest side, in pixels, of a rasterized text fallback.
const MAX_FALLBACK_PIXELS: f64 = 4096.0;

/// A render target that builds an SVG document.
#[derive(Debug)]
pub struct SvgTarget {
    width: f64,
    height: f64,
    fallback_dpi: f64,
    defs: String,
    body: String,
    open_groups: usize,
    next_id: usize,
    glyph_ids: HashMap<(usize, u16), String>,
    image_ids: HashMap<String, String>,
    warnings: Vec<RenderWarning>,
}

impl SvgTarget {
    /// An empty drawing of `width x height` points on a white background.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            fallback_dpi: DEFAULT_FALLBACK_DPI,
            defs: String::new(),
            body: String::new(),
            open_groups: 0,
            next_id: 0,
            glyph_ids: HashMap::new(),
            image_ids: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Resolution used for content that has to be rasterized.
    pub fn with_fallback_resolution(mut self, dpi: f64) -> Self {
        if dpi.is_finite() && dpi > 0.0 {
            self.fallback_dpi = dpi;
        }
        self
    }

    fn allocate_id(&mut self, prefix: &str) -> String {
        let id = format!("{}{}", prefix, self.next_id);
        self.next_id += 1;
        id
    }

    fn warn(&mut self, kind: WarningKind, message: impl Into<String>) {
        self.warnings.push(RenderWarning::new(kind, message));
    }

    fn glyph_id(&mut self, key: (usize, u16), path: &PathData) -> String {
        if let Some(id) = self.glyph_ids.get(&key) {
            return id.clone();
        }
        let id = self.allocate_id("g");
        let _ = writeln!(self.defs, r#"<path id="{}" d="{}"/>"#, id, path_data(path));
        self.glyph_ids.insert(key, id.clone());
        id
    }

    /// Glyphs with outlines become `<use>` references to shared shapes.
    fn outline_glyphs(&mut self, run: &TextRun<'_>) {
        let glyphs: Vec<&PositionedGlyph> =
            run.glyphs.iter().filter(|g| g.outline.is_some()).collect();
        let Some(first) = glyphs.first().and_then(|g| g.outline.as_ref()) else {
            return;
        };
        let glyph_scale = glyphs[0].glyph_matrix(first, run).expansion();

        let mut attrs = fill_attrs(run.fill.as_ref(), FillRule::NonZero);
        if let Some(stroke) = &run.stroke {
            if glyph_scale > 0.0 {
                attrs.push_str(&stroke_attrs(stroke, stroke.width / glyph_scale));
            }
        }
        let _ = writeln!(self.body, "<g{}>", attrs);
        for glyph in glyphs {
            let Some(outline) = &glyph.outline else {
                continue;
            };
            let id = self.glyph_id(outline.key, &outline.path);
            let m = glyph.glyph_matrix(outline, run).then(&run.transform);
            let _ = writeln!(
                self.body,
                r##"<use xlink:href="#{}" transform="{}"/>"##,
                id,
                matrix(&m)
            );
        }
        self.body.push_str("</g>\n");
    }

    /// Glyphs without outlines become a `<text>` element.
    fn text_glyphs(&mut self, run: &TextRun<'_>) {
        let th = if run.horizontal_scale.abs() > f64::EPSILON {
            run.horizontal_scale
        } else {
            1.0
        };
        let mut content = String::new();
        let mut xs = Vec::new();
        let rise = run
            .glyphs
            .iter()
            .find(|g| g.outline.is_none())
            .map_or(0.0, |g| g.y);
        for glyph in run.glyphs.iter().filter(|g| g.outline.is_none()) {
            let chars: Vec<char> = glyph.unicode.chars().filter(|c| !c.is_control()).collect();
            for (i, ch) in chars.iter().enumerate() {
                let offset = glyph.advance * i as f64 / chars.len() as f64;
                xs.push(num((glyph.x + offset) / th));
                escape_into(&mut content, *ch);
            }
        }
        if content.trim().is_empty() {
            return;
        }

        let m = Matrix::scale(th, -1.0).then(&run.transform);
        let mut attrs = fill_attrs(run.fill.as_ref(), FillRule::NonZero);
        if let Some(stroke) = &run.stroke {
            attrs.push_str(&stroke_attrs(stroke, stroke.width));
        }
        let style = run.style;
        let family = if style.family.is_empty() {
            style.generic.to_string()
        } else {
            format!("'{}', {}", escape(&style.family), style.generic)
        };
        let _ = write!(
            self.body,
            r#"<text xml:space="preserve" transform="{}" x="{}" y="{}" font-family="{}" font-size="{}""#,
            matrix(&m),
            xs.join(" "),
            num(-rise),
            family,
            num(run.font_size)
        );
        if style.bold {
            self.body.push_str(r#" font-weight="bold""#);
        }
        if style.italic {
            self.body.push_str(r#" font-style="italic""#);
        }
        let _ = writeln!(self.body, "{}>{}</text>", attrs, content);
    }

    /// Draw a run as placeholder bars in an embedded PNG, warning with
    /// `reason` when given. The text itself is not recoverable from the image.
    fn rasterize_run(&mut self, run: &TextRun<'_>, reason: Option<&str>) {
        let Some(bounds) = run_bounds(run) else {
            return;
        };
        let scale = self.fallback_dpi / 72.0;
        let px_w = (bounds.width() * scale).ceil().clamp(1.0, MAX_FALLBACK_PIXELS);
        let px_h = (bounds.height() * scale).ceil().clamp(1.0, MAX_FALLBACK_PIXELS);
        let Some(mut raster) = RasterTarget::transparent(px_w as u32, px_h as u32) else {
            return;
        };

        let to_pixels = Matrix::translate(-bounds.x0, -bounds.y0)
            .then(&Matrix::scale(px_w / bounds.width(), px_h / bounds.height()));
        let pixel_run = TextRun {
            transform: run.transform.then(&to_pixels),
            ..run.clone()
        };
        raster.paint_text(&pixel_run);
        let rgba = pixmap_to_rgba(&raster.finalize());

        match encode_png(&rgba) {
            Ok(png) => {
                let _ = writeln!(
                    self.body,
                    r#"<image x="{}" y="{}" width="{}" height="{}" preserveAspectRatio="none" xlink:href="data:image/png;base64,{}"/>"#,
                    num(bounds.x0),
                    num(bounds.y0),
                    num(bounds.width()),
                    num(bounds.height()),
                    base64::engine::general_purpose::STANDARD.encode(png)
                );
                if let Some(reason) = reason {
                    self.warn(
                        WarningKind::Font,
                        format!("{} replaced by placeholder bars", reason),
                    );
                }
            }
            Err(e) => self.warn(WarningKind::Font, format!("text fallback failed: {}", e)),
        }
    }
}

impl RenderTarget for SvgTarget {
    type Output = String;

    fn capability(&self) -> Capability {
        Capability::Vector
    }

    fn surface_size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    fn push_clip(&mut self, clip: &ClipPath<'_>) {
        let id = self.allocate_id("c");
        let rule = match clip.rule {
            FillRule::NonZero => "",
            FillRule::EvenOdd => r#" clip-rule="evenodd""#,
        };
        let _ = writeln!(
            self.defs,
            r#"<clipPath id="{}"><path d="{}" transform="{}"{}/></clipPath>"#,
            id,
            path_data(clip.path),
            matrix(&clip.transform),
            rule
        );
        let _ = writeln!(self.body, r#"<g clip-path="url(#{})">"#, id);
        self.open_groups += 1;
    }

    fn pop_clip(&mut self) {
        if self.open_groups > 0 {
            self.body.push_str("</g>\n");
            self.open_groups -= 1;
        }
    }

    fn paint_path(&mut self, paint: &PathPaint<'_>) {
        let d = path_data(paint.path);
        if d.is_empty() {
            return;
        }
        let mut attrs = match &paint.fill {
            Some(fill) => fill_attrs(Some(&fill.paint), fill.rule),
            None => fill_attrs(None, FillRule::NonZero),
        };
        if let Some(stroke) = &paint.stroke {
            attrs.push_str(&stroke_attrs(stroke, stroke.width));
        }
        let _ = writeln!(
            self.body,
            r#"<path d="{}" transform="{}"{}/>"#,
            d,
            matrix(&paint.transform),
            attrs
        );
    }

    fn paint_text(&mut self, run: &TextRun<'_>) {
        if !run.resolved {
            self.rasterize_run(run, Some("text with an unresolved font"));
            return;
        }
        self.outline_glyphs(run);
        self.text_glyphs(run);

        // The interpreter already reported these glyphs.
        let blind: Vec<PositionedGlyph> =
            run.glyphs.iter().filter(|g| g.is_blind()).cloned().collect();
        if !blind.is_empty() {
            let placeholders = TextRun {
                glyphs: &blind,
                ..run.clone()
            };
            self.rasterize_run(&placeholders, None);
        }
    }

    fn paint_image(&mut self, paint: &ImagePaint<'_>) {
        let opacity = if paint.alpha < 1.0 {
            format!(r#" opacity="{}""#, num(paint.alpha.max(0.0)))
        } else {
            String::new()
        };
        let transform = matrix(&paint.pixel_transform());

        let known = paint.key.as_ref().and_then(|key| self.image_ids.get(key)).cloned();
        let id = match known {
            Some(id) => id,
            None => {
                let uri = match paint.image.to_data_uri() {
                    Ok(uri) => uri,
                    Err(e) => {
                        self.warn(WarningKind::Image, format!("image not embedded: {}", e));
                        return;
                    }
                };
                let id = self.allocate_id("i");
                let _ = writeln!(
                    self.defs,
                    r#"<image id="{}" width="{}" height="{}" preserveAspectRatio="none" xlink:href="{}"/>"#,
                    id, paint.image.width, paint.image.height, uri
                );
                if let Some(key) = &paint.key {
                    self.image_ids.insert(key.clone(), id.clone());
                }
                id
            }
        };
        let _ = writeln!(
            self.body,
            r##"<use xlink:href="#{}" transform="{}"{}/>"##,
            id, transform, opacity
        );
    }

    fn drain_warnings(&mut self) -> Vec<RenderWarning> {
        std::mem::take(&mut self.warnings)
    }

    fn finalize(mut self) -> String {
        while self.open_groups > 0 {
            self.pop_clip();
        }
        let (w, h) = (num(self.width), num(self.height));
        let mut out = String::with_capacity(self.defs.len() + self.body.len() + 512);
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let _ = writeln!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" version="1.1" width="{w}pt" height="{h}pt" viewBox="0 0 {w} {h}">"#
        );
        if !self.defs.is_empty() {
            out.push_str("<defs>\n");
            out.push_str(&self.defs);
            out.push_str("</defs>\n");
        }
        let _ = writeln!(out, r#"<rect width="{w}" height="{h}" fill="white"/>"#);
        out.push_str(&self.body);
        out.push_str("</svg>\n");
        out
    }
}

/// Target-space bounds of the cells of a text run.
fn run_bounds(run: &TextRun<'_>) -> Option<Rect> {
    let mut bounds: Option<Rect> = None;
    for glyph in run.glyphs {
        if !glyph.is_inked() {
            continue;
        }
        let cell = Rect::new(
            glyph.x,
            glyph.y - 0.25 * run.font_size,
            glyph.x + glyph.advance,
            glyph.y + run.font_size,
        )
        .transform(&run.transform);
        bounds = Some(match bounds {
            Some(b) => Rect::new(
                b.x0.min(cell.x0),
                b.y0.min(cell.y0),
                b.x1.max(cell.x1),
                b.y1.max(cell.y1),
            ),
            None => cell,
        });
    }
    bounds.filter(|b| !b.is_empty() && b.x0.is_finite() && b.y1.is_finite())
}

fn fill_attrs(paint: Option<&Paint>, rule: FillRule) -> String {
    let Some(paint) = paint else {
        return r#" fill="none""#.to_string();
    };
    let mut attrs = format!(r#" fill="{}""#, paint.color.to_hex());
    if rule == FillRule::EvenOdd {
        attrs.push_str(r#" fill-rule="evenodd""#);
    }
    if paint.alpha < 1.0 {
        let _ = write!(attrs, r#" fill-opacity="{}""#, num(paint.alpha.max(0.0)));
    }
    attrs
}

fn stroke_attrs(stroke: &StrokeStyle, width: f64) -> String {
    let mut attrs = format!(
        r#" stroke="{}" stroke-width="{}""#,
        stroke.paint.color.to_hex(),
        num_precise(width)
    );
    if stroke.paint.alpha < 1.0 {
        let _ = write!(
            attrs,
            r#" stroke-opacity="{}""#,
            num(stroke.paint.alpha.max(0.0))
        );
    }
    match stroke.cap {
        LineCap::Butt => {}
        LineCap::Round => attrs.push_str(r#" stroke-linecap="round""#),
        LineCap::Square => attrs.push_str(r#" stroke-linecap="square""#),
    }
    match stroke.join {
        LineJoin::Miter => {
            if (stroke.miter_limit - 4.0).abs() > f64::EPSILON && stroke.miter_limit >= 1.0 {
                let _ = write!(attrs, r#" stroke-miterlimit="{}""#, num(stroke.miter_limit));
            }
        }
        LineJoin::Round => attrs.push_str(r#" stroke-linejoin="round""#),
        LineJoin::Bevel => attrs.push_str(r#" stroke-linejoin="bevel""#),
    }
    if let Some(dash) = &stroke.dash {
        let array: Vec<String> = dash.array.iter().map(|v| num_precise(*v)).collect();
        let _ = write!(attrs, r#" stroke-dasharray="{}""#, array.join(" "));
        if dash.phase != 0.0 {
            let _ = write!(attrs, r#" stroke-dashoffset="{}""#, num_precise(dash.phase));
        }
    }
    attrs
}

fn path_data(path: &PathData) -> String {
    let mut d = String::new();
    for segment in &path.segments {
        if !d.is_empty() {
            d.push(' ');
        }
        match segment {
            PathSegment::MoveTo(p) => {
                let _ = write!(d, "M{} {}", num(p.x), num(p.y));
            }
            PathSegment::LineTo(p) => {
                let _ = write!(d, "L{} {}", num(p.x), num(p.y));
            }
            PathSegment::CurveTo(p1, p2, p3) => {
                let _ = write!(
                    d,
                    "C{} {} {} {} {} {}",
                    num(p1.x),
                    num(p1.y),
                    num(p2.x),
                    num(p2.y),
                    num(p3.x),
                    num(p3.y)
                );
            }
            PathSegment::Close => d.push('Z'),
        }
    }
    d
}

fn matrix(m: &Matrix) -> String {
    format!(
        "matrix({} {} {} {} {} {})",
        num_precise(m.a),
        num_precise(m.b),
        num_precise(m.c),
        num_precise(m.d),
        num(m.e),
        num(m.f)
    )
}

/// Coordinates: three decimals.
fn num(v: f64) -> String {
    fixed(v, 3)
}

/// Matrix coefficients and small lengths: six decimals.
fn num_precise(v: f64) -> String {
    fixed(v, 6)
}

fn fixed(v: f64, decimals: usize) -> String {
    if !v.is_finite() {
        return "0".to_string();
    }
    let s = format!("{:.*}", decimals, v);
    let s = if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s.as_str()
    };
    match s {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}

fn escape_into(out: &mut String, ch: char) {
    match ch {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '"' => out.push_str("&quot;"),
        '\'' => out.push_str("&apos;"),
        c => out.push(c),
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        escape_into(&mut out, ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::font::FontStyle;
    use crate::render::image::{DecodedImage, ImageData};
    use crate::render::state::Rgb;
    use crate::render::target::FillStyle;

    fn black() -> Paint {
        Paint {
            color: Rgb::BLACK,
            alpha: 1.0,
        }
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(num(1.0), "1");
        assert_eq!(num(0.1234), "0.123");
        assert_eq!(num(-0.0001), "0");
        assert_eq!(num(12.5), "12.5");
        assert_eq!(num_precise(0.0000015), "0.000002");
        assert_eq!(num(f64::NAN), "0");
    }

    #[test]
    fn test_empty_document() {
        let svg = SvgTarget::new(612.0, 792.0).finalize();
        assert!(svg.contains(r#"width="612pt""#));
        assert!(svg.contains(r#"viewBox="0 0 612 792""#));
        assert!(svg.contains(r#"fill="white""#));
        assert!(!svg.contains("<defs>"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn test_path_and_clip() {
        let mut target = SvgTarget::new(100.0, 100.0);
        let clip = PathData::rect(0.0, 0.0, 50.0, 50.0);
        target.push_clip(&ClipPath {
            path: &clip,
            transform: Matrix::IDENTITY,
            rule: FillRule::EvenOdd,
        });
        let path = PathData::rect(10.0, 10.0, 20.0, 20.0);
        target.paint_path(&PathPaint {
            path: &path,
            transform: Matrix::IDENTITY,
            fill: Some(FillStyle {
                paint: Paint {
                    color: Rgb::new(1.0, 0.0, 0.0),
                    alpha: 0.5,
                },
                rule: FillRule::NonZero,
            }),
            stroke: None,
        });
        let svg = target.finalize();
        assert!(svg.contains(r#"<clipPath id="c0">"#));
        assert!(svg.contains(r#"clip-rule="evenodd""#));
        assert!(svg.contains(r#"<g clip-path="url(#c0)">"#));
        assert!(svg.contains(r#"d="M10 10 L30 10 L30 30 L10 30 Z""#));
        assert!(svg.contains(r##"fill="#ff0000" fill-opacity="0.5""##));
        // The open clip group is closed on finalize.
        assert_eq!(svg.matches("<g ").count(), svg.matches("</g>").count());
    }

    #[test]
    fn test_output_is_deterministic() {
        let draw = || {
            let mut target = SvgTarget::new(10.0, 10.0);
            let path = PathData::rect(1.0, 1.0, 2.0, 2.0);
            target.paint_path(&PathPaint {
                path: &path,
                transform: Matrix::new(0.5, 0.0, 0.0, -0.5, 1.0, 9.0),
                fill: None,
                stroke: Some(StrokeStyle {
                    paint: black(),
                    width: 1.0,
                    cap: LineCap::Round,
                    join: LineJoin::Bevel,
                    miter_limit: 10.0,
                    dash: None,
                }),
            });
            target.finalize()
        };
        let svg = draw();
        assert_eq!(svg, draw());
        assert!(svg.contains(r#"fill="none""#));
        assert!(svg.contains(r#"stroke-linecap="round""#));
        assert!(svg.contains("matrix(0.5 0 0 -0.5 1 9)"));
    }

    #[test]
    fn test_text_without_outlines() {
        let mut target = SvgTarget::new(100.0, 100.0);
        let style = FontStyle::from_base_font("ABCDEF+Helvetica-Bold", 0);
        let glyphs = vec![
            PositionedGlyph {
                x: 0.0,
                y: 0.0,
                advance: 6.0,
                unicode: "A".into(),
                outline: None,
            },
            PositionedGlyph {
                x: 6.0,
                y: 0.0,
                advance: 6.0,
                unicode: "<".into(),
                outline: None,
            },
        ];
        target.paint_text(&TextRun {
            glyphs: &glyphs,
            style: &style,
            resolved: true,
            font_size: 12.0,
            horizontal_scale: 1.0,
            transform: Matrix::IDENTITY,
            fill: Some(black()),
            stroke: None,
        });
        let svg = target.finalize();
        assert!(svg.contains(r#"x="0 6""#));
        assert!(svg.contains("A&lt;</text>"));
        assert!(svg.contains("font-family=\"'Helvetica', sans-serif\""));
        assert!(svg.contains(r#"font-weight="bold""#));
    }

    #[test]
    fn test_unresolved_font_is_rasterized() {
        let mut target = SvgTarget::new(100.0, 100.0);
        let style = FontStyle::unresolved();
        let glyphs = vec![PositionedGlyph {
            x: 0.0,
            y: 0.0,
            advance: 6.0,
            unicode: "A".into(),
            outline: None,
        }];
        target.paint_text(&TextRun {
            glyphs: &glyphs,
            style: &style,
            resolved: false,
            font_size: 12.0,
            horizontal_scale: 1.0,
            transform: Matrix::new(1.0, 0.0, 0.0, -1.0, 10.0, 50.0),
            fill: Some(black()),
            stroke: None,
        });
        let warnings = target.drain_warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::Font);
        assert!(warnings[0].message.contains("placeholder bars"));
        let svg = target.finalize();
        assert!(svg.contains("data:image/png;base64,"));
        assert!(!svg.contains("<text"));
    }

    #[test]
    fn test_glyphs_without_shape_or_text_get_placeholders() {
        let mut target = SvgTarget::new(100.0, 100.0);
        let style = FontStyle::from_base_font("KozMinPro-Regular", 0);
        let glyphs: Vec<PositionedGlyph> = (0..2)
            .map(|i| PositionedGlyph {
                x: i as f64 * 12.0,
                y: 0.0,
                advance: 12.0,
                unicode: String::new(),
                outline: None,
            })
            .collect();
        target.paint_text(&TextRun {
            glyphs: &glyphs,
            style: &style,
            resolved: true,
            font_size: 12.0,
            horizontal_scale: 1.0,
            transform: Matrix::new(1.0, 0.0, 0.0, -1.0, 10.0, 50.0),
            fill: Some(black()),
            stroke: None,
        });
        let svg = target.finalize();
        assert_eq!(svg.matches("data:image/png;base64,").count(), 1);
        assert!(!svg.contains("<text"));
    }

    #[test]
    fn test_images_are_defined_once() {
        let mut target = SvgTarget::new(100.0, 100.0);
        let image = DecodedImage {
            width: 2,
            height: 2,
            data: ImageData::Jpeg(vec![0xFF, 0xD8, 0xFF, 0xD9]),
        };
        for _ in 0..2 {
            target.paint_image(&ImagePaint {
                image: &image,
                key: Some("7-0".into()),
                transform: Matrix::new(50.0, 0.0, 0.0, -50.0, 0.0, 50.0),
                alpha: 1.0,
            });
        }
        let svg = target.finalize();
        assert_eq!(svg.matches("<image ").count(), 1);
        assert_eq!(svg.matches(r##"<use xlink:href="#i0""##).count(), 2);
        assert!(svg.contains("data:image/jpeg;base64,/9j/2Q=="));
    }
}
