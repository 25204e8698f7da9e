//! Content stream interpretation.
//!
//! [`PageRenderer`] decodes a page's content stream with lopdf and replays
//! the painting operators onto any [`RenderTarget`]. Problems confined to a
//! sub-object (a broken image, a missing resource, an unsupported shading)
//! are skipped and recorded; only an unreadable content stream fails the
//! page.

use std::collections::HashMap;
use std::rc::Rc;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId};

use super::font::{Font, FontStyle, DEFAULT_ADVANCE};
use super::image::{decode_image, DecodedImage};
use super::options::{RenderOptions, RenderScale};
use super::result::{RenderResult, WarningKind, WarningLog};
use super::state::{ColorSpace, DashPattern, GraphicsState, LineCap, LineJoin};
use super::target::{
    ClipPath, FillStyle, GlyphOutline, ImagePaint, Paint, PathPaint, PositionedGlyph,
    RenderTarget, StrokeStyle, TextRun,
};
use crate::error::RenderError;
use crate::geometry::{FillRule, Matrix, PathData};
use crate::model::Page;
use crate::parser::objects;

/// Renders pages onto render targets.
#[derive(Debug, Clone, Default)]
pub struct PageRenderer {
    options: RenderOptions,
}

impl PageRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Paint `page` onto `target`.
    ///
    /// The page is scaled by `scale` and centered on the target's surface.
    /// The target is consumed: it is finalized on success and dropped on
    /// failure.
    pub fn render<T: RenderTarget>(
        &self,
        page: &Page<'_>,
        mut target: T,
        scale: RenderScale,
    ) -> RenderResult<T::Output> {
        let Some(factor) = scale.factor_for(page.width(), page.height()) else {
            return RenderResult::Failed(RenderError::UnsupportedContent(format!(
                "page {} has no usable size",
                page.index()
            )));
        };

        let doc = page.document().raw();
        let data = match page_content(doc, page.id()) {
            Ok(data) => data,
            Err(e) => return RenderResult::Failed(RenderError::CorruptContentStream(e)),
        };
        let content = match Content::decode(&data) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("Page {}: content stream undecodable: {}", page.index(), e);
                return RenderResult::Failed(RenderError::CorruptContentStream(e.to_string()));
            }
        };

        let (surface_w, surface_h) = target.surface_size();
        let offset_x = (surface_w - page.width() * factor) / 2.0;
        let offset_y = (surface_h - page.height() * factor) / 2.0;
        let geometry = page.geometry();
        let device = geometry
            .base_transform()
            .then(&Matrix::scale(factor, factor))
            .then(&Matrix::translate(offset_x, offset_y));

        let resources = objects::get_inherited(doc, page.id(), b"Resources")
            .and_then(|obj| obj.as_dict().ok());

        let mut warnings = {
            let mut interpreter = Interpreter::new(doc, &mut target, &self.options, device);
            let visible = geometry.visible_box;
            let page_clip = PathData::rect(visible.x0, visible.y0, visible.width(), visible.height());
            interpreter.clip_to(&page_clip, FillRule::NonZero);
            interpreter.run(&content.operations, resources);
            interpreter.finish()
        };
        warnings.extend(target.drain_warnings());

        let warnings = warnings.into_vec();
        if !warnings.is_empty() {
            log::debug!(
                "Page {} rendered with {} warnings",
                page.index(),
                warnings.len()
            );
        }
        RenderResult::from_parts(target.finalize(), warnings)
    }
}

/// Render with default options.
pub fn render<T: RenderTarget>(
    page: &Page<'_>,
    target: T,
    scale: RenderScale,
) -> RenderResult<T::Output> {
    PageRenderer::default().render(page, target, scale)
}

/// Concatenated, decoded `/Contents` of a page.
fn page_content(doc: &LopdfDocument, page_id: ObjectId) -> Result<Vec<u8>, String> {
    let page = doc.get_dictionary(page_id).map_err(|e| e.to_string())?;
    let Ok(contents) = page.get(b"Contents") else {
        return Ok(Vec::new());
    };
    let contents = objects::resolve(doc, contents).ok_or("page contents unresolvable")?;
    match contents {
        Object::Stream(stream) => objects::stream_data(stream),
        Object::Array(parts) => {
            let mut data = Vec::new();
            for part in parts {
                match objects::resolve(doc, part) {
                    Some(Object::Stream(stream)) => {
                        data.extend_from_slice(&objects::stream_data(stream)?);
                        data.push(b'\n');
                    }
                    Some(Object::Null) => {}
                    _ => return Err("page contents array holds a non-stream".to_string()),
                }
            }
            Ok(data)
        }
        Object::Null => Ok(Vec::new()),
        _ => Err("page contents is not a stream".to_string()),
    }
}

/// One element of a show-text operation.
enum TextItem<'o> {
    Text(&'o [u8]),
    Adjust(f64),
}

type ImageCacheKey = (ObjectId, Option<[u8; 3]>);

struct Interpreter<'a, 't, T: RenderTarget> {
    doc: &'a LopdfDocument,
    target: &'t mut T,
    options: &'t RenderOptions,
    state: GraphicsState<'a>,
    stack: Vec<GraphicsState<'a>>,
    resources: Option<&'a Dictionary>,
    path: PathData,
    pending_clip: Option<FillRule>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    fonts: HashMap<ObjectId, Rc<Font<'a>>>,
    next_font_serial: usize,
    images: HashMap<ImageCacheKey, Rc<DecodedImage>>,
    unresolved_style: FontStyle,
    form_depth: usize,
    warnings: WarningLog,
}

impl<'a, 't, T: RenderTarget> Interpreter<'a, 't, T> {
    fn new(
        doc: &'a LopdfDocument,
        target: &'t mut T,
        options: &'t RenderOptions,
        device: Matrix,
    ) -> Self {
        Self {
            doc,
            target,
            options,
            state: GraphicsState::new(device),
            stack: Vec::new(),
            resources: None,
            path: PathData::new(),
            pending_clip: None,
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            fonts: HashMap::new(),
            next_font_serial: 0,
            images: HashMap::new(),
            unresolved_style: FontStyle::unresolved(),
            form_depth: 0,
            warnings: WarningLog::default(),
        }
    }

    /// Unwind all saved states and hand back the collected warnings.
    fn finish(mut self) -> WarningLog {
        while !self.stack.is_empty() {
            self.restore();
        }
        for _ in 0..self.state.clip_depth {
            self.target.pop_clip();
        }
        self.warnings
    }

    fn run(&mut self, operations: &[Operation], resources: Option<&'a Dictionary>) {
        let saved = std::mem::replace(&mut self.resources, resources);
        for op in operations {
            if self.apply(op).is_none() {
                self.warnings.warn(
                    WarningKind::Operator,
                    format!("operator '{}' has invalid operands", op.operator),
                );
            }
        }
        self.resources = saved;
    }

    /// Execute one operator. `None` means its operands were unusable.
    fn apply(&mut self, op: &Operation) -> Option<()> {
        let operands = op.operands.as_slice();
        match op.operator.as_str() {
            // Graphics state
            "q" => self.save(),
            "Q" => {
                if !self.stack.is_empty() {
                    self.restore();
                }
            }
            "cm" => {
                let m = Matrix::from_slice(&numbers(operands)?).filter(Matrix::is_finite)?;
                self.state.ctm = m.then(&self.state.ctm);
            }
            "w" => self.state.line_width = number(operands, 0)?,
            "J" => self.state.line_cap = LineCap::from_pdf(number(operands, 0)? as i64),
            "j" => self.state.line_join = LineJoin::from_pdf(number(operands, 0)? as i64),
            "M" => self.state.miter_limit = number(operands, 0)?,
            "d" => {
                let array = operands.first()?.as_array().ok()?;
                let array = objects::numbers(self.doc, array)?;
                let phase = number(operands, 1).unwrap_or(0.0);
                self.state.dash = DashPattern::new(array, phase);
            }
            "gs" => self.set_ext_gstate(operands.first()?.as_name().ok()?),
            "ri" | "i" => {}

            // Path construction
            "m" => {
                let [x, y] = fixed::<2>(operands)?;
                self.path.move_to(x, y);
            }
            "l" => {
                let [x, y] = fixed::<2>(operands)?;
                self.path.line_to(x, y);
            }
            "c" => {
                let [x1, y1, x2, y2, x3, y3] = fixed::<6>(operands)?;
                self.path.curve_to(x1, y1, x2, y2, x3, y3);
            }
            "v" => {
                let [x2, y2, x3, y3] = fixed::<4>(operands)?;
                let current = self.path.current_point()?;
                self.path.curve_to(current.x, current.y, x2, y2, x3, y3);
            }
            "y" => {
                let [x1, y1, x3, y3] = fixed::<4>(operands)?;
                self.path.curve_to(x1, y1, x3, y3, x3, y3);
            }
            "h" => self.path.close(),
            "re" => {
                let [x, y, w, h] = fixed::<4>(operands)?;
                let rect = PathData::rect(x, y, w, h);
                self.path.segments.extend(rect.segments);
            }

            // Path painting
            "S" => self.paint(None, true),
            "s" => {
                self.path.close();
                self.paint(None, true);
            }
            "f" | "F" => self.paint(Some(FillRule::NonZero), false),
            "f*" => self.paint(Some(FillRule::EvenOdd), false),
            "B" => self.paint(Some(FillRule::NonZero), true),
            "B*" => self.paint(Some(FillRule::EvenOdd), true),
            "b" => {
                self.path.close();
                self.paint(Some(FillRule::NonZero), true);
            }
            "b*" => {
                self.path.close();
                self.paint(Some(FillRule::EvenOdd), true);
            }
            "n" => self.paint(None, false),
            "W" => self.pending_clip = Some(FillRule::NonZero),
            "W*" => self.pending_clip = Some(FillRule::EvenOdd),

            // Colour
            "g" | "G" | "rg" | "RG" | "k" | "K" => {
                let space = match op.operator.as_str() {
                    "g" | "G" => ColorSpace::DeviceGray,
                    "rg" | "RG" => ColorSpace::DeviceRgb,
                    _ => ColorSpace::DeviceCmyk,
                };
                let comps = numbers(operands)?;
                if comps.len() < space.components() {
                    return None;
                }
                let color = space.to_rgb(&comps);
                if op.operator.chars().all(|c| c.is_ascii_lowercase()) {
                    self.state.fill_space = space;
                    self.state.fill_color = color;
                } else {
                    self.state.stroke_space = space;
                    self.state.stroke_color = color;
                }
            }
            "cs" | "CS" => {
                let space = match ColorSpace::from_object(self.doc, operands.first()?, self.resources)
                {
                    Ok(space) => space,
                    Err(e) => {
                        self.warnings.warn(WarningKind::Unsupported, e);
                        ColorSpace::DeviceGray
                    }
                };
                let color = space.to_rgb(&space.initial_color());
                if op.operator == "cs" {
                    self.state.fill_space = space;
                    self.state.fill_color = color;
                } else {
                    self.state.stroke_space = space;
                    self.state.stroke_color = color;
                }
            }
            "sc" | "scn" | "SC" | "SCN" => {
                let fill = op.operator.starts_with('s');
                let space = if fill {
                    &self.state.fill_space
                } else {
                    &self.state.stroke_space
                };
                if *space == ColorSpace::Pattern {
                    return Some(());
                }
                let comps: Vec<f64> = operands.iter().filter_map(objects::number).collect();
                if comps.is_empty() {
                    return None;
                }
                let color = space.to_rgb(&comps);
                if fill {
                    self.state.fill_color = color;
                } else {
                    self.state.stroke_color = color;
                }
            }

            // Text objects and state
            "BT" => {
                self.text_matrix = Matrix::IDENTITY;
                self.line_matrix = Matrix::IDENTITY;
            }
            "ET" => {}
            "Tc" => self.state.text.char_spacing = number(operands, 0)?,
            "Tw" => self.state.text.word_spacing = number(operands, 0)?,
            "Tz" => self.state.text.horizontal_scale = number(operands, 0)? / 100.0,
            "TL" => self.state.text.leading = number(operands, 0)?,
            "Ts" => self.state.text.rise = number(operands, 0)?,
            "Tr" => self.state.text.render_mode = number(operands, 0)? as i64,
            "Tf" => {
                let name = operands.first()?.as_name().ok()?;
                self.state.text.font_size = number(operands, 1)?;
                self.state.text.font = self.font(name);
            }
            "Td" => {
                let [tx, ty] = fixed::<2>(operands)?;
                self.next_line(tx, ty);
            }
            "TD" => {
                let [tx, ty] = fixed::<2>(operands)?;
                self.state.text.leading = -ty;
                self.next_line(tx, ty);
            }
            "Tm" => {
                let m = Matrix::from_slice(&numbers(operands)?).filter(Matrix::is_finite)?;
                self.text_matrix = m;
                self.line_matrix = m;
            }
            "T*" => self.next_line(0.0, -self.state.text.leading),
            "Tj" => {
                let text = string(operands.first()?)?;
                self.show_text(&[TextItem::Text(text)]);
            }
            "'" => {
                let text = string(operands.first()?)?;
                self.next_line(0.0, -self.state.text.leading);
                self.show_text(&[TextItem::Text(text)]);
            }
            "\"" => {
                let [aw, ac] = fixed::<2>(operands)?;
                let text = string(operands.get(2)?)?;
                self.state.text.word_spacing = aw;
                self.state.text.char_spacing = ac;
                self.next_line(0.0, -self.state.text.leading);
                self.show_text(&[TextItem::Text(text)]);
            }
            "TJ" => {
                let items: Vec<TextItem<'_>> = operands
                    .first()?
                    .as_array()
                    .ok()?
                    .iter()
                    .filter_map(|item| match item {
                        Object::String(bytes, _) => Some(TextItem::Text(bytes.as_slice())),
                        other => objects::number(other).map(TextItem::Adjust),
                    })
                    .collect();
                self.show_text(&items);
            }

            // XObjects, shadings, inline images
            "Do" => self.do_xobject(operands.first()?.as_name().ok()?),
            "sh" => self
                .warnings
                .warn(WarningKind::Unsupported, "shading fills are not rendered"),
            "BI" | "ID" | "EI" => self
                .warnings
                .warn(WarningKind::Unsupported, "inline images are not rendered"),

            // Marked content, compatibility and Type 3 glyph metrics
            "BMC" | "BDC" | "EMC" | "MP" | "DP" | "BX" | "EX" | "d0" | "d1" => {}

            other => log::debug!("Skipping unknown operator '{}'", other),
        }
        Some(())
    }

    fn save(&mut self) {
        self.stack.push(self.state.clone());
        self.state.clip_depth = 0;
    }

    fn restore(&mut self) {
        for _ in 0..self.state.clip_depth {
            self.target.pop_clip();
        }
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
    }

    fn clip_to(&mut self, path: &PathData, rule: FillRule) {
        self.target.push_clip(&ClipPath {
            path,
            transform: self.state.ctm,
            rule,
        });
        self.state.clip_depth += 1;
    }

    fn paint(&mut self, fill: Option<FillRule>, stroke: bool) {
        if !self.path.is_empty() {
            let fill = fill.and_then(|rule| {
                if self.state.fill_is_pattern() {
                    self.warnings
                        .warn(WarningKind::Unsupported, "pattern fills are not rendered");
                    return None;
                }
                Some(FillStyle {
                    paint: Paint {
                        color: self.state.fill_color,
                        alpha: self.state.fill_alpha,
                    },
                    rule,
                })
            });
            let stroke = if stroke && self.state.stroke_is_pattern() {
                self.warnings
                    .warn(WarningKind::Unsupported, "pattern strokes are not rendered");
                None
            } else if stroke {
                Some(self.stroke_style())
            } else {
                None
            };
            if fill.is_some() || stroke.is_some() {
                self.target.paint_path(&PathPaint {
                    path: &self.path,
                    transform: self.state.ctm,
                    fill,
                    stroke,
                });
            }
        }

        if let Some(rule) = self.pending_clip.take() {
            if !self.path.is_empty() {
                let path = std::mem::take(&mut self.path);
                self.clip_to(&path, rule);
            }
        }
        self.path.clear();
    }

    fn stroke_style(&self) -> StrokeStyle {
        let width = if self.state.line_width > 0.0 {
            self.state.line_width
        } else {
            // Zero width means the thinnest line the device can show.
            let expansion = self.state.ctm.expansion();
            if expansion > 0.0 {
                1.0 / expansion
            } else {
                1.0
            }
        };
        StrokeStyle {
            paint: Paint {
                color: self.state.stroke_color,
                alpha: self.state.stroke_alpha,
            },
            width,
            cap: self.state.line_cap,
            join: self.state.line_join,
            miter_limit: self.state.miter_limit,
            dash: self.state.dash.clone(),
        }
    }

    fn set_ext_gstate(&mut self, name: &[u8]) {
        let doc = self.doc;
        let Some(gs) = self
            .resources
            .and_then(|res| objects::get_dict(doc, res, b"ExtGState"))
            .and_then(|states| objects::get_dict(doc, states, name))
        else {
            self.warnings.warn(
                WarningKind::MissingResource,
                format!("ExtGState /{} not found", String::from_utf8_lossy(name)),
            );
            return;
        };

        if let Some(w) = objects::get_number(doc, gs, b"LW") {
            self.state.line_width = w;
        }
        if let Some(cap) = objects::get_int(doc, gs, b"LC") {
            self.state.line_cap = LineCap::from_pdf(cap);
        }
        if let Some(join) = objects::get_int(doc, gs, b"LJ") {
            self.state.line_join = LineJoin::from_pdf(join);
        }
        if let Some(limit) = objects::get_number(doc, gs, b"ML") {
            self.state.miter_limit = limit;
        }
        if let Some(alpha) = objects::get_number(doc, gs, b"CA") {
            self.state.stroke_alpha = alpha.clamp(0.0, 1.0);
        }
        if let Some(alpha) = objects::get_number(doc, gs, b"ca") {
            self.state.fill_alpha = alpha.clamp(0.0, 1.0);
        }
        if let Some(dash) = objects::get_array(doc, gs, b"D") {
            if let (Some(array), Some(phase)) = (
                dash.first()
                    .and_then(|a| objects::resolve(doc, a))
                    .and_then(|a| a.as_array().ok())
                    .and_then(|a| objects::numbers(doc, a)),
                dash.get(1).and_then(objects::number),
            ) {
                self.state.dash = DashPattern::new(array, phase);
            }
        }
        match objects::get(doc, gs, b"SMask") {
            None | Some(Object::Name(_)) => {}
            Some(_) => self
                .warnings
                .warn(WarningKind::Unsupported, "soft masks in ExtGState are not rendered"),
        }
    }

    /// Resolve a font resource, loading it once per render.
    fn font(&mut self, name: &[u8]) -> Option<Rc<Font<'a>>> {
        let doc = self.doc;
        let entry = self
            .resources
            .and_then(|res| objects::get_dict(doc, res, b"Font"))
            .and_then(|fonts| fonts.get(name).ok());
        let Some(entry) = entry else {
            self.warnings.warn(
                WarningKind::Font,
                format!("font /{} not found", String::from_utf8_lossy(name)),
            );
            return None;
        };

        let id = match entry {
            Object::Reference(id) => Some(*id),
            _ => None,
        };
        if let Some(font) = id.and_then(|id| self.fonts.get(&id)) {
            return Some(Rc::clone(font));
        }

        let dict = objects::resolve(doc, entry).and_then(|obj| obj.as_dict().ok());
        let loaded = match dict {
            Some(dict) => Font::load(doc, dict, self.next_font_serial),
            None => Err("font entry is not a dictionary".to_string()),
        };
        match loaded {
            Ok(font) => {
                self.next_font_serial += 1;
                let font = Rc::new(font);
                if let Some(id) = id {
                    self.fonts.insert(id, Rc::clone(&font));
                }
                Some(font)
            }
            Err(e) => {
                self.warnings.warn(
                    WarningKind::Font,
                    format!("font /{}: {}", String::from_utf8_lossy(name), e),
                );
                None
            }
        }
    }

    fn next_line(&mut self, tx: f64, ty: f64) {
        self.line_matrix = Matrix::translate(tx, ty).then(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn show_text(&mut self, items: &[TextItem<'_>]) {
        let text = &self.state.text;
        let font = text.font.clone();
        let size = text.font_size;
        let th = text.horizontal_scale;
        let (tc, tw, rise) = (text.char_spacing, text.word_spacing, text.rise);

        let mut glyphs = Vec::new();
        let mut x = 0.0;
        let mut blind = 0;
        for item in items {
            match item {
                TextItem::Adjust(amount) => x -= amount / 1000.0 * size * th,
                TextItem::Text(bytes) => match &font {
                    Some(font) => {
                        for code in font.codes(bytes) {
                            let unicode = font.unicode(&code);
                            let outline = font
                                .glyph_id(code.code, Some(&unicode))
                                .and_then(|gid| {
                                    font.outline(gid).map(|path| GlyphOutline {
                                        key: (font.serial, gid),
                                        path,
                                        units_per_em: font.units_per_em(),
                                    })
                                });
                            let mut advance = font.advance(code.code) * size + tc;
                            if font.is_word_space(&code) {
                                advance += tw;
                            }
                            advance *= th;
                            let glyph = PositionedGlyph {
                                x,
                                y: rise,
                                advance,
                                unicode,
                                outline,
                            };
                            if glyph.is_blind() && glyph.is_inked() {
                                blind += 1;
                            }
                            glyphs.push(glyph);
                            x += advance;
                        }
                    }
                    None => {
                        for &byte in bytes.iter() {
                            let mut advance = DEFAULT_ADVANCE * size + tc;
                            if byte == b' ' {
                                advance += tw;
                            }
                            advance *= th;
                            glyphs.push(PositionedGlyph {
                                x,
                                y: rise,
                                advance,
                                unicode: objects::decode_text_simple(&[byte]),
                                outline: None,
                            });
                            x += advance;
                        }
                    }
                },
            }
        }

        match &font {
            None if !glyphs.is_empty() => self
                .warnings
                .warn(WarningKind::Font, "text shown without a usable font"),
            Some(font) if blind > 0 => self.warnings.warn(
                WarningKind::Font,
                format!(
                    "font {} has glyphs with no outline or Unicode mapping; text replaced by placeholder bars",
                    font.base_font
                ),
            ),
            _ => {}
        }

        let mode = self.state.text.render_mode;
        let fills = matches!(mode, 0 | 2 | 4 | 6);
        let strokes = matches!(mode, 1 | 2 | 5 | 6);
        if !glyphs.is_empty() && (fills || strokes) && size != 0.0 {
            let fill = (fills && !self.state.fill_is_pattern()).then_some(Paint {
                color: self.state.fill_color,
                alpha: self.state.fill_alpha,
            });
            let stroke = (strokes && !self.state.stroke_is_pattern()).then(|| self.stroke_style());
            if fill.is_some() || stroke.is_some() {
                let style = font.as_ref().map_or(&self.unresolved_style, |f| &f.style);
                self.target.paint_text(&TextRun {
                    glyphs: &glyphs,
                    style,
                    resolved: font.is_some(),
                    font_size: size,
                    horizontal_scale: th,
                    transform: self.text_matrix.then(&self.state.ctm),
                    fill,
                    stroke,
                });
            }
        }

        self.text_matrix = Matrix::translate(x, 0.0).then(&self.text_matrix);
    }

    fn do_xobject(&mut self, name: &[u8]) {
        let doc = self.doc;
        let entry = self
            .resources
            .and_then(|res| objects::get_dict(doc, res, b"XObject"))
            .and_then(|xobjects| xobjects.get(name).ok());
        let id = match entry {
            Some(Object::Reference(id)) => Some(*id),
            _ => None,
        };
        let Some(stream) = entry
            .and_then(|obj| objects::resolve(doc, obj))
            .and_then(|obj| obj.as_stream().ok())
        else {
            self.warnings.warn(
                WarningKind::MissingResource,
                format!("XObject /{} not found", String::from_utf8_lossy(name)),
            );
            return;
        };

        match objects::get_name(doc, &stream.dict, b"Subtype") {
            Some(b"Image") => self.draw_image(name, id, stream),
            Some(b"Form") => self.draw_form(name, stream),
            Some(b"PS") => {}
            _ => self.warnings.warn(
                WarningKind::Unsupported,
                format!(
                    "XObject /{} has an unsupported subtype",
                    String::from_utf8_lossy(name)
                ),
            ),
        }
    }

    fn draw_image(&mut self, name: &[u8], id: Option<ObjectId>, stream: &'a lopdf::Stream) {
        let doc = self.doc;
        let stencil = objects::get_bool(doc, &stream.dict, b"ImageMask").unwrap_or(false);
        let fill = self.state.fill_color;
        let cache_key = id.map(|id| (id, stencil.then(|| fill.to_u8())));

        let cached = cache_key.and_then(|key| self.images.get(&key).cloned());
        let image = match cached {
            Some(image) => image,
            None => match decode_image(doc, stream, self.resources, fill) {
                Ok(image) => {
                    let image = Rc::new(image);
                    if let Some(key) = cache_key {
                        self.images.insert(key, Rc::clone(&image));
                    }
                    image
                }
                Err(e) => {
                    self.warnings.warn(
                        WarningKind::Image,
                        format!("image /{}: {}", String::from_utf8_lossy(name), e),
                    );
                    return;
                }
            },
        };

        let key = cache_key.map(|(id, color)| match color {
            Some([r, g, b]) => format!("{}-{}-{:02x}{:02x}{:02x}", id.0, id.1, r, g, b),
            None => format!("{}-{}", id.0, id.1),
        });
        self.target.paint_image(&ImagePaint {
            image: &image,
            key,
            transform: self.state.ctm,
            alpha: self.state.fill_alpha,
        });
    }

    fn draw_form(&mut self, name: &[u8], stream: &'a lopdf::Stream) {
        if self.form_depth >= self.options.max_form_depth {
            self.warnings.warn(
                WarningKind::NestingLimit,
                format!(
                    "form XObject nesting deeper than {} levels",
                    self.options.max_form_depth
                ),
            );
            return;
        }

        let doc = self.doc;
        let operations = match objects::stream_data(stream)
            .and_then(|data| Content::decode(&data).map_err(|e| e.to_string()))
        {
            Ok(content) => content.operations,
            Err(e) => {
                self.warnings.warn(
                    WarningKind::Unsupported,
                    format!("form /{}: {}", String::from_utf8_lossy(name), e),
                );
                return;
            }
        };
        let matrix = objects::get(doc, &stream.dict, b"Matrix")
            .and_then(|m| objects::matrix(doc, m))
            .unwrap_or(Matrix::IDENTITY);
        let bbox = objects::get(doc, &stream.dict, b"BBox").and_then(|b| objects::rect(doc, b));
        let resources = objects::get_dict(doc, &stream.dict, b"Resources").or(self.resources);

        let depth = self.stack.len();
        self.save();
        self.state.ctm = matrix.then(&self.state.ctm);
        if let Some(bbox) = bbox {
            let clip = PathData::rect(bbox.x0, bbox.y0, bbox.width(), bbox.height());
            self.clip_to(&clip, FillRule::NonZero);
        }
        let saved_path = std::mem::take(&mut self.path);
        let saved_text = (self.text_matrix, self.line_matrix);

        self.form_depth += 1;
        self.run(&operations, resources);
        self.form_depth -= 1;

        while self.stack.len() > depth {
            self.restore();
        }
        self.path = saved_path;
        self.pending_clip = None;
        (self.text_matrix, self.line_matrix) = saved_text;
    }
}

fn number(operands: &[Object], index: usize) -> Option<f64> {
    operands
        .get(index)
        .and_then(objects::number)
        .filter(|v| v.is_finite())
}

fn numbers(operands: &[Object]) -> Option<Vec<f64>> {
    operands
        .iter()
        .map(|o| objects::number(o).filter(|v| v.is_finite()))
        .collect()
}

fn fixed<const N: usize>(operands: &[Object]) -> Option<[f64; N]> {
    let mut values = [0.0; N];
    for (i, value) in values.iter_mut().enumerate() {
        *value = number(operands, i)?;
    }
    Some(values)
}

fn string(obj: &Object) -> Option<&[u8]> {
    match obj {
        Object::String(bytes, _) => Some(bytes),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_operands() {
        let ops = vec![Object::Integer(1), Object::Real(2.5)];
        assert_eq!(fixed::<2>(&ops), Some([1.0, 2.5]));
        assert_eq!(fixed::<3>(&ops), None);
        assert_eq!(fixed::<1>(&[Object::Name(b"x".to_vec())]), None);
    }

    #[test]
    fn test_numbers_reject_non_numeric() {
        assert!(numbers(&[Object::Integer(1), Object::Null]).is_none());
        assert_eq!(numbers(&[]), Some(vec![]));
    }

    #[test]
    fn test_page_content_missing_is_empty() {
        let mut doc = LopdfDocument::new();
        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        let id = doc.add_object(Object::Dictionary(page));
        assert_eq!(page_content(&doc, id), Ok(Vec::new()));
    }

    #[test]
    fn test_page_content_array_is_joined() {
        let mut doc = LopdfDocument::new();
        let a = doc.add_object(Object::Stream(lopdf::Stream::new(
            Dictionary::new(),
            b"0 0 m".to_vec(),
        )));
        let b = doc.add_object(Object::Stream(lopdf::Stream::new(
            Dictionary::new(),
            b"1 1 l S".to_vec(),
        )));
        let mut page = Dictionary::new();
        page.set(
            "Contents",
            Object::Array(vec![Object::Reference(a), Object::Reference(b)]),
        );
        let id = doc.add_object(Object::Dictionary(page));
        assert_eq!(page_content(&doc, id).unwrap(), b"0 0 m\n1 1 l S\n".to_vec());
    }

    #[test]
    fn test_page_content_rejects_non_stream() {
        let mut doc = LopdfDocument::new();
        let mut page = Dictionary::new();
        page.set("Contents", Object::Integer(5));
        let id = doc.add_object(Object::Dictionary(page));
        assert!(page_content(&doc, id).is_err());
    }
}
