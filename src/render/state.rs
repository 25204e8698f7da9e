//! Colours, colour spaces and the graphics state stack.

use std::rc::Rc;

use lopdf::{Dictionary, Document as LopdfDocument, Object};

use super::font::Font;
use crate::geometry::Matrix;
use crate::parser::objects;

/// An opaque sRGB colour with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0.0, 0.0, 0.0);
    pub const WHITE: Rgb = Rgb::new(1.0, 1.0, 1.0);

    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    pub fn gray(v: f64) -> Self {
        Self::new(v, v, v)
    }

    pub fn from_cmyk(c: f64, m: f64, y: f64, k: f64) -> Self {
        Self::new(
            (1.0 - c) * (1.0 - k),
            (1.0 - m) * (1.0 - k),
            (1.0 - y) * (1.0 - k),
        )
    }

    /// Components as bytes.
    pub fn to_u8(self) -> [u8; 3] {
        [channel(self.r), channel(self.g), channel(self.b)]
    }

    /// `#rrggbb`
    pub fn to_hex(self) -> String {
        let [r, g, b] = self.to_u8();
        format!("#{:02x}{:02x}{:02x}", r, g, b)
    }
}

fn channel(v: f64) -> u8 {
    if v.is_nan() {
        return 0;
    }
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// A colour space, reduced to what is needed to produce sRGB.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ColorSpace {
    #[default]
    DeviceGray,
    DeviceRgb,
    DeviceCmyk,
    /// Palette lookup into a base space.
    Indexed {
        base: Box<ColorSpace>,
        hival: u32,
        lookup: Vec<u8>,
    },
    /// Single colorant; the tint is shown as ink on white.
    Separation,
    /// Several colorants; averaged into a gray ink.
    DeviceN(usize),
    /// CIE L*a*b*; shown by lightness.
    Lab,
    /// Pattern colours are not painted.
    Pattern,
}

impl ColorSpace {
    /// Resolve a colour space operand or `/ColorSpace` entry.
    pub fn from_object(
        doc: &LopdfDocument,
        obj: &Object,
        resources: Option<&Dictionary>,
    ) -> Result<ColorSpace, String> {
        Self::resolve(doc, obj, resources, 0)
    }

    fn resolve(
        doc: &LopdfDocument,
        obj: &Object,
        resources: Option<&Dictionary>,
        depth: usize,
    ) -> Result<ColorSpace, String> {
        if depth > 8 {
            return Err("colour space nesting too deep".to_string());
        }
        let obj = objects::resolve(doc, obj).ok_or("unresolvable colour space")?;
        match obj {
            Object::Name(name) => match name.as_slice() {
                b"DeviceGray" | b"G" | b"CalGray" => Ok(ColorSpace::DeviceGray),
                b"DeviceRGB" | b"RGB" | b"CalRGB" => Ok(ColorSpace::DeviceRgb),
                b"DeviceCMYK" | b"CMYK" => Ok(ColorSpace::DeviceCmyk),
                b"Pattern" => Ok(ColorSpace::Pattern),
                other => {
                    let named = resources
                        .and_then(|res| objects::get_dict(doc, res, b"ColorSpace"))
                        .and_then(|spaces| spaces.get(other).ok())
                        .ok_or_else(|| {
                            format!("unknown colour space /{}", String::from_utf8_lossy(other))
                        })?;
                    Self::resolve(doc, named, resources, depth + 1)
                }
            },
            Object::Array(items) => {
                let family = items
                    .first()
                    .and_then(|f| objects::resolve(doc, f))
                    .and_then(|f| f.as_name().ok())
                    .ok_or("colour space array without family")?;
                match family {
                    b"DeviceGray" | b"CalGray" => Ok(ColorSpace::DeviceGray),
                    b"DeviceRGB" | b"CalRGB" => Ok(ColorSpace::DeviceRgb),
                    b"DeviceCMYK" => Ok(ColorSpace::DeviceCmyk),
                    b"Lab" => Ok(ColorSpace::Lab),
                    b"Pattern" => Ok(ColorSpace::Pattern),
                    b"Separation" => Ok(ColorSpace::Separation),
                    b"DeviceN" => {
                        let count = items
                            .get(1)
                            .and_then(|names| objects::resolve(doc, names))
                            .and_then(|names| names.as_array().ok())
                            .map_or(1, |names| names.len().max(1));
                        Ok(ColorSpace::DeviceN(count))
                    }
                    b"ICCBased" => {
                        let stream = items
                            .get(1)
                            .and_then(|s| objects::resolve(doc, s))
                            .and_then(|s| s.as_stream().ok())
                            .ok_or("ICCBased without profile stream")?;
                        if let Ok(alt) = stream.dict.get(b"Alternate") {
                            if let Ok(space) = Self::resolve(doc, alt, resources, depth + 1) {
                                return Ok(space);
                            }
                        }
                        match objects::get_int(doc, &stream.dict, b"N") {
                            Some(1) => Ok(ColorSpace::DeviceGray),
                            Some(4) => Ok(ColorSpace::DeviceCmyk),
                            _ => Ok(ColorSpace::DeviceRgb),
                        }
                    }
                    b"Indexed" | b"I" => {
                        let base = items.get(1).ok_or("Indexed without base")?;
                        let base = Self::resolve(doc, base, resources, depth + 1)?;
                        let hival = items
                            .get(2)
                            .and_then(|h| objects::resolve(doc, h))
                            .and_then(objects::number)
                            .map_or(255, |h| h.clamp(0.0, 255.0) as u32);
                        let lookup = match items.get(3).and_then(|l| objects::resolve(doc, l)) {
                            Some(Object::String(bytes, _)) => bytes.clone(),
                            Some(Object::Stream(stream)) => objects::stream_data(stream)?,
                            _ => return Err("Indexed without lookup table".to_string()),
                        };
                        Ok(ColorSpace::Indexed {
                            base: Box::new(base),
                            hival,
                            lookup,
                        })
                    }
                    other => Err(format!(
                        "unsupported colour space /{}",
                        String::from_utf8_lossy(other)
                    )),
                }
            }
            _ => Err("colour space is neither a name nor an array".to_string()),
        }
    }

    /// Number of colour components.
    pub fn components(&self) -> usize {
        match self {
            ColorSpace::DeviceGray | ColorSpace::Separation | ColorSpace::Indexed { .. } => 1,
            ColorSpace::DeviceRgb | ColorSpace::Lab => 3,
            ColorSpace::DeviceCmyk => 4,
            ColorSpace::DeviceN(n) => *n,
            ColorSpace::Pattern => 0,
        }
    }

    /// Colour selected when the space is set with `cs`/`CS`.
    pub fn initial_color(&self) -> Vec<f64> {
        match self {
            ColorSpace::DeviceCmyk => vec![0.0, 0.0, 0.0, 1.0],
            ColorSpace::Separation => vec![1.0],
            ColorSpace::DeviceN(n) => vec![1.0; *n],
            other => vec![0.0; other.components()],
        }
    }

    /// Default `/Decode` range of a component for images.
    pub fn decode_range(&self, bits_per_component: u8) -> (f64, f64) {
        match self {
            ColorSpace::Indexed { .. } => (0.0, ((1u32 << bits_per_component) - 1) as f64),
            ColorSpace::Lab => (0.0, 100.0),
            _ => (0.0, 1.0),
        }
    }

    /// Convert components to sRGB. Missing components read as zero.
    pub fn to_rgb(&self, comps: &[f64]) -> Rgb {
        let c = |i: usize| comps.get(i).copied().unwrap_or(0.0);
        match self {
            ColorSpace::DeviceGray => Rgb::gray(c(0)),
            ColorSpace::DeviceRgb => Rgb::new(c(0), c(1), c(2)),
            ColorSpace::DeviceCmyk => Rgb::from_cmyk(c(0), c(1), c(2), c(3)),
            ColorSpace::Separation => Rgb::gray(1.0 - c(0)),
            ColorSpace::DeviceN(n) => {
                let n = (*n).max(1);
                let ink: f64 = (0..n).map(c).sum::<f64>() / n as f64;
                Rgb::gray(1.0 - ink)
            }
            ColorSpace::Lab => Rgb::gray(c(0) / 100.0),
            ColorSpace::Indexed {
                base,
                hival,
                lookup,
            } => {
                let index = (c(0).round().max(0.0) as u32).min(*hival) as usize;
                let n = base.components();
                let start = index * n;
                match lookup.get(start..start + n) {
                    Some(entry) => {
                        let values: Vec<f64> = entry.iter().map(|&b| b as f64 / 255.0).collect();
                        base.to_rgb(&values)
                    }
                    None => Rgb::BLACK,
                }
            }
            ColorSpace::Pattern => Rgb::BLACK,
        }
    }
}

/// Line cap style (`J`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

impl LineCap {
    pub fn from_pdf(value: i64) -> Self {
        match value {
            1 => LineCap::Round,
            2 => LineCap::Square,
            _ => LineCap::Butt,
        }
    }
}

/// Line join style (`j`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

impl LineJoin {
    pub fn from_pdf(value: i64) -> Self {
        match value {
            1 => LineJoin::Round,
            2 => LineJoin::Bevel,
            _ => LineJoin::Miter,
        }
    }
}

/// Dash pattern (`d`): dash lengths and phase, in user space.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DashPattern {
    pub array: Vec<f64>,
    pub phase: f64,
}

impl DashPattern {
    /// `None` for a solid line or an unusable pattern.
    pub fn new(array: Vec<f64>, phase: f64) -> Option<Self> {
        let usable = !array.is_empty()
            && array.iter().all(|v| v.is_finite() && *v >= 0.0)
            && array.iter().any(|v| *v > 0.0);
        usable.then_some(Self { array, phase })
    }
}

/// Text state parameters (`Tc Tw Tz TL Tf Tr Ts`).
#[derive(Debug, Clone)]
pub struct TextState<'a> {
    pub char_spacing: f64,
    pub word_spacing: f64,
    /// `Tz / 100`
    pub horizontal_scale: f64,
    pub leading: f64,
    pub font: Option<Rc<Font<'a>>>,
    pub font_size: f64,
    pub render_mode: i64,
    pub rise: f64,
}

impl Default for TextState<'_> {
    fn default() -> Self {
        Self {
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            font: None,
            font_size: 0.0,
            render_mode: 0,
            rise: 0.0,
        }
    }
}

/// The saved-and-restored part of the interpreter state.
#[derive(Debug, Clone)]
pub struct GraphicsState<'a> {
    /// User space to target space.
    pub ctm: Matrix,
    pub fill_space: ColorSpace,
    pub stroke_space: ColorSpace,
    pub fill_color: Rgb,
    pub stroke_color: Rgb,
    pub fill_alpha: f64,
    pub stroke_alpha: f64,
    pub line_width: f64,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    pub miter_limit: f64,
    pub dash: Option<DashPattern>,
    pub text: TextState<'a>,
    /// Clips pushed onto the target while this state was current.
    pub clip_depth: usize,
}

impl GraphicsState<'_> {
    pub fn new(ctm: Matrix) -> Self {
        Self {
            ctm,
            fill_space: ColorSpace::DeviceGray,
            stroke_space: ColorSpace::DeviceGray,
            fill_color: Rgb::BLACK,
            stroke_color: Rgb::BLACK,
            fill_alpha: 1.0,
            stroke_alpha: 1.0,
            line_width: 1.0,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Miter,
            miter_limit: 10.0,
            dash: None,
            text: TextState::default(),
            clip_depth: 0,
        }
    }

    pub fn fill_is_pattern(&self) -> bool {
        self.fill_space == ColorSpace::Pattern
    }

    pub fn stroke_is_pattern(&self) -> bool {
        self.stroke_space == ColorSpace::Pattern
    }
}
