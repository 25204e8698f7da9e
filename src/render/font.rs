//! Font resources: advances, Unicode mapping and embedded glyph outlines.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use lopdf::{Dictionary, Document as LopdfDocument, Object};
use owned_ttf_parser::{AsFaceRef, GlyphId, OutlineBuilder, OwnedFace, PlatformId};

use crate::geometry::{Matrix, PathData};
use crate::parser::objects;

/// Advance used when nothing better is known, in text-space units per unit
/// font size.
pub const DEFAULT_ADVANCE: f64 = 0.5;

const FLAG_FIXED_PITCH: i64 = 1;
const FLAG_SERIF: i64 = 1 << 1;
const FLAG_SYMBOLIC: i64 = 1 << 2;
const FLAG_ITALIC: i64 = 1 << 6;
const FLAG_FORCE_BOLD: i64 = 1 << 18;

/// Presentation attributes used when text is emitted as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FontStyle {
    /// Family name with subset prefix and style suffix removed.
    pub family: String,
    /// CSS generic family used as fallback.
    pub generic: &'static str,
    pub bold: bool,
    pub italic: bool,
}

impl FontStyle {
    /// Style for text whose font resource is missing.
    pub fn unresolved() -> Self {
        Self {
            family: String::new(),
            generic: "sans-serif",
            bold: false,
            italic: false,
        }
    }

    /// Derive a style from a `/BaseFont` name and descriptor flags.
    pub fn from_base_font(base_font: &str, flags: i64) -> Self {
        let name = strip_subset_prefix(base_font);
        let lower = name.to_ascii_lowercase();

        let family = name
            .split(['-', ','])
            .next()
            .unwrap_or(name)
            .trim_end_matches("MT")
            .trim_end_matches("PS")
            .to_string();
        let family = match family.as_str() {
            "Times" => "Times New Roman".to_string(),
            _ => family,
        };

        let generic = if flags & FLAG_FIXED_PITCH != 0
            || lower.contains("courier")
            || lower.contains("mono")
        {
            "monospace"
        } else if (flags & FLAG_SERIF != 0 && !lower.contains("sans"))
            || lower.contains("times")
            || lower.contains("georgia")
            || lower.contains("garamond")
            || (lower.contains("serif") && !lower.contains("sans"))
        {
            "serif"
        } else {
            "sans-serif"
        };

        let bold = flags & FLAG_FORCE_BOLD != 0
            || ["bold", "black", "heavy", "demi", "semibold"]
                .iter()
                .any(|w| lower.contains(w));
        let italic =
            flags & FLAG_ITALIC != 0 || lower.contains("italic") || lower.contains("oblique");

        Self {
            family,
            generic,
            bold,
            italic,
        }
    }
}

/// Remove a six-letter subset tag such as `ABCDEF+`.
fn strip_subset_prefix(name: &str) -> &str {
    match name.split_once('+') {
        Some((tag, rest)) if tag.len() == 6 && tag.bytes().all(|b| b.is_ascii_uppercase()) => {
            rest
        }
        _ => name,
    }
}

#[derive(Debug)]
enum FontKind {
    /// One byte per code.
    Simple,
    /// One byte per code; glyphs are content streams and are not drawn.
    Type3,
    /// Two bytes per code.
    Composite { cid_to_gid: Option<Vec<u8>> },
}

#[derive(Debug, Default)]
struct Widths {
    first_char: u32,
    simple: Vec<f64>,
    /// Composite widths keyed by range start: `(last, width)`.
    ranges: BTreeMap<u32, (u32, f64)>,
    default: Option<f64>,
    /// Multiplier from width units to text space.
    scale: f64,
}

impl Widths {
    fn lookup(&self, code: u32) -> Option<f64> {
        if !self.simple.is_empty() && code >= self.first_char {
            if let Some(w) = self.simple.get((code - self.first_char) as usize) {
                return Some(*w * self.scale);
            }
        }
        if let Some((_, (last, w))) = self.ranges.range(..=code).next_back() {
            if code <= *last {
                return Some(*w * self.scale);
            }
        }
        self.default.map(|w| w * self.scale)
    }
}

/// An embedded TrueType or OpenType program.
struct GlyphProgram {
    face: OwnedFace,
    units_per_em: f64,
    symbolic_cmap: bool,
}

type UnicodeDecoder<'a> = Box<dyn Fn(&[u8]) -> Option<String> + 'a>;

/// A font resource prepared for painting.
pub struct Font<'a> {
    /// Allocation order within one render, used to key shared glyph shapes.
    pub serial: usize,
    pub base_font: String,
    pub style: FontStyle,
    kind: FontKind,
    widths: Widths,
    decoder: Option<UnicodeDecoder<'a>>,
    program: Option<GlyphProgram>,
    outlines: RefCell<HashMap<u16, Option<Rc<PathData>>>>,
}

impl fmt::Debug for Font<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Font")
            .field("serial", &self.serial)
            .field("base_font", &self.base_font)
            .field("kind", &self.kind)
            .field("embedded", &self.program.is_some())
            .finish()
    }
}

/// One character code taken from a show-text string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharCode<'s> {
    pub code: u32,
    pub bytes: &'s [u8],
}

impl<'a> Font<'a> {
    /// Prepare a `/Font` dictionary.
    pub fn load(doc: &'a LopdfDocument, dict: &'a Dictionary, serial: usize) -> Result<Self, String> {
        let subtype = objects::get_name(doc, dict, b"Subtype").unwrap_or(&b"Type1"[..]);
        let base_font = objects::get_name(doc, dict, b"BaseFont")
            .map(|n| String::from_utf8_lossy(n).to_string())
            .unwrap_or_default();

        // lopdf only reads encodings of dictionaries typed as fonts.
        let encoding = dict
            .type_is(b"Font")
            .then(|| dict.get_font_encoding(doc).ok())
            .flatten();
        let decoder: Option<UnicodeDecoder<'a>> = encoding.map(|encoding| {
            Box::new(move |bytes: &[u8]| {
                LopdfDocument::decode_text(&encoding, bytes)
                    .ok()
                    .filter(|s| !s.is_empty())
            }) as UnicodeDecoder<'a>
        });

        let (kind, widths, descriptor) = match subtype {
            b"Type0" => {
                let descendant = objects::get_array(doc, dict, b"DescendantFonts")
                    .and_then(|fonts| fonts.first())
                    .and_then(|f| objects::resolve(doc, f))
                    .and_then(|f| f.as_dict().ok())
                    .ok_or("Type0 font without descendant font")?;
                let cid_to_gid = match objects::get(doc, descendant, b"CIDToGIDMap") {
                    Some(Object::Stream(stream)) => Some(objects::stream_data(stream)?),
                    _ => None,
                };
                let widths = composite_widths(doc, descendant);
                let descriptor = objects::get_dict(doc, descendant, b"FontDescriptor");
                (FontKind::Composite { cid_to_gid }, widths, descriptor)
            }
            b"Type3" => {
                let matrix = objects::get(doc, dict, b"FontMatrix")
                    .and_then(|m| objects::matrix(doc, m))
                    .unwrap_or(Matrix::scale(0.001, 0.001));
                let mut widths = simple_widths(doc, dict, None);
                widths.scale = matrix.a;
                (FontKind::Type3, widths, None)
            }
            _ => {
                let descriptor = objects::get_dict(doc, dict, b"FontDescriptor");
                let widths = simple_widths(doc, dict, descriptor);
                (FontKind::Simple, widths, descriptor)
            }
        };

        let flags = descriptor
            .and_then(|d| objects::get_int(doc, d, b"Flags"))
            .unwrap_or(0);
        let program = descriptor.and_then(|d| load_program(doc, d, flags));
        let mut widths = widths;
        if widths.default.is_none() && widths.simple.is_empty() && widths.ranges.is_empty() {
            let monospaced = flags & FLAG_FIXED_PITCH != 0
                || base_font.to_ascii_lowercase().contains("courier");
            widths.default = Some(if monospaced { 600.0 } else { 500.0 });
        }

        log::debug!(
            "Loaded font {} ({}, embedded outlines: {})",
            base_font,
            String::from_utf8_lossy(subtype),
            program.is_some()
        );

        Ok(Self {
            serial,
            style: FontStyle::from_base_font(&base_font, flags),
            base_font,
            kind,
            widths,
            decoder,
            program,
            outlines: RefCell::new(HashMap::new()),
        })
    }

    /// Whether glyph shapes are available.
    pub fn has_outlines(&self) -> bool {
        self.program.is_some()
    }

    pub fn units_per_em(&self) -> f64 {
        self.program.as_ref().map_or(1000.0, |p| p.units_per_em)
    }

    /// Split a show-text string into character codes.
    pub fn codes<'s>(&self, bytes: &'s [u8]) -> Vec<CharCode<'s>> {
        match self.kind {
            FontKind::Composite { .. } => bytes
                .chunks(2)
                .map(|chunk| CharCode {
                    code: chunk.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32),
                    bytes: chunk,
                })
                .collect(),
            _ => bytes
                .chunks(1)
                .map(|chunk| CharCode {
                    code: chunk[0] as u32,
                    bytes: chunk,
                })
                .collect(),
        }
    }

    /// Whether word spacing applies to this code (single-byte 32 only).
    pub fn is_word_space(&self, code: &CharCode<'_>) -> bool {
        code.bytes == b" "
    }

    /// Horizontal advance per unit font size.
    pub fn advance(&self, code: u32) -> f64 {
        if let Some(w) = self.widths.lookup(code) {
            return w;
        }
        if let (Some(program), Some(gid)) = (&self.program, self.glyph_id(code, None)) {
            if let Some(adv) = program.face.as_face_ref().glyph_hor_advance(GlyphId(gid)) {
                return adv as f64 / program.units_per_em;
            }
        }
        DEFAULT_ADVANCE
    }

    /// Unicode text for one code, empty when unknown.
    pub fn unicode(&self, code: &CharCode<'_>) -> String {
        if let Some(text) = self.decoder.as_ref().and_then(|decode| decode(code.bytes)) {
            return text;
        }
        match self.kind {
            FontKind::Composite { .. } => String::new(),
            _ => objects::decode_text_simple(code.bytes),
        }
    }

    /// Glyph index in the embedded program.
    pub fn glyph_id(&self, code: u32, unicode: Option<&str>) -> Option<u16> {
        let program = self.program.as_ref()?;
        let face = program.face.as_face_ref();
        match &self.kind {
            FontKind::Composite { cid_to_gid } => match cid_to_gid {
                Some(map) => {
                    let at = code as usize * 2;
                    map.get(at..at + 2)
                        .map(|b| u16::from_be_bytes([b[0], b[1]]))
                }
                None => u16::try_from(code).ok(),
            },
            FontKind::Type3 => None,
            FontKind::Simple => {
                let cmap = face.tables().cmap?;
                let lookup = |platform: PlatformId, encoding: u16, cp: u32| {
                    cmap.subtables
                        .into_iter()
                        .filter(|s| s.platform_id == platform && s.encoding_id == encoding)
                        .find_map(|s| s.glyph_index(cp))
                };
                if program.symbolic_cmap {
                    for base in [0xF000u32, 0xF100, 0xF200, 0] {
                        if let Some(gid) = lookup(PlatformId::Windows, 0, base + code) {
                            return Some(gid.0);
                        }
                    }
                }
                if let Some(ch) = unicode.and_then(|u| u.chars().next()) {
                    if let Some(gid) = face.glyph_index(ch) {
                        return Some(gid.0);
                    }
                }
                lookup(PlatformId::Macintosh, 0, code).map(|g| g.0)
            }
        }
    }

    /// Outline of a glyph in font units (y up), cached per font.
    pub fn outline(&self, gid: u16) -> Option<Rc<PathData>> {
        let program = self.program.as_ref()?;
        if let Some(cached) = self.outlines.borrow().get(&gid) {
            return cached.clone();
        }
        let mut sink = OutlineSink::default();
        let outline = program
            .face
            .as_face_ref()
            .outline_glyph(GlyphId(gid), &mut sink)
            .map(|_| Rc::new(sink.path));
        self.outlines.borrow_mut().insert(gid, outline.clone());
        outline
    }
}

fn simple_widths(doc: &LopdfDocument, dict: &Dictionary, descriptor: Option<&Dictionary>) -> Widths {
    let first_char = objects::get_int(doc, dict, b"FirstChar").unwrap_or(0).max(0) as u32;
    let simple = objects::get_array(doc, dict, b"Widths")
        .map(|items| {
            items
                .iter()
                .map(|w| objects::resolve(doc, w).and_then(objects::number).unwrap_or(0.0))
                .collect()
        })
        .unwrap_or_default();
    let default = descriptor
        .and_then(|d| objects::get_number(doc, d, b"MissingWidth"))
        .filter(|w| *w > 0.0);
    Widths {
        first_char,
        simple,
        ranges: BTreeMap::new(),
        default,
        scale: 0.001,
    }
}

fn composite_widths(doc: &LopdfDocument, descendant: &Dictionary) -> Widths {
    let mut ranges = BTreeMap::new();
    if let Some(items) = objects::get_array(doc, descendant, b"W") {
        let mut i = 0;
        while i + 1 < items.len() {
            let Some(first) = objects::resolve(doc, &items[i]).and_then(objects::number) else {
                break;
            };
            let first = first.max(0.0) as u32;
            match objects::resolve(doc, &items[i + 1]) {
                Some(Object::Array(list)) => {
                    for (k, w) in list.iter().enumerate() {
                        if let Some(w) = objects::resolve(doc, w).and_then(objects::number) {
                            let cid = first + k as u32;
                            ranges.insert(cid, (cid, w));
                        }
                    }
                    i += 2;
                }
                Some(last) => {
                    let last = objects::number(last).map_or(first, |l| l.max(0.0) as u32);
                    let width = items
                        .get(i + 2)
                        .and_then(|w| objects::resolve(doc, w))
                        .and_then(objects::number)
                        .unwrap_or(1000.0);
                    ranges.insert(first, (last.max(first), width));
                    i += 3;
                }
                None => break,
            }
        }
    }
    Widths {
        first_char: 0,
        simple: Vec::new(),
        ranges,
        default: Some(objects::get_number(doc, descendant, b"DW").unwrap_or(1000.0)),
        scale: 0.001,
    }
}

fn load_program(doc: &LopdfDocument, descriptor: &Dictionary, flags: i64) -> Option<GlyphProgram> {
    let stream = match objects::get_stream(doc, descriptor, b"FontFile2") {
        Some(stream) => stream,
        None => {
            let stream = objects::get_stream(doc, descriptor, b"FontFile3")?;
            if objects::get_name(doc, &stream.dict, b"Subtype") != Some(&b"OpenType"[..]) {
                return None;
            }
            stream
        }
    };
    let data = match objects::stream_data(stream) {
        Ok(data) => data,
        Err(e) => {
            log::debug!("Embedded font program unreadable: {}", e);
            return None;
        }
    };
    let face = match OwnedFace::from_vec(data, 0) {
        Ok(face) => face,
        Err(e) => {
            log::debug!("Embedded font program rejected: {}", e);
            return None;
        }
    };
    let units_per_em = face.as_face_ref().units_per_em().max(1) as f64;
    let symbolic_cmap = flags & FLAG_SYMBOLIC != 0
        || face.as_face_ref().tables().cmap.is_some_and(|cmap| {
            cmap.subtables
                .into_iter()
                .any(|s| s.platform_id == PlatformId::Windows && s.encoding_id == 0)
        });
    Some(GlyphProgram {
        face,
        units_per_em,
        symbolic_cmap,
    })
}

/// Collects a glyph outline into a [`PathData`], raising quadratics to cubics.
#[derive(Default)]
struct OutlineSink {
    path: PathData,
    current: (f64, f64),
}

impl OutlineBuilder for OutlineSink {
    fn move_to(&mut self, x: f32, y: f32) {
        self.current = (x as f64, y as f64);
        self.path.move_to(x as f64, y as f64);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.current = (x as f64, y as f64);
        self.path.line_to(x as f64, y as f64);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x0, y0) = self.current;
        let (qx, qy) = (x1 as f64, y1 as f64);
        let (x, y) = (x as f64, y as f64);
        self.path.curve_to(
            x0 + 2.0 / 3.0 * (qx - x0),
            y0 + 2.0 / 3.0 * (qy - y0),
            x + 2.0 / 3.0 * (qx - x),
            y + 2.0 / 3.0 * (qy - y),
            x,
            y,
        );
        self.current = (x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.current = (x as f64, y as f64);
        self.path.curve_to(
            x1 as f64, y1 as f64, x2 as f64, y2 as f64, x as f64, y as f64,
        );
    }

    fn close(&mut self) {
        self.path.close();
    }
}
