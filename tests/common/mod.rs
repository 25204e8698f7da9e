//! Hand-assembled PDF fixtures.
//!
//! Documents are built as text with a byte-accurate cross-reference table so
//! each test controls exactly which structure is broken.

#![allow(dead_code)]

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};

/// Object 1 is the catalog and object 2 the page tree; both are written by
/// [`PdfBuilder::build`].
pub struct PdfBuilder {
    objects: Vec<Vec<u8>>,
    pages: Vec<usize>,
    trailer_extra: String,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self {
            objects: vec![Vec::new(), Vec::new()],
            pages: Vec::new(),
            trailer_extra: String::new(),
        }
    }

    /// Add an object body, returning its object number.
    pub fn object(&mut self, body: impl Into<Vec<u8>>) -> usize {
        self.objects.push(body.into());
        self.objects.len()
    }

    /// Add a stream; `dict` holds the entries other than `/Length`.
    pub fn stream(&mut self, dict: &str, data: &[u8]) -> usize {
        let mut body = format!("<< {} /Length {} >>\nstream\n", dict, data.len()).into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");
        self.object(body)
    }

    /// Add a page with the given content and resources dictionary.
    pub fn page(&mut self, media_box: [f64; 4], content: &str, resources: &str) -> usize {
        let contents = self.stream("", content.as_bytes());
        self.page_with_contents(media_box, &format!("{} 0 R", contents), resources)
    }

    /// Add a page whose `/Contents` entry is written verbatim.
    pub fn page_with_contents(&mut self, media_box: [f64; 4], contents: &str, resources: &str) -> usize {
        let [x0, y0, x1, y1] = media_box;
        self.raw_page(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [{} {} {} {}] /Resources {} /Contents {} >>",
            x0, y0, x1, y1, resources, contents
        ))
    }

    /// Add a page object written verbatim.
    pub fn raw_page(&mut self, body: impl Into<Vec<u8>>) -> usize {
        let id = self.object(body);
        self.pages.push(id);
        id
    }

    /// Extra entries for the trailer dictionary.
    pub fn trailer(&mut self, entries: &str) -> &mut Self {
        self.trailer_extra = entries.to_string();
        self
    }

    /// Header and numbered objects, returning the byte offset of each.
    fn body(&self) -> (Vec<u8>, Vec<usize>) {
        let mut out = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n".to_vec();
        let mut offsets = Vec::with_capacity(self.objects.len());

        let kids: Vec<String> = self.pages.iter().map(|id| format!("{} 0 R", id)).collect();
        let catalog = b"<< /Type /Catalog /Pages 2 0 R >>".to_vec();
        let tree = format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            self.pages.len()
        )
        .into_bytes();

        for (i, body) in self.objects.iter().enumerate() {
            let body = match i {
                0 => &catalog,
                1 => &tree,
                _ => body,
            };
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n", i + 1).as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }
        (out, offsets)
    }

    /// A well-formed file.
    pub fn build(&self) -> Vec<u8> {
        let (mut out, offsets) = self.body();
        let xref = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", offsets.len() + 1).as_bytes());
        out.extend_from_slice(b"0000000000 65535 f \n");
        for offset in &offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R {}>>\nstartxref\n{}\n%%EOF\n",
                offsets.len() + 1,
                self.trailer_extra,
                xref
            )
            .as_bytes(),
        );
        out
    }

    /// Objects intact, cross-reference table and trailer unusable.
    pub fn build_with_broken_xref(&self) -> Vec<u8> {
        let (mut out, _) = self.body();
        out.extend_from_slice(b"xref\n0 4\ngarbage\ntrailer\n<< /Size 9 >>\nstartxref\n999999\n%%EOF\n");
        out
    }
}

impl Default for PdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub const SLIDE: [f64; 4] = [0.0, 0.0, 400.0, 300.0];

/// A slide with a background, a stroked frame and a title.
pub fn slide_content(n: usize) -> String {
    format!(
        "q 0.2 0.4 0.8 rg 0 0 400 300 re f Q\n\
         q 1 0 0 RG 4 w 20 20 360 260 re S Q\n\
         BT /F1 24 Tf 40 240 Td (Slide {}) Tj ET\n",
        n
    )
}

/// `pages` slides of 400x300 pt sharing one Helvetica font.
pub fn deck(pages: usize) -> Vec<u8> {
    deck_builder(pages).build()
}

pub fn deck_builder(pages: usize) -> PdfBuilder {
    let mut pdf = PdfBuilder::new();
    let font = pdf.object("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>");
    let resources = format!("<< /Font << /F1 {} 0 R >> >>", font);
    for n in 1..=pages {
        pdf.page(SLIDE, &slide_content(n), &resources);
    }
    pdf
}

/// A deck whose second page has a `/Contents` entry that is not a stream.
pub fn deck_with_corrupt_page() -> Vec<u8> {
    let mut pdf = PdfBuilder::new();
    let font = pdf.object("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>");
    let resources = format!("<< /Font << /F1 {} 0 R >> >>", font);
    pdf.page(SLIDE, &slide_content(1), &resources);
    let bogus = pdf.object("42");
    pdf.page_with_contents(SLIDE, &format!("{} 0 R", bogus), &resources);
    pdf.page(SLIDE, &slide_content(3), &resources);
    pdf.build()
}

/// One page that paints an image XObject it never defines.
pub fn page_with_missing_xobject() -> Vec<u8> {
    let mut pdf = PdfBuilder::new();
    pdf.page(
        SLIDE,
        "0 0 1 rg 10 10 50 50 re f q 100 0 0 100 50 50 cm /Im9 Do Q",
        "<< /XObject << >> >>",
    );
    pdf.build()
}

/// An encrypted-looking document (standard handler, no usable keys).
pub fn encrypted_deck() -> Vec<u8> {
    let mut pdf = deck_builder(2);
    let encrypt = pdf.object(
        "<< /Filter /Standard /V 1 /R 2 /Length 40 /P -4 \
         /O (0123456789abcdef0123456789abcdef) /U (0123456789abcdef0123456789abcdef) >>",
    );
    pdf.trailer(&format!("/Encrypt {} 0 R /ID [<00112233445566778899aabbccddeeff> <00112233445566778899aabbccddeeff>] ", encrypt));
    pdf.build()
}

/// A small baseline JPEG of a red/blue gradient.
pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            pixels.extend_from_slice(&[(x * 255 / width.max(1)) as u8, 0, (y * 255 / height.max(1)) as u8]);
        }
    }
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 90)
        .write_image(&pixels, width, height, ExtendedColorType::Rgb8)
        .expect("encode fixture jpeg");
    out
}

/// One page drawing `jpeg` as a DCT-encoded image XObject.
pub fn page_with_jpeg(jpeg: &[u8], width: u32, height: u32) -> Vec<u8> {
    let mut pdf = PdfBuilder::new();
    let image = pdf.stream(
        &format!(
            "/Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceRGB \
             /BitsPerComponent 8 /Filter /DCTDecode",
            width, height
        ),
        jpeg,
    );
    pdf.page(
        SLIDE,
        "q 200 0 0 150 100 75 cm /Im1 Do Q",
        &format!("<< /XObject << /Im1 {} 0 R >> >>", image),
    );
    pdf.build()
}

/// A two-glyph TrueType program: `.notdef` is empty and glyph 1 is a
/// square from (100, 0) to (600, 700) on a 1000-unit em.
pub fn square_font() -> Vec<u8> {
    fn be16(out: &mut Vec<u8>, v: i32) {
        out.extend_from_slice(&(v as u16).to_be_bytes());
    }

    let mut head = Vec::new();
    head.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // version
    head.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // fontRevision
    head.extend_from_slice(&0u32.to_be_bytes()); // checkSumAdjustment
    head.extend_from_slice(&0x5F0F_3CF5u32.to_be_bytes()); // magicNumber
    be16(&mut head, 0); // flags
    be16(&mut head, 1000); // unitsPerEm
    head.extend_from_slice(&[0; 16]); // created, modified
    for v in [0, 0, 700, 700] {
        be16(&mut head, v); // bbox
    }
    for v in [0, 8, 2, 0, 0] {
        be16(&mut head, v); // macStyle .. indexToLocFormat (short), glyphDataFormat
    }
    assert_eq!(head.len(), 54);

    let mut hhea = Vec::new();
    hhea.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    for v in [800, -200, 0] {
        be16(&mut hhea, v); // ascender, descender, lineGap
    }
    hhea.extend_from_slice(&[0; 24]);
    be16(&mut hhea, 2); // numberOfHMetrics

    let mut maxp = Vec::new();
    maxp.extend_from_slice(&0x0000_5000u32.to_be_bytes());
    be16(&mut maxp, 2);

    let mut hmtx = Vec::new();
    for v in [500, 0, 700, 100] {
        be16(&mut hmtx, v);
    }

    // One contour, four on-curve points with word-sized deltas.
    let mut glyf = Vec::new();
    for v in [1, 100, 0, 600, 700, 3, 0] {
        be16(&mut glyf, v); // contours, bbox, endPts, instructionLength
    }
    glyf.extend_from_slice(&[0x01; 4]);
    for v in [100, 0, 500, 0, 0, 700, 0, -700] {
        be16(&mut glyf, v);
    }

    let mut loca = Vec::new();
    for v in [0, 0, glyf.len() as i32 / 2] {
        be16(&mut loca, v);
    }

    let tables: [(&[u8; 4], Vec<u8>); 6] = [
        (b"glyf", glyf),
        (b"head", head),
        (b"hhea", hhea),
        (b"hmtx", hmtx),
        (b"loca", loca),
        (b"maxp", maxp),
    ];
    let mut out = Vec::new();
    out.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    for v in [tables.len() as i32, 64, 2, 32] {
        be16(&mut out, v); // numTables, searchRange, entrySelector, rangeShift
    }
    let mut offset = 12 + 16 * tables.len();
    for (tag, data) in &tables {
        out.extend_from_slice(*tag);
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(&(offset as u32).to_be_bytes());
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        offset += (data.len() + 3) & !3;
    }
    for (_, data) in &tables {
        out.extend_from_slice(data);
        out.resize((out.len() + 3) & !3, 0);
    }
    out
}

/// One page showing `text` (hex-encoded CIDs) in a Type0 `Identity-H` font
/// at 40 pt from (50, 100). The descendant is `CIDFontType2` over
/// `font_program` when given, otherwise a bare `CIDFontType0` with neither
/// an embedded program nor a ToUnicode map.
pub fn page_with_cid_font(font_program: Option<&[u8]>, text: &str) -> Vec<u8> {
    let mut pdf = PdfBuilder::new();
    let (subtype, font_file) = match font_program {
        Some(program) => {
            let file = pdf.stream(&format!("/Length1 {}", program.len()), program);
            ("CIDFontType2", format!("/FontFile2 {} 0 R", file))
        }
        None => ("CIDFontType0", String::new()),
    };
    let descriptor = pdf.object(format!(
        "<< /Type /FontDescriptor /FontName /ABCDEF+Squares /Flags 4 \
         /FontBBox [0 0 700 700] /ItalicAngle 0 /Ascent 800 /Descent -200 \
         /CapHeight 700 /StemV 80 {} >>",
        font_file
    ));
    let descendant = pdf.object(format!(
        "<< /Type /Font /Subtype /{} /BaseFont /ABCDEF+Squares \
         /CIDSystemInfo << /Registry (Adobe) /Ordering (Identity) /Supplement 0 >> \
         /FontDescriptor {} 0 R /DW 1000 /W [1 [700]] /CIDToGIDMap /Identity >>",
        subtype, descriptor
    ));
    let font = pdf.object(format!(
        "<< /Type /Font /Subtype /Type0 /BaseFont /ABCDEF+Squares \
         /Encoding /Identity-H /DescendantFonts [{} 0 R] >>",
        descendant
    ));
    pdf.page(
        SLIDE,
        &format!("BT /F1 40 Tf 50 100 Td <{}> Tj ET", text),
        &format!("<< /Font << /F1 {} 0 R >> >>", font),
    );
    pdf.build()
}
