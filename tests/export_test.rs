//! Vector and thumbnail exporters on real pages.

mod common;

use std::io::Read;

use base64::Engine as _;
use flate2::read::GzDecoder;
use image::GenericImageView;

use pdfslides::export::PageExporter;
use pdfslides::{
    load_bytes, ArtifactFormat, ArtifactKind, RenderError, ThumbnailError, ThumbnailGenerator,
    ThumbnailOptions, VectorExporter, VectorFormat, VectorOptions,
};

fn svg_text(bytes: &[u8]) -> &str {
    std::str::from_utf8(bytes).unwrap()
}

#[test]
fn test_vector_export_is_standalone_svg() {
    let doc = load_bytes(&common::deck(2)).unwrap();
    let page = doc.page(1).unwrap();
    let artifact = VectorExporter::default().export(&page).unwrap();

    assert_eq!(artifact.kind, ArtifactKind::Vector);
    assert_eq!(artifact.format, ArtifactFormat::Svg);
    assert_eq!(artifact.page_index, 1);
    assert_eq!((artifact.width, artifact.height), (400.0, 300.0));
    assert!(!artifact.is_degraded());

    let svg = svg_text(&artifact.bytes);
    assert!(svg.starts_with("<?xml"));
    assert!(svg.contains(r#"width="400pt" height="300pt" viewBox="0 0 400 300""#));
    assert!(svg.contains(r##"fill="#3366cc""##));
    assert!(svg.contains(">Slide 2</text>"));
    assert!(svg.trim_end().ends_with("</svg>"));
}

#[test]
fn test_vector_export_is_deterministic() {
    let data = common::deck(1);
    let first = {
        let doc = load_bytes(&data).unwrap();
        VectorExporter::default().export(&doc.page(0).unwrap()).unwrap()
    };
    let second = {
        let doc = load_bytes(&data).unwrap();
        VectorExporter::default().export(&doc.page(0).unwrap()).unwrap()
    };
    assert_eq!(first.bytes, second.bytes);
}

#[test]
fn test_jpeg_embedded_unchanged() {
    let jpeg = common::jpeg(16, 12);
    let doc = load_bytes(&common::page_with_jpeg(&jpeg, 16, 12)).unwrap();
    let artifact = VectorExporter::default().export(&doc.page(0).unwrap()).unwrap();

    let svg = svg_text(&artifact.bytes);
    let encoded = base64::engine::general_purpose::STANDARD.encode(&jpeg);
    assert!(svg.contains(&format!("data:image/jpeg;base64,{}", encoded)));
    assert_eq!(svg.matches("<image ").count(), 1);
}

#[test]
fn test_svgz_output() {
    let doc = load_bytes(&common::deck(1)).unwrap();
    let page = doc.page(0).unwrap();
    let plain = VectorExporter::default().export(&page).unwrap();
    let packed = VectorExporter::new(VectorOptions::new().with_format(VectorFormat::Svgz))
        .export(&page)
        .unwrap();

    assert_eq!(packed.format, ArtifactFormat::Svgz);
    assert_eq!(packed.suggested_filename(), "page-0.svgz");
    let mut unpacked = Vec::new();
    GzDecoder::new(packed.bytes.as_slice())
        .read_to_end(&mut unpacked)
        .unwrap();
    assert_eq!(unpacked, plain.bytes);
}

#[test]
fn test_vector_export_of_corrupt_page_fails() {
    let doc = load_bytes(&common::deck_with_corrupt_page()).unwrap();
    let exporter = VectorExporter::default();

    assert!(exporter.export_page(&doc.page(0).unwrap()).is_ok());
    let err = exporter.export_page(&doc.page(1).unwrap()).unwrap_err();
    assert!(matches!(
        err,
        pdfslides::ExportError::Render(RenderError::CorruptContentStream(_))
    ));
}

#[test]
fn test_missing_xobject_is_listed_on_artifact() {
    let doc = load_bytes(&common::page_with_missing_xobject()).unwrap();
    let artifact = VectorExporter::default().export(&doc.page(0).unwrap()).unwrap();
    assert!(artifact.is_degraded());
    assert!(artifact.warnings.iter().any(|w| w.message.contains("Im9")));
}

#[test]
fn test_thumbnail_fits_box() {
    let doc = load_bytes(&common::deck(1)).unwrap();
    let page = doc.page(0).unwrap();
    let artifact = ThumbnailGenerator::default()
        .thumbnail(&page, 200, 200, 80)
        .unwrap();

    assert_eq!(artifact.kind, ArtifactKind::Thumbnail);
    assert_eq!(artifact.format, ArtifactFormat::Jpeg);
    assert_eq!((artifact.width, artifact.height), (200.0, 150.0));
    assert_eq!(&artifact.bytes[..2], &[0xFF, 0xD8]);

    let decoded = image::load_from_memory(&artifact.bytes).unwrap();
    assert_eq!(decoded.dimensions(), (200, 150));

    // slide background, away from the frame and title
    let [r, g, b, _] = decoded.get_pixel(100, 90).0;
    assert!(b > 150 && r < 100 && g < 150, "got {:?}", (r, g, b));
}

#[test]
fn test_thumbnail_padded_to_box() {
    let doc = load_bytes(&common::deck(1)).unwrap();
    let page = doc.page(0).unwrap();
    let generator = ThumbnailGenerator::new(ThumbnailOptions::new().with_pad_to_box(true));
    let artifact = generator.thumbnail(&page, 200, 200, 90).unwrap();

    let decoded = image::load_from_memory(&artifact.bytes).unwrap();
    assert_eq!(decoded.dimensions(), (200, 200));

    // letterbox bands are white
    let [r, g, b, _] = decoded.get_pixel(100, 5).0;
    assert!(r > 230 && g > 230 && b > 230, "got {:?}", (r, g, b));
}

#[test]
fn test_thumbnail_within_limits_for_portrait_page() {
    let mut pdf = common::PdfBuilder::new();
    pdf.page([0.0, 0.0, 612.0, 792.0], "0 0 0 rg 0 0 612 792 re f", "<< >>");
    let doc = load_bytes(&pdf.build()).unwrap();

    let artifact = ThumbnailGenerator::default()
        .with_limits(320, 240, 75)
        .export_page(&doc.page(0).unwrap())
        .unwrap();
    let decoded = image::load_from_memory(&artifact.bytes).unwrap();
    let (w, h) = decoded.dimensions();
    assert!(w <= 320 && h <= 240);
    assert_eq!(h, 240);
}

#[test]
fn test_thumbnail_rejects_empty_box() {
    let doc = load_bytes(&common::deck(1)).unwrap();
    let err = ThumbnailGenerator::default()
        .thumbnail(&doc.page(0).unwrap(), 0, 100, 75)
        .unwrap_err();
    assert!(matches!(err, ThumbnailError::InvalidDimensions(_)));
}

#[test]
fn test_thumbnail_of_corrupt_page_fails() {
    let doc = load_bytes(&common::deck_with_corrupt_page()).unwrap();
    let err = ThumbnailGenerator::default()
        .thumbnail(&doc.page(1).unwrap(), 100, 100, 75)
        .unwrap_err();
    assert!(matches!(
        err,
        ThumbnailError::Render(RenderError::CorruptContentStream(_))
    ));
}

#[test]
fn test_embedded_glyphs_are_shared_shapes() {
    let data = common::page_with_cid_font(Some(&common::square_font()), "00010001");
    let doc = load_bytes(&data).unwrap();
    let artifact = VectorExporter::default().export(&doc.page(0).unwrap()).unwrap();
    assert!(!artifact.is_degraded(), "got {:?}", artifact.warnings);

    let svg = svg_text(&artifact.bytes);
    assert_eq!(svg.matches(r#"<path id="g"#).count(), 1);
    assert_eq!(svg.matches(r##"<use xlink:href="#g"##).count(), 2);
    assert!(!svg.contains("<text"));
    assert!(!svg.contains("<image "));
}

#[test]
fn test_embedded_glyphs_in_thumbnail() {
    let data = common::page_with_cid_font(Some(&common::square_font()), "00010001");
    let doc = load_bytes(&data).unwrap();
    let artifact = ThumbnailGenerator::default()
        .thumbnail(&doc.page(0).unwrap(), 200, 200, 90)
        .unwrap();
    let decoded = image::load_from_memory(&artifact.bytes).unwrap();
    assert_eq!(decoded.dimensions(), (200, 150));

    // both squares, 700 units apart per /W, with white between them
    let dark = |x, y| decoded.get_pixel(x, y).0[0] < 80;
    assert!(dark(32, 93));
    assert!(dark(46, 93));
    assert!(!dark(39, 93));
    assert!(!dark(100, 40));
}

#[test]
fn test_glyphs_without_program_or_mapping_get_placeholders() {
    let doc = load_bytes(&common::page_with_cid_font(None, "00410042")).unwrap();
    let page = doc.page(0).unwrap();

    let artifact = VectorExporter::default().export(&page).unwrap();
    assert!(artifact.is_degraded());
    assert!(artifact
        .warnings
        .iter()
        .any(|w| w.message.contains("placeholder bars")));
    let svg = svg_text(&artifact.bytes);
    assert!(svg.contains("data:image/png;base64,"));

    let thumb = ThumbnailGenerator::default()
        .thumbnail(&page, 200, 200, 90)
        .unwrap();
    assert!(thumb.is_degraded());
    let decoded = image::load_from_memory(&thumb.bytes).unwrap();
    assert!(decoded.get_pixel(33, 95).0[0] < 80);
}
