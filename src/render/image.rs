//! Image XObject decoding.
//!
//! JPEG data is kept as the original bytes so vector output can embed it
//! unchanged; everything else is decoded to straight RGBA.

use std::io::Cursor;

use base64::Engine as _;
use image::{ImageFormat, RgbaImage};
use lopdf::{Dictionary, Document as LopdfDocument, Object, Stream};

use super::state::{ColorSpace, Rgb};
use crate::parser::objects;

/// Images larger than this many pixels are not decoded.
const MAX_PIXELS: u64 = 64 * 1024 * 1024;

/// Pixel payload of a decoded image.
#[derive(Debug, Clone)]
pub enum ImageData {
    /// Baseline JPEG bytes exactly as stored in the file.
    Jpeg(Vec<u8>),
    /// Straight (not premultiplied) RGBA samples.
    Rgba(RgbaImage),
}

/// An image ready to be painted.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub data: ImageData,
}

impl DecodedImage {
    pub fn from_rgba(image: RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            data: ImageData::Rgba(image),
        }
    }

    /// Pixels as straight RGBA, decoding JPEG data if needed.
    pub fn to_rgba(&self) -> Result<RgbaImage, String> {
        match &self.data {
            ImageData::Rgba(image) => Ok(image.clone()),
            ImageData::Jpeg(bytes) => decode_jpeg(bytes),
        }
    }

    /// `data:` URI: JPEG passes through, samples are encoded as PNG.
    pub fn to_data_uri(&self) -> Result<String, String> {
        let (mime, bytes) = match &self.data {
            ImageData::Jpeg(bytes) => ("image/jpeg", bytes.clone()),
            ImageData::Rgba(image) => ("image/png", encode_png(image)?),
        };
        Ok(format!(
            "data:{};base64,{}",
            mime,
            base64::engine::general_purpose::STANDARD.encode(bytes)
        ))
    }
}

/// Encode RGBA pixels as PNG.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, String> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| e.to_string())?;
    Ok(bytes)
}

fn decode_jpeg(bytes: &[u8]) -> Result<RgbaImage, String> {
    image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
        .map(|img| img.to_rgba8())
        .map_err(|e| format!("JPEG decode failed: {}", e))
}

/// Decode an image XObject. `fill` colours `/ImageMask` stencils.
pub fn decode_image(
    doc: &LopdfDocument,
    stream: &Stream,
    resources: Option<&Dictionary>,
    fill: Rgb,
) -> Result<DecodedImage, String> {
    let dict = &stream.dict;
    let (width, height) = dimensions(doc, dict)?;

    if objects::get_bool(doc, dict, b"ImageMask").unwrap_or(false) {
        let data = image_bytes(doc, stream)?;
        let Encoded::Samples(data) = data else {
            return Err("JPEG-compressed stencil mask".to_string());
        };
        let painted_value = if decode_inverted(doc, dict) { 1 } else { 0 };
        let samples = unpack_samples(&data, width, height, 1, 1)?;
        let [r, g, b] = fill.to_u8();
        let pixels = samples
            .iter()
            .flat_map(|&s| {
                let alpha = if s == painted_value { 255 } else { 0 };
                [r, g, b, alpha]
            })
            .collect();
        return rgba(width, height, pixels).map(DecodedImage::from_rgba);
    }

    let space = match objects::get(doc, dict, b"ColorSpace") {
        Some(obj) => ColorSpace::from_object(doc, obj, resources)?,
        None => ColorSpace::DeviceRgb,
    };
    if space == ColorSpace::Pattern {
        return Err("image in Pattern colour space".to_string());
    }
    let decode = decode_array(doc, dict);
    let alpha = soft_mask(doc, dict, width, height)?;

    match image_bytes(doc, stream)? {
        Encoded::Jpeg(bytes) => {
            let passthrough = alpha.is_none()
                && decode.is_none()
                && matches!(space, ColorSpace::DeviceGray | ColorSpace::DeviceRgb);
            if passthrough {
                return Ok(DecodedImage {
                    width,
                    height,
                    data: ImageData::Jpeg(bytes),
                });
            }
            let mut image = decode_jpeg(&bytes)?;
            if let Some(alpha) = alpha {
                apply_alpha(&mut image, &alpha);
            }
            Ok(DecodedImage::from_rgba(image))
        }
        Encoded::Samples(data) => {
            let bpc = bits_per_component(doc, dict)?;
            let comps = space.components().max(1);
            let samples = unpack_samples(&data, width, height, comps, bpc)?;
            let key = color_key(doc, dict, comps);
            let mut image = to_rgba(&samples, width, height, &space, bpc, decode.as_deref(), key)?;
            if let Some(alpha) = alpha {
                apply_alpha(&mut image, &alpha);
            }
            Ok(DecodedImage::from_rgba(image))
        }
    }
}

enum Encoded {
    Jpeg(Vec<u8>),
    Samples(Vec<u8>),
}

fn image_bytes(doc: &LopdfDocument, stream: &Stream) -> Result<Encoded, String> {
    let filters = objects::filters(doc, stream);
    match filters.last().map(Vec::as_slice) {
        Some(b"DCTDecode") | Some(b"DCT") => {
            if filters.len() == 1 {
                Ok(Encoded::Jpeg(stream.content.clone()))
            } else {
                Err("DCTDecode combined with other filters".to_string())
            }
        }
        Some(
            name @ (b"JPXDecode" | b"CCITTFaxDecode" | b"CCF" | b"JBIG2Decode" | b"RunLengthDecode"
            | b"RL"),
        ) => Err(format!(
            "unsupported image filter /{}",
            String::from_utf8_lossy(name)
        )),
        _ => objects::stream_data(stream)
            .map(Encoded::Samples)
            .map_err(|e| format!("image data unreadable: {}", e)),
    }
}

fn dimensions(doc: &LopdfDocument, dict: &Dictionary) -> Result<(u32, u32), String> {
    let width = objects::get_int(doc, dict, b"Width").unwrap_or(0);
    let height = objects::get_int(doc, dict, b"Height").unwrap_or(0);
    if width <= 0 || height <= 0 {
        return Err(format!("invalid image size {}x{}", width, height));
    }
    if width as u64 * height as u64 > MAX_PIXELS {
        return Err(format!("image too large ({}x{})", width, height));
    }
    Ok((width as u32, height as u32))
}

fn bits_per_component(doc: &LopdfDocument, dict: &Dictionary) -> Result<u8, String> {
    match objects::get_int(doc, dict, b"BitsPerComponent").unwrap_or(8) {
        bpc @ (1 | 2 | 4 | 8 | 16) => Ok(bpc as u8),
        other => Err(format!("unsupported BitsPerComponent {}", other)),
    }
}

fn decode_array(doc: &LopdfDocument, dict: &Dictionary) -> Option<Vec<f64>> {
    objects::get_array(doc, dict, b"Decode").and_then(|items| objects::numbers(doc, items))
}

fn decode_inverted(doc: &LopdfDocument, dict: &Dictionary) -> bool {
    matches!(decode_array(doc, dict).as_deref(), Some([d0, d1, ..]) if d0 > d1)
}

/// Unpack `comps` samples of `bpc` bits per pixel; rows are byte aligned.
/// Short data is padded with zeros.
fn unpack_samples(
    data: &[u8],
    width: u32,
    height: u32,
    comps: usize,
    bpc: u8,
) -> Result<Vec<u16>, String> {
    if data.is_empty() {
        return Err("image has no data".to_string());
    }
    let per_row = width as usize * comps;
    let stride = (per_row * bpc as usize).div_ceil(8);
    let mut samples = Vec::with_capacity(per_row * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let line = data.get(start..(start + stride).min(data.len())).unwrap_or(&[]);
        for i in 0..per_row {
            let value = match bpc {
                8 => line.get(i).copied().unwrap_or(0) as u16,
                16 => {
                    let hi = line.get(i * 2).copied().unwrap_or(0) as u16;
                    let lo = line.get(i * 2 + 1).copied().unwrap_or(0) as u16;
                    (hi << 8) | lo
                }
                _ => {
                    let bit = i * bpc as usize;
                    let byte = line.get(bit / 8).copied().unwrap_or(0);
                    let shift = 8 - bpc as usize - (bit % 8);
                    ((byte >> shift) & ((1u16 << bpc) - 1) as u8) as u16
                }
            };
            samples.push(value);
        }
    }
    Ok(samples)
}

/// `/Mask` colour key ranges as integer sample bounds.
fn color_key(doc: &LopdfDocument, dict: &Dictionary, comps: usize) -> Option<Vec<(u16, u16)>> {
    let items = match objects::get(doc, dict, b"Mask")? {
        Object::Array(items) => objects::numbers(doc, items)?,
        _ => return None,
    };
    if items.len() < comps * 2 {
        return None;
    }
    Some(
        items
            .chunks(2)
            .take(comps)
            .map(|pair| (pair[0].max(0.0) as u16, pair[1].max(0.0) as u16))
            .collect(),
    )
}

fn to_rgba(
    samples: &[u16],
    width: u32,
    height: u32,
    space: &ColorSpace,
    bpc: u8,
    decode: Option<&[f64]>,
    key: Option<Vec<(u16, u16)>>,
) -> Result<RgbaImage, String> {
    let comps = space.components().max(1);
    let max = ((1u32 << bpc) - 1) as f64;
    let ranges: Vec<(f64, f64)> = (0..comps)
        .map(|i| match decode {
            Some(d) if d.len() >= (i + 1) * 2 => (d[i * 2], d[i * 2 + 1]),
            _ => space.decode_range(bpc),
        })
        .collect();
    let identity = decode.is_none() && bpc == 8;

    let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
    let mut values = vec![0.0; comps];
    for pixel in samples.chunks_exact(comps) {
        let keyed = key.as_ref().is_some_and(|key| {
            pixel
                .iter()
                .zip(key)
                .all(|(v, (lo, hi))| *v >= *lo && *v <= *hi)
        });
        let [r, g, b] = match (space, identity) {
            (ColorSpace::DeviceRgb, true) => [pixel[0] as u8, pixel[1] as u8, pixel[2] as u8],
            (ColorSpace::DeviceGray, true) => [pixel[0] as u8; 3],
            _ => {
                for (i, v) in pixel.iter().enumerate() {
                    let (lo, hi) = ranges[i];
                    values[i] = lo + *v as f64 * (hi - lo) / max;
                }
                space.to_rgb(&values).to_u8()
            }
        };
        pixels.extend_from_slice(&[r, g, b, if keyed { 0 } else { 255 }]);
    }
    rgba(width, height, pixels)
}

fn rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<RgbaImage, String> {
    RgbaImage::from_raw(width, height, pixels)
        .ok_or_else(|| "image buffer size mismatch".to_string())
}

/// Alpha channel from `/SMask`, or from a stencil `/Mask` stream.
fn soft_mask(
    doc: &LopdfDocument,
    dict: &Dictionary,
    width: u32,
    height: u32,
) -> Result<Option<Vec<u8>>, String> {
    if let Some(smask) = objects::get_stream(doc, dict, b"SMask") {
        let (w, h) = dimensions(doc, &smask.dict)?;
        let bpc = bits_per_component(doc, &smask.dict)?;
        let alpha = match image_bytes(doc, smask)? {
            Encoded::Jpeg(bytes) => image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg)
                .map_err(|e| format!("soft mask decode failed: {}", e))?
                .to_luma8()
                .into_raw(),
            Encoded::Samples(data) => {
                let max = ((1u32 << bpc) - 1) as f64;
                let inverted = decode_inverted(doc, &smask.dict);
                unpack_samples(&data, w, h, 1, bpc)?
                    .into_iter()
                    .map(|v| {
                        let a = (v as f64 / max * 255.0).round() as u8;
                        if inverted {
                            255 - a
                        } else {
                            a
                        }
                    })
                    .collect()
            }
        };
        return Ok(Some(resample(&alpha, w, h, width, height)));
    }

    if let Some(mask) = objects::get_stream(doc, dict, b"Mask") {
        let (w, h) = dimensions(doc, &mask.dict)?;
        let Encoded::Samples(data) = image_bytes(doc, mask)? else {
            return Err("JPEG-compressed stencil mask".to_string());
        };
        let painted_value = if decode_inverted(doc, &mask.dict) { 1 } else { 0 };
        let alpha: Vec<u8> = unpack_samples(&data, w, h, 1, 1)?
            .into_iter()
            .map(|v| if v == painted_value { 255 } else { 0 })
            .collect();
        return Ok(Some(resample(&alpha, w, h, width, height)));
    }

    Ok(None)
}

/// Nearest-neighbour resize of a single-channel plane.
fn resample(plane: &[u8], w: u32, h: u32, width: u32, height: u32) -> Vec<u8> {
    if w == width && h == height {
        return plane.to_vec();
    }
    let mut out = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height as u64 {
        let sy = (y * h as u64 / height as u64) as usize;
        for x in 0..width as u64 {
            let sx = (x * w as u64 / width as u64) as usize;
            out.push(plane.get(sy * w as usize + sx).copied().unwrap_or(255));
        }
    }
    out
}

fn apply_alpha(image: &mut RgbaImage, alpha: &[u8]) {
    for (pixel, a) in image.pixels_mut().zip(alpha) {
        pixel.0[3] = ((pixel.0[3] as u16 * *a as u16) / 255) as u8;
    }
}
