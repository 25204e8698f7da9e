//! Helpers for reading lopdf objects.
//!
//! PDF values may appear directly or behind indirect references almost
//! anywhere; these helpers resolve references and coerce values so the
//! loader and the renderer never match on `lopdf::Object` by hand.

use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId, Stream};

use crate::geometry::{Matrix, Rect};

/// Maximum number of `/Parent` hops followed for inherited page attributes.
const MAX_TREE_DEPTH: usize = 64;

/// Follow an indirect reference (one or more hops) to the object it names.
pub fn resolve<'a>(doc: &'a LopdfDocument, obj: &'a Object) -> Option<&'a Object> {
    let mut current = obj;
    for _ in 0..8 {
        match current {
            Object::Reference(id) => current = doc.get_object(*id).ok()?,
            other => return Some(other),
        }
    }
    None
}

/// Look up `key` in `dict` and resolve the value.
pub fn get<'a>(doc: &'a LopdfDocument, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().and_then(|obj| resolve(doc, obj))
}

pub fn get_dict<'a>(
    doc: &'a LopdfDocument,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Dictionary> {
    match get(doc, dict, key)? {
        Object::Dictionary(d) => Some(d),
        Object::Stream(s) => Some(&s.dict),
        _ => None,
    }
}

pub fn get_stream<'a>(doc: &'a LopdfDocument, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Stream> {
    match get(doc, dict, key)? {
        Object::Stream(s) => Some(s),
        _ => None,
    }
}

pub fn get_array<'a>(
    doc: &'a LopdfDocument,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Vec<Object>> {
    get(doc, dict, key)?.as_array().ok()
}

pub fn get_name<'a>(doc: &'a LopdfDocument, dict: &'a Dictionary, key: &[u8]) -> Option<&'a [u8]> {
    get(doc, dict, key)?.as_name().ok()
}

pub fn get_number(doc: &LopdfDocument, dict: &Dictionary, key: &[u8]) -> Option<f64> {
    get(doc, dict, key).and_then(number)
}

pub fn get_int(doc: &LopdfDocument, dict: &Dictionary, key: &[u8]) -> Option<i64> {
    match get(doc, dict, key)? {
        Object::Integer(i) => Some(*i),
        Object::Real(r) => Some(*r as i64),
        _ => None,
    }
}

pub fn get_bool(doc: &LopdfDocument, dict: &Dictionary, key: &[u8]) -> Option<bool> {
    match get(doc, dict, key)? {
        Object::Boolean(b) => Some(*b),
        _ => None,
    }
}

/// Coerce a direct numeric object.
pub fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Read an array of numbers, resolving references element-wise.
pub fn numbers(doc: &LopdfDocument, items: &[Object]) -> Option<Vec<f64>> {
    items
        .iter()
        .map(|item| resolve(doc, item).and_then(number))
        .collect()
}

/// Read a `[x0 y0 x1 y1]` rectangle.
pub fn rect(doc: &LopdfDocument, obj: &Object) -> Option<Rect> {
    let values = numbers(doc, resolve(doc, obj)?.as_array().ok()?)?;
    match values.as_slice() {
        [x0, y0, x1, y1] if values.iter().all(|v| v.is_finite()) => {
            Some(Rect::new(*x0, *y0, *x1, *y1))
        }
        _ => None,
    }
}

/// Read a six-number `/Matrix` entry.
pub fn matrix(doc: &LopdfDocument, obj: &Object) -> Option<Matrix> {
    let values = numbers(doc, resolve(doc, obj)?.as_array().ok()?)?;
    Matrix::from_slice(&values).filter(Matrix::is_finite)
}

/// Look up a page attribute, walking up the page tree for inheritable keys
/// (`MediaBox`, `CropBox`, `Rotate`, `Resources`).
pub fn get_inherited<'a>(
    doc: &'a LopdfDocument,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut dict = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Some(value) = get(doc, dict, key) {
            return Some(value);
        }
        let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
        dict = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Decoded stream payload. Unfiltered streams are returned as-is.
pub fn stream_data(stream: &Stream) -> Result<Vec<u8>, String> {
    if stream.dict.get(b"Filter").is_err() {
        return Ok(stream.content.clone());
    }
    stream.decompressed_content().map_err(|e| e.to_string())
}

/// The names in a stream's `/Filter` entry, in application order.
pub fn filters(doc: &LopdfDocument, stream: &Stream) -> Vec<Vec<u8>> {
    match get(doc, &stream.dict, b"Filter") {
        Some(Object::Name(name)) => vec![name.clone()],
        Some(Object::Array(items)) => items
            .iter()
            .filter_map(|item| resolve(doc, item)?.as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

/// Simple text decoding fallback when no font encoding is available.
pub fn decode_text_simple(bytes: &[u8]) -> String {
    // UTF-16BE with BOM
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }

    // Latin-1
    bytes.iter().map(|&b| b as char).collect()
}
