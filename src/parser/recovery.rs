//! Cross-reference recovery by linear scan.
//!
//! When the xref table or trailer is missing or damaged, the object headers
//! (`N G obj`) are still in the file. The scan records the offset of the
//! last definition of every object number, finds the catalog, and appends a
//! fresh xref section and trailer after the original bytes, so every offset
//! in the original file stays valid.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::OnceLock;

use regex::bytes::Regex;

use crate::detect::find;
use crate::error::LoadError;

/// Object numbers above this are not valid PDF object numbers.
const MAX_OBJECT_NUMBER: u32 = 8_388_607;

/// How far past an object header the catalog marker is looked for.
const CATALOG_PROBE_LEN: usize = 4096;

/// Result of a successful scan.
#[derive(Debug, Clone)]
pub struct RecoveredXref {
    /// Original bytes followed by the synthesized xref section and trailer.
    pub bytes: Vec<u8>,
    /// Number of distinct objects located by the scan.
    pub object_count: usize,
    /// The catalog object used as `/Root`.
    pub root: (u32, u16),
}

fn object_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?-u)(\d{1,10})[ \t\r\n\x0C\x00]+(\d{1,5})[ \t\r\n\x0C\x00]+obj\b")
            .expect("object header pattern is valid")
    })
}

fn catalog_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?-u)/Type\s*/Catalog\b").expect("catalog pattern is valid")
    })
}

/// Scan `data` for object definitions and rebuild a loadable document.
pub fn rebuild(data: &[u8]) -> Result<RecoveredXref, LoadError> {
    let objects = scan_objects(data);
    if objects.is_empty() {
        return Err(LoadError::Malformed(
            "no object definitions found during recovery".to_string(),
        ));
    }

    let root = find_catalog(data, &objects)
        .ok_or_else(|| LoadError::Malformed("no document catalog found".to_string()))?;

    let size = objects.keys().next_back().map(|n| n + 1).unwrap_or(1);
    let section = xref_section(&objects);

    let mut bytes = Vec::with_capacity(data.len() + section.len() + 128);
    bytes.extend_from_slice(data);
    if !bytes.ends_with(b"\n") {
        bytes.push(b'\n');
    }
    let xref_offset = bytes.len();
    bytes.extend_from_slice(section.as_bytes());
    let trailer = format!(
        "trailer\n<< /Size {} /Root {} {} R >>\nstartxref\n{}\n%%EOF\n",
        size, root.0, root.1, xref_offset
    );
    bytes.extend_from_slice(trailer.as_bytes());

    log::debug!(
        "Rebuilt xref with {} objects, root {} {} R",
        objects.len(),
        root.0,
        root.1
    );

    Ok(RecoveredXref {
        bytes,
        object_count: objects.len(),
        root,
    })
}

/// One subsection per run of consecutive object numbers, so the table only
/// grows with the objects actually found.
fn xref_section(objects: &BTreeMap<u32, (u16, usize)>) -> String {
    let mut section = String::with_capacity(objects.len() * 20 + 64);
    section.push_str("xref\n0 1\n0000000000 65535 f \n");

    let mut run: Vec<(u16, usize)> = Vec::new();
    let mut run_start = 0;
    for (&number, &entry) in objects.range(1..) {
        if run.is_empty() || number != run_start + run.len() as u32 {
            write_subsection(&mut section, run_start, &run);
            run.clear();
            run_start = number;
        }
        run.push(entry);
    }
    write_subsection(&mut section, run_start, &run);
    section
}

fn write_subsection(section: &mut String, start: u32, entries: &[(u16, usize)]) {
    if entries.is_empty() {
        return;
    }
    let _ = writeln!(section, "{} {}", start, entries.len());
    for (generation, offset) in entries {
        let _ = write!(section, "{:010} {:05} n \n", offset, generation);
    }
}

/// Map object number to (generation, offset) for the last definition.
fn scan_objects(data: &[u8]) -> BTreeMap<u32, (u16, usize)> {
    let mut objects = BTreeMap::new();
    for caps in object_header().captures_iter(data) {
        let (Some(num), Some(gen)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        // A digit right before the match means we landed inside a longer number.
        if num.start() > 0 && data[num.start() - 1].is_ascii_digit() {
            continue;
        }
        let number = parse_ascii::<u32>(num.as_bytes());
        let generation = parse_ascii::<u16>(gen.as_bytes());
        if let (Some(number), Some(generation)) = (number, generation) {
            if number == 0 || number > MAX_OBJECT_NUMBER {
                continue;
            }
            objects.insert(number, (generation, num.start()));
        }
    }
    objects
}

fn find_catalog(data: &[u8], objects: &BTreeMap<u32, (u16, usize)>) -> Option<(u32, u16)> {
    let mut best: Option<(usize, (u32, u16))> = None;
    for (&number, &(generation, offset)) in objects {
        let window_end = (offset + CATALOG_PROBE_LEN).min(data.len());
        let window = &data[offset..window_end];
        let body = match find(window, b"endobj") {
            Some(end) => &window[..end],
            None => window,
        };
        if catalog_marker().is_match(body) {
            // Prefer the catalog defined last in the file (incremental updates).
            if best.map_or(true, |(best_offset, _)| offset > best_offset) {
                best = Some((offset, (number, generation)));
            }
        }
    }
    best.map(|(_, id)| id)
}

fn parse_ascii<T: std::str::FromStr>(bytes: &[u8]) -> Option<T> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BROKEN: &[u8] = b"%PDF-1.4\n\
1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n\
3 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 100] >>\nendobj\n\
xref\n0 4\ngarbage\n";

    #[test]
    fn test_scan_finds_all_objects() {
        let objects = scan_objects(BROKEN);
        assert_eq!(objects.len(), 3);
        assert_eq!(objects[&1].1, 9);
    }

    #[test]
    fn test_last_definition_wins() {
        let data = b"%PDF-1.4\n4 0 obj\n(old)\nendobj\n4 0 obj\n(new)\nendobj\n";
        let objects = scan_objects(data);
        let offset = objects[&4].1;
        assert!(data[offset..].starts_with(b"4 0 obj\n(new)"));
    }

    #[test]
    fn test_rebuild_appends_xref_and_trailer() {
        let recovered = rebuild(BROKEN).unwrap();
        assert_eq!(recovered.root, (1, 0));
        assert_eq!(recovered.object_count, 3);
        assert!(recovered.bytes.starts_with(BROKEN));
        let tail = String::from_utf8_lossy(&recovered.bytes[BROKEN.len()..]).to_string();
        assert!(tail.contains("xref\n0 1\n0000000000 65535 f \n1 3\n"));
        assert!(tail.contains("0000000009 00000 n \n"));
        assert!(tail.contains("/Root 1 0 R"));
        assert!(tail.ends_with("%%EOF\n"));
    }

    #[test]
    fn test_xref_skips_gaps_in_object_numbers() {
        let mut data = BROKEN.to_vec();
        let stray = data.len();
        data.extend_from_slice(b"8000000 0 obj\n(stray)\nendobj\n");

        let recovered = rebuild(&data).unwrap();
        assert_eq!(recovered.object_count, 4);
        let tail = String::from_utf8_lossy(&recovered.bytes[data.len()..]).to_string();
        assert!(tail.contains(&format!("8000000 1\n{:010} 00000 n \n", stray)));
        assert!(tail.contains("/Size 8000001"));
        assert!(tail.len() < 512, "xref section is {} bytes", tail.len());
    }

    #[test]
    fn test_rebuild_without_catalog_fails() {
        let data = b"%PDF-1.4\n1 0 obj\n<< /Type /Pages >>\nendobj\n";
        assert!(matches!(rebuild(data), Err(LoadError::Malformed(_))));
    }

    #[test]
    fn test_rebuild_without_objects_fails() {
        assert!(matches!(
            rebuild(b"%PDF-1.4\nnothing here"),
            Err(LoadError::Malformed(_))
        ));
    }
}
