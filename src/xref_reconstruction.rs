//! Cross-reference reconstruction for damaged files.
//!
//! When `startxref` is missing or points at garbage, the file is scanned for
//! `N G obj` headers. Later headers for the same number win, matching the
//! append-only way incremental updates redefine objects.

use lazy_static::lazy_static;

use crate::dict_scan;
use crate::error::{Error, Result};
use crate::parser::parse_indirect_object;
use crate::utils::bytes_to_latin1;
use crate::xref::{CrossRefTable, XRefEntry};

lazy_static! {
    /// "N G obj" object headers
    static ref RE_OBJ_PATTERN: regex::bytes::Regex =
        regex::bytes::Regex::new(r"(\d+)\s+(\d+)\s+obj(?-u:\b)").expect("valid regex");

    /// "trailer <<" dictionaries
    static ref RE_TRAILER: regex::bytes::Regex =
        regex::bytes::Regex::new(r"trailer\s*<<").expect("valid regex");
}

/// Rebuild a cross-reference table, trailer included, by scanning `bytes`.
pub fn reconstruct_xref(bytes: &[u8]) -> Result<CrossRefTable> {
    log::info!("Reconstructing xref table by scanning {} bytes", bytes.len());

    let mut xref = CrossRefTable::new();
    for capture in RE_OBJ_PATTERN.captures_iter(bytes) {
        let (Some(whole), Some(num), Some(gen)) = (capture.get(0), capture.get(1), capture.get(2))
        else {
            continue;
        };
        // A header glued to a preceding digit ("12 0 obj" inside "112 0 obj") is not a header.
        if whole.start() > 0 && bytes[whole.start() - 1].is_ascii_digit() {
            continue;
        }
        let parsed = std::str::from_utf8(num.as_bytes())
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .zip(std::str::from_utf8(gen.as_bytes()).ok().and_then(|s| s.parse::<u16>().ok()));
        let Some((id, generation)) = parsed else {
            log::debug!("skipping unparseable object header at {}", whole.start());
            continue;
        };
        if !starts_like_object(&bytes[whole.end()..]) {
            log::debug!("skipping false positive object header at {}", whole.start());
            continue;
        }
        xref.add_entry(
            id,
            XRefEntry::InUse {
                offset: whole.start() as u64,
                gen: generation,
            },
        );
    }

    if xref.is_empty() {
        return Err(Error::InvalidPdf("No objects found during xref reconstruction".to_string()));
    }
    log::info!("Reconstructed xref with {} objects", xref.len());

    let trailer = find_trailer(bytes).or_else(|| synthesize_trailer(bytes, &xref)).ok_or_else(
        || Error::InvalidPdf("Could not find catalog in reconstructed xref".to_string()),
    )?;
    xref.set_trailer(trailer);
    Ok(xref)
}

/// The byte after `obj` must be able to start a value.
fn starts_like_object(rest: &[u8]) -> bool {
    match rest.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(&b) => matches!(b, b'<' | b'[' | b'(' | b'/' | b't' | b'f' | b'n' | b'-' | b'+' | b'.')
            || b.is_ascii_digit(),
        None => false,
    }
}

/// Last `trailer << ... >>` that names a `/Root`.
fn find_trailer(bytes: &[u8]) -> Option<String> {
    RE_TRAILER
        .find_iter(bytes)
        .filter_map(|m| {
            let dict_start = m.end() - 2;
            dict_scan::value_span(bytes, dict_start).map(|span| bytes_to_latin1(&bytes[span]))
        })
        .filter(|t| dict_scan::ref_after("/Root", t).is_some())
        .last()
}

/// Minimal `<< /Size n /Root r >>` built around the first catalog found.
fn synthesize_trailer(bytes: &[u8], xref: &CrossRefTable) -> Option<String> {
    let mut numbers: Vec<u32> = xref.iter().map(|(n, _)| n).collect();
    numbers.sort_unstable();
    let max = numbers.last().copied().unwrap_or(0);

    for num in numbers {
        let Some(XRefEntry::InUse { offset, .. }) = xref.get(num) else {
            continue;
        };
        let Ok(obj) = parse_indirect_object(bytes, *offset as usize) else {
            continue;
        };
        if dict_scan::name_after("/Type", &obj.body) == Some("/Catalog") {
            log::info!("Using {} as catalog for synthesized trailer", obj.obj_ref);
            return Some(format!("<< /Size {} /Root {} >>", max + 1, obj.obj_ref));
        }
    }
    None
}
