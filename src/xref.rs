//! Cross-reference reader.
//!
//! Maps object numbers to byte offsets (or object stream slots). Handles
//! traditional `xref` tables, cross-reference streams (`/Type /XRef`),
//! hybrid files that carry both (`/XRefStm`), and incremental-update chains
//! linked through `/Prev`, where newer sections win.
//!
//! Trailers are kept as dictionary text, like every other body.

use std::collections::{HashMap, HashSet};

use crate::decoders::decode_stream;
use crate::dict_scan;
use crate::error::{Error, Result};
use crate::lexer::{token_at, Token};
use crate::parser::parse_indirect_object;
use crate::parser_config::ParserOptions;
use crate::utils::{bytes_to_latin1, rfind_bytes};

/// Largest subsection accepted from a traditional table.
const MAX_SUBSECTION_COUNT: i64 = 1_000_000;

/// Cross-reference table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Free (deleted or never used) object number
    Free,
    /// Uncompressed object at a byte offset
    InUse {
        /// Byte offset of the `N G obj` header
        offset: u64,
        /// Generation number
        gen: u16,
    },
    /// Object stored inside an object stream
    Compressed {
        /// Object number of the containing `/Type /ObjStm`
        stream: u32,
        /// Index within the object stream
        index: u32,
    },
}

/// Cross-reference table that maps object numbers to their locations.
#[derive(Debug, Clone, Default)]
pub struct CrossRefTable {
    pub(crate) entries: HashMap<u32, XRefEntry>,
    /// Trailer dictionary text (for xref streams, the stream dictionary)
    trailer: Option<String>,
}

impl CrossRefTable {
    /// Create a new empty cross-reference table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the trailer dictionary.
    pub fn set_trailer(&mut self, trailer: String) {
        self.trailer = Some(trailer);
    }

    /// Get the trailer dictionary if present.
    pub fn trailer(&self) -> Option<&str> {
        self.trailer.as_deref()
    }

    /// Add an entry to the cross-reference table.
    pub fn add_entry(&mut self, object_number: u32, entry: XRefEntry) {
        self.entries.insert(object_number, entry);
    }

    /// Get an entry by object number.
    pub fn get(&self, object_number: u32) -> Option<&XRefEntry> {
        self.entries.get(&object_number)
    }

    /// Iterate over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &XRefEntry)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    /// Fill in entries from an older section. Entries already present win.
    pub fn merge_from(&mut self, older: CrossRefTable) {
        for (num, entry) in older.entries {
            self.entries.entry(num).or_insert(entry);
        }
        if self.trailer.is_none() {
            self.trailer = older.trailer;
        }
    }

    /// Get the number of entries in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Find the offset recorded after the last `startxref` in the final 2 KB.
pub fn find_xref_offset(bytes: &[u8]) -> Result<u64> {
    let tail_start = bytes.len().saturating_sub(2048);
    let tail = &bytes[tail_start..];
    let pos = rfind_bytes(tail, b"startxref").ok_or(Error::InvalidXref)?;

    match token_at(tail, pos + b"startxref".len()) {
        Some(tok) => match tok.token {
            Token::Integer(n) if n >= 0 => Ok(n as u64),
            _ => Err(Error::InvalidXref),
        },
        None => Err(Error::InvalidXref),
    }
}

/// Read the cross-reference chain starting at `offset`.
pub fn parse_xref(bytes: &[u8], offset: u64, options: &ParserOptions) -> Result<CrossRefTable> {
    let mut visited = HashSet::new();
    parse_xref_recursive(bytes, offset, 0, &mut visited, options)
}

fn parse_xref_recursive(
    bytes: &[u8],
    offset: u64,
    depth: u32,
    visited: &mut HashSet<u64>,
    options: &ParserOptions,
) -> Result<CrossRefTable> {
    if depth > options.max_prev_depth {
        return Err(Error::RecursionLimitExceeded(options.max_prev_depth));
    }
    if !visited.insert(offset) {
        log::warn!("xref /Prev loop at offset {}", offset);
        return Ok(CrossRefTable::new());
    }
    let start = usize::try_from(offset).map_err(|_| Error::InvalidXref)?;
    if start >= bytes.len() {
        return Err(Error::InvalidXref);
    }

    let mut xref = match token_at(bytes, start).map(|t| t.token) {
        Some(Token::Keyword(b"xref")) => {
            log::debug!("traditional xref at offset {}", offset);
            let mut table = parse_traditional_xref(bytes, start)?;
            // Hybrid file: the stream holds objects the table does not list.
            let stm = table
                .trailer()
                .and_then(|t| dict_scan::literal_after("/XRefStm", t))
                .and_then(|l| l.as_integer());
            if let Some(stm_offset) = stm {
                match parse_xref_stream(bytes, stm_offset as usize, options) {
                    Ok(stream_table) => {
                        for (num, entry) in stream_table.entries {
                            table.entries.entry(num).or_insert(entry);
                        }
                    },
                    Err(e) => log::warn!("ignoring unreadable /XRefStm: {}", e),
                }
            }
            table
        },
        Some(Token::Integer(_)) => {
            log::debug!("xref stream at offset {}", offset);
            parse_xref_stream(bytes, start, options)?
        },
        _ => return Err(Error::InvalidXref),
    };

    let prev = xref
        .trailer()
        .and_then(|t| dict_scan::literal_after("/Prev", t))
        .and_then(|l| l.as_integer());
    if let Some(prev_offset) = prev {
        log::debug!("following /Prev {} from {}", prev_offset, offset);
        let older = parse_xref_recursive(bytes, prev_offset as u64, depth + 1, visited, options)?;
        xref.merge_from(older);
    }

    Ok(xref)
}

/// Parse a traditional table:
///
/// ```text
/// xref
/// 0 6
/// 0000000000 65535 f
/// 0000000018 00000 n
/// ...
/// trailer
/// << /Size 6 /Root 1 0 R >>
/// ```
fn parse_traditional_xref(bytes: &[u8], offset: usize) -> Result<CrossRefTable> {
    let mut xref = CrossRefTable::new();
    let mut pos = token_at(bytes, offset)
        .filter(|t| t.token == Token::Keyword(&b"xref"[..]))
        .ok_or(Error::InvalidXref)?
        .span
        .end;

    loop {
        let tok = token_at(bytes, pos).ok_or(Error::InvalidXref)?;
        match tok.token {
            Token::Keyword(b"trailer") => {
                let dict = crate::dict_scan::value_span(bytes, tok.span.end)
                    .ok_or(Error::InvalidXref)?;
                xref.set_trailer(bytes_to_latin1(&bytes[dict]));
                return Ok(xref);
            },
            Token::Integer(first) => {
                let count = match token_at(bytes, tok.span.end) {
                    Some(t) => match t.token {
                        Token::Integer(c) => {
                            pos = t.span.end;
                            c
                        },
                        _ => return Err(Error::InvalidXref),
                    },
                    None => return Err(Error::InvalidXref),
                };
                if !(0..=MAX_SUBSECTION_COUNT).contains(&count) || first < 0 {
                    return Err(Error::InvalidPdf("xref subsection count exceeds limit".to_string()));
                }
                for i in 0..count {
                    let Some((entry, next)) = read_table_entry(bytes, pos) else {
                        log::warn!("xref subsection {} ended after {} of {} entries", first, i, count);
                        break;
                    };
                    pos = next;
                    xref.add_entry((first + i) as u32, entry);
                }
            },
            _ => return Err(Error::InvalidXref),
        }
    }
}

/// One `nnnnnnnnnn ggggg n` line. Unknown type flags are read as free.
fn read_table_entry(bytes: &[u8], pos: usize) -> Option<(XRefEntry, usize)> {
    let off = token_at(bytes, pos)?;
    let gen = token_at(bytes, off.span.end)?;
    let kind = token_at(bytes, gen.span.end)?;
    let (Token::Integer(offset), Token::Integer(generation)) = (off.token, gen.token) else {
        return None;
    };
    let entry = match kind.token {
        Token::Keyword(b"n") => XRefEntry::InUse {
            offset: offset.max(0) as u64,
            gen: generation.clamp(0, u16::MAX as i64) as u16,
        },
        Token::Keyword(b"f") => XRefEntry::Free,
        Token::Keyword(other) => {
            log::warn!("invalid xref type flag {:?}, treating as free", String::from_utf8_lossy(other));
            XRefEntry::Free
        },
        _ => return None,
    };
    Some((entry, kind.span.end))
}

/// Read a big-endian integer field.
fn read_int(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

/// Parse a cross-reference stream object at `offset`.
fn parse_xref_stream(bytes: &[u8], offset: usize, options: &ParserOptions) -> Result<CrossRefTable> {
    let obj = parse_indirect_object(bytes, offset)?;
    let dict = obj.body.as_str();
    match dict_scan::name_after("/Type", dict) {
        Some("/XRef") | None => {},
        Some(other) => {
            return Err(Error::InvalidPdf(format!("expected /Type /XRef, got {}", other)));
        },
    }
    let data_range = obj
        .stream
        .clone()
        .ok_or_else(|| Error::InvalidPdf("xref stream has no data".to_string()))?;

    let widths: Vec<usize> = dict_scan::value_token_after("/W", dict)
        .and_then(dict_scan::array_numbers)
        .filter(|w| w.len() == 3)
        .ok_or_else(|| Error::InvalidPdf("missing /W array in xref stream".to_string()))?
        .into_iter()
        .map(|w| w.max(0.0) as usize)
        .collect();
    let (w1, w2, w3) = (widths[0], widths[1], widths[2]);
    let entry_size = w1 + w2 + w3;
    if entry_size == 0 {
        return Err(Error::InvalidPdf("xref stream /W is all zero".to_string()));
    }

    let size = dict_scan::literal_after("/Size", dict)
        .and_then(|l| l.as_integer())
        .ok_or_else(|| Error::InvalidPdf("missing /Size in xref stream".to_string()))?;
    let ranges: Vec<(u32, u32)> = match dict_scan::value_token_after("/Index", dict) {
        Some(index) => dict_scan::array_numbers(index)
            .ok_or_else(|| Error::InvalidPdf("invalid /Index".to_string()))?
            .chunks(2)
            .filter(|pair| pair.len() == 2)
            .map(|pair| (pair[0] as u32, pair[1] as u32))
            .collect(),
        None => vec![(0, size.max(0) as u32)],
    };

    let data = decode_stream(&bytes[data_range], dict, options)?;

    let mut xref = CrossRefTable::new();
    let mut records = data.chunks_exact(entry_size);
    for (first, count) in ranges {
        for i in 0..count {
            let record = records
                .next()
                .ok_or_else(|| Error::InvalidPdf("truncated xref stream data".to_string()))?;
            let kind = if w1 == 0 { 1 } else { read_int(&record[..w1]) };
            let field2 = read_int(&record[w1..w1 + w2]);
            let field3 = read_int(&record[w1 + w2..]);
            let entry = match kind {
                0 => XRefEntry::Free,
                1 => XRefEntry::InUse {
                    offset: field2,
                    gen: field3 as u16,
                },
                2 => XRefEntry::Compressed {
                    stream: field2 as u32,
                    index: field3 as u32,
                },
                other => {
                    log::debug!("skipping xref stream entry of unknown type {}", other);
                    continue;
                },
            };
            xref.add_entry(first + i, entry);
        }
    }

    xref.set_trailer(obj.body);
    Ok(xref)
}
