//! Object stream extraction (PDF 1.5+).
//!
//! An object stream (`/Type /ObjStm`) packs several objects into one
//! compressed stream:
//!
//! ```text
//! N 0 obj
//! << /Type /ObjStm /N 3 /First 14 /Filter /FlateDecode >>
//! stream
//! 10 0 11 15 12 28     % pairs: object number, offset relative to /First
//! <dict>               % object 10
//! <array>              % object 11
//! ...
//! endstream
//! endobj
//! ```
//!
//! Members come back as body text, ready for the same editing primitives as
//! uncompressed objects. Edited members are written out as ordinary objects;
//! the stream itself is never rewritten.

use crate::decoders::decode_stream;
use crate::dict_scan;
use crate::error::{Error, Result};
use crate::lexer::{token_at, Token};
use crate::parser_config::ParserOptions;
use crate::utils::bytes_to_latin1;

/// One object extracted from an object stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamMember {
    /// Object number
    pub id: u32,
    /// Position inside the stream
    pub index: u32,
    /// Value text
    pub body: String,
}

/// Extract every member of an object stream.
///
/// `dict_body` is the stream dictionary, `data` the raw (still encoded)
/// stream bytes.
pub fn parse_object_stream(
    dict_body: &str,
    data: &[u8],
    options: &ParserOptions,
) -> Result<Vec<StreamMember>> {
    if let Some(kind) = dict_scan::name_after("/Type", dict_body) {
        if kind != "/ObjStm" {
            return Err(Error::InvalidPdf(format!("expected /Type /ObjStm, got {}", kind)));
        }
    }
    let int = |key: &str| {
        dict_scan::literal_after(key, dict_body)
            .and_then(|l| l.as_integer())
            .filter(|n| *n >= 0)
            .map(|n| n as usize)
            .ok_or_else(|| Error::InvalidPdf(format!("object stream missing {} entry", key)))
    };
    let n = int("/N")?;
    let first = int("/First")?;

    let decoded = decode_stream(data, dict_body, options)?;
    if first > decoded.len() {
        return Err(Error::InvalidPdf(format!(
            "object stream /First {} beyond data length {}",
            first,
            decoded.len()
        )));
    }

    let header = &decoded[..first];
    let mut pairs = Vec::with_capacity(n);
    let mut pos = 0;
    for _ in 0..n {
        let Some((num, off)) = token_at(header, pos)
            .and_then(|num| token_at(header, num.span.end).map(|off| (num, off)))
        else {
            log::warn!("object stream header has {} of {} pairs", pairs.len(), n);
            break;
        };
        match (num.token, off.token) {
            (Token::Integer(id), Token::Integer(offset)) if id >= 0 && offset >= 0 => {
                pairs.push((id as u32, offset as usize));
                pos = off.span.end;
            },
            _ => {
                log::warn!("malformed object stream header after {} pairs", pairs.len());
                break;
            },
        }
    }

    let mut members = Vec::with_capacity(pairs.len());
    for (index, (id, offset)) in pairs.into_iter().enumerate() {
        let start = first + offset;
        match dict_scan::value_span(&decoded, start) {
            Some(span) => members.push(StreamMember {
                id,
                index: index as u32,
                body: bytes_to_latin1(&decoded[span]),
            }),
            None => log::warn!("skipping unreadable object {} in object stream", id),
        }
    }
    Ok(members)
}
