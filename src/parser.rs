//! Indirect object reader.
//!
//! Reads `N G obj ... endobj` at a byte offset without interpreting the
//! value: the body is kept as text and only the stream data range is
//! located. Everything above this layer edits that text directly.

use std::ops::Range;

use crate::dict_scan;
use crate::error::{Error, Result};
use crate::lexer::{skip_whitespace, token_at, Token};
use crate::object::ObjectRef;
use crate::utils::{bytes_to_latin1, find_bytes};

/// An indirect object located in the source bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct RawObject {
    /// Reference from the `N G obj` header
    pub obj_ref: ObjectRef,
    /// Value text (the stream dictionary for streams)
    pub body: String,
    /// Stream data, excluding the `stream`/`endstream` keywords and EOLs
    pub stream: Option<Range<usize>>,
    /// Whole object, from the header to the end of `endobj`
    pub span: Range<usize>,
}

fn parse_err(offset: usize, reason: impl Into<String>) -> Error {
    Error::ParseError {
        offset,
        reason: reason.into(),
    }
}

/// Read the indirect object whose header starts at or after `offset`.
pub fn parse_indirect_object(bytes: &[u8], offset: usize) -> Result<RawObject> {
    let start = skip_whitespace(bytes, offset);

    let header = |pos: usize| token_at(bytes, pos).ok_or_else(|| parse_err(pos, "unexpected end of file"));
    let num = header(start)?;
    let gen = header(num.span.end)?;
    let obj = header(gen.span.end)?;
    let (id, generation) = match (num.token, gen.token, obj.token) {
        (Token::Integer(id), Token::Integer(g), Token::ObjStart) if id >= 0 && g >= 0 => {
            (id as u32, g as u16)
        },
        _ => return Err(parse_err(start, "expected 'N G obj' header")),
    };
    let obj_ref = ObjectRef::new(id, generation);

    let (body_range, mut cursor) = match dict_scan::value_span(bytes, obj.span.end) {
        Some(range) => {
            let end = range.end;
            (range, end)
        },
        None => {
            // Unparseable value: keep everything up to endobj verbatim.
            let end = find_bytes(bytes, b"endobj", obj.span.end)
                .ok_or_else(|| parse_err(obj.span.end, format!("{} has no endobj", obj_ref)))?;
            let body_start = skip_whitespace(bytes, obj.span.end);
            (body_start..end.max(body_start), end)
        },
    };
    let body = bytes_to_latin1(&bytes[body_range.clone()]).trim_end().to_string();

    let mut stream = None;
    if let Some(tok) = token_at(bytes, cursor) {
        if tok.token == Token::StreamStart {
            let data = stream_data_range(bytes, tok.span.end, &body)
                .ok_or_else(|| parse_err(tok.span.end, format!("{} has no endstream", obj_ref)))?;
            cursor = data.end;
            if let Some(end) = token_at(bytes, cursor).filter(|t| t.token == Token::StreamEnd) {
                cursor = end.span.end;
            }
            stream = Some(data);
        }
    }

    let end = match token_at(bytes, cursor) {
        Some(tok) if tok.token == Token::ObjEnd => tok.span.end,
        _ => {
            log::debug!("{} is missing endobj", obj_ref);
            cursor
        },
    };

    Ok(RawObject {
        obj_ref,
        body,
        stream,
        span: start..end,
    })
}

/// Locate stream data following the `stream` keyword.
///
/// A direct `/Length` is trusted when `endstream` follows it; otherwise the
/// data runs up to the next `endstream`, minus one trailing EOL.
fn stream_data_range(bytes: &[u8], after_keyword: usize, dict_body: &str) -> Option<Range<usize>> {
    let mut data_start = after_keyword;
    if bytes.get(data_start) == Some(&b'\r') {
        data_start += 1;
    }
    if bytes.get(data_start) == Some(&b'\n') {
        data_start += 1;
    }

    let declared = dict_scan::literal_after("/Length", dict_body)
        .and_then(|l| l.as_integer())
        .and_then(|n| usize::try_from(n).ok());
    if let Some(len) = declared {
        let end = data_start.checked_add(len)?;
        if end <= bytes.len() {
            let after = skip_whitespace(bytes, end);
            if bytes[after..].starts_with(b"endstream") {
                return Some(data_start..end);
            }
        }
        log::debug!("stream /Length {} does not reach endstream, scanning", len);
    }

    let keyword = find_bytes(bytes, b"endstream", data_start)?;
    let mut end = keyword;
    if end > data_start && bytes[end - 1] == b'\n' {
        end -= 1;
    }
    if end > data_start && bytes[end - 1] == b'\r' {
        end -= 1;
    }
    Some(data_start..end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dictionary_object() {
        let bytes = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n";
        let obj = parse_indirect_object(bytes, 9).unwrap();
        assert_eq!(obj.obj_ref, ObjectRef::new(1, 0));
        assert_eq!(obj.body, "<< /Type /Catalog /Pages 2 0 R >>");
        assert!(obj.stream.is_none());
        assert_eq!(&bytes[obj.span.clone()], &b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj"[..]);
    }

    #[test]
    fn test_parse_array_object() {
        let bytes = b"7 0 obj [4 0 R 5 0 R] endobj";
        let obj = parse_indirect_object(bytes, 0).unwrap();
        assert_eq!(obj.body, "[4 0 R 5 0 R]");
    }

    #[test]
    fn test_parse_stream_with_length() {
        let bytes = b"3 0 obj\n<< /Length 5 >>\nstream\nhello\nendstream\nendobj\n";
        let obj = parse_indirect_object(bytes, 0).unwrap();
        assert_eq!(obj.body, "<< /Length 5 >>");
        assert_eq!(&bytes[obj.stream.unwrap()], b"hello");
        assert!(bytes[..obj.span.end].ends_with(b"endobj"));
    }

    #[test]
    fn test_parse_stream_with_wrong_length() {
        let bytes = b"3 0 obj\n<< /Length 2 >>\nstream\r\nhello\r\nendstream\nendobj\n";
        let obj = parse_indirect_object(bytes, 0).unwrap();
        assert_eq!(&bytes[obj.stream.unwrap()], b"hello");
    }

    #[test]
    fn test_parse_stream_with_indirect_length() {
        let bytes = b"3 0 obj\n<< /Length 9 0 R >>\nstream\nabc\nendstream\nendobj\n";
        let obj = parse_indirect_object(bytes, 0).unwrap();
        assert_eq!(&bytes[obj.stream.unwrap()], b"abc");
    }

    #[test]
    fn test_parse_missing_header() {
        assert!(parse_indirect_object(b"<< /A 1 >>", 0).is_err());
        assert!(parse_indirect_object(b"", 0).is_err());
    }

    #[test]
    fn test_parse_binary_string_body() {
        let bytes = b"4 0 obj\n<< /V (\xE9t\xE9) >>\nendobj";
        let obj = parse_indirect_object(bytes, 0).unwrap();
        assert_eq!(crate::utils::latin1_to_bytes(&obj.body), b"<< /V (\xE9t\xE9) >>");
    }
}
