//! Text-level editing of dictionary and array literals.
//!
//! Object bodies are never parsed into a tree. These functions locate the
//! byte range of one value with the lexer, then splice around it, so every
//! byte they were not asked to change is preserved.
//!
//! Only top-level keys of a dictionary are matched: a `/Font` inside a
//! nested `/DR` dictionary or the text `/Fields` inside a string literal is
//! never mistaken for a key of the outer dictionary.
//!
//! Every editing function is total. When the input is malformed (unbalanced
//! delimiters, missing key) the input comes back unchanged; callers detect a
//! no-op by comparing bodies.

use std::ops::Range;

use crate::lexer::{decode_name_escapes, token_at, Token};
use crate::object::{Literal, ObjectRef};
use crate::utils::{bytes_to_latin1, latin1_to_bytes};

/// Maximum nesting of `<<`/`[` accepted while balancing a value.
const MAX_NESTING: usize = 256;

fn key_name(key: &str) -> &str {
    key.strip_prefix('/').unwrap_or(key)
}

fn slash_key(key: &str) -> String {
    format!("/{}", key_name(key))
}

/// End offset of the container opened at `start` (`<<` or `[`).
fn container_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut pos = start;
    loop {
        let tok = token_at(bytes, pos)?;
        match tok.token {
            Token::DictStart | Token::ArrayStart => {
                depth += 1;
                if depth > MAX_NESTING {
                    return None;
                }
            },
            Token::DictEnd | Token::ArrayEnd => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(tok.span.end);
                }
            },
            Token::ObjEnd | Token::StreamStart => return None,
            _ => {},
        }
        pos = tok.span.end;
    }
}

/// Span of the complete value starting at or after `pos`.
pub(crate) fn value_span(bytes: &[u8], pos: usize) -> Option<Range<usize>> {
    let first = token_at(bytes, pos)?;
    match first.token {
        Token::DictStart | Token::ArrayStart => {
            let end = container_end(bytes, first.span.start)?;
            Some(first.span.start..end)
        },
        Token::Integer(_) => {
            // `N G R` is a single value.
            if let Some(second) = token_at(bytes, first.span.end) {
                if matches!(second.token, Token::Integer(_)) {
                    if let Some(third) = token_at(bytes, second.span.end) {
                        if third.token == Token::R {
                            return Some(first.span.start..third.span.end);
                        }
                    }
                }
            }
            Some(first.span)
        },
        Token::DictEnd | Token::ArrayEnd | Token::ObjEnd => None,
        _ => Some(first.span),
    }
}

/// One top-level `/Key value` pair of a dictionary body.
#[derive(Debug, Clone)]
struct Entry {
    name: String,
    key: Range<usize>,
    value: Option<Range<usize>>,
}

/// Top-level entries of the dictionary that opens `body`, plus the offset of
/// its closing `>>`.
fn dict_entries(body: &str) -> Option<(Vec<Entry>, usize)> {
    let bytes = body.as_bytes();
    let open = token_at(bytes, 0)?;
    if open.token != Token::DictStart {
        return None;
    }
    let mut entries = Vec::new();
    let mut pos = open.span.end;
    loop {
        let tok = token_at(bytes, pos)?;
        match tok.token {
            Token::DictEnd => return Some((entries, tok.span.start)),
            Token::Name(name) => {
                let value = match token_at(bytes, tok.span.end) {
                    // A key directly followed by `>>` has no value.
                    Some(next) if next.token == Token::DictEnd => None,
                    Some(_) => Some(value_span(bytes, tok.span.end)?),
                    None => return None,
                };
                pos = value.as_ref().map(|v| v.end).unwrap_or(tok.span.end);
                entries.push(Entry {
                    name,
                    key: tok.span,
                    value,
                });
            },
            // Stray tokens between entries are skipped, not fatal.
            Token::DictStart | Token::ArrayStart => {
                pos = container_end(bytes, tok.span.start)?;
            },
            Token::ObjEnd | Token::StreamStart => return None,
            _ => pos = tok.span.end,
        }
    }
}

fn find_entry(body: &str, key: &str) -> Option<Entry> {
    let (entries, _) = dict_entries(body)?;
    let name = decode_name_escapes(key_name(key));
    entries.into_iter().find(|e| e.name == name)
}

/// Whether `key` is a top-level key of the dictionary `body`.
pub fn has_key(body: &str, key: &str) -> bool {
    find_entry(body, key).is_some()
}

/// Source text of the value following `key`, delimiters included.
///
/// The value can be a reference (`N G R`), a nested dictionary or array, a
/// name, a number, a string or a keyword. Returns `None` if the key is absent
/// or the body is not a well-formed dictionary.
pub fn value_token_after<'a>(key: &str, body: &'a str) -> Option<&'a str> {
    let entry = find_entry(body, key)?;
    entry.value.map(|v| &body[v])
}

/// Classify the source text of a single value.
pub fn classify(text: &str) -> Literal<'_> {
    let trimmed = text.trim_matches(|c: char| c.is_ascii_whitespace() || c == '\0');
    let bytes = trimmed.as_bytes();
    let Some(first) = token_at(bytes, 0) else {
        return Literal::Raw(trimmed);
    };
    match first.token {
        Token::DictStart => Literal::Dictionary(trimmed),
        Token::ArrayStart => Literal::Array(trimmed),
        Token::Name(_) => Literal::Name(trimmed),
        Token::LiteralString(_) | Token::HexString(_) => Literal::StringLit(trimmed),
        Token::True => Literal::Boolean(true),
        Token::False => Literal::Boolean(false),
        Token::Integer(_) | Token::Real(_) => match trimmed.parse::<ObjectRef>() {
            Ok(r) => Literal::Reference(r),
            Err(_) if first.span.end == bytes.len() => Literal::Number(trimmed),
            Err(_) => Literal::Raw(trimmed),
        },
        _ => Literal::Raw(trimmed),
    }
}

/// Typed value following `key`.
pub fn literal_after<'a>(key: &str, body: &'a str) -> Option<Literal<'a>> {
    value_token_after(key, body).map(classify)
}

/// Reference following `key`, if the value is `N G R`.
pub fn ref_after(key: &str, body: &str) -> Option<ObjectRef> {
    literal_after(key, body)?.as_reference()
}

/// Name following `key`, with its leading slash.
pub fn name_after<'a>(key: &str, body: &'a str) -> Option<&'a str> {
    literal_after(key, body)?.as_name()
}

/// Every `N G R` element of an array literal, in order.
pub fn array_refs(array_body: &str) -> Vec<ObjectRef> {
    array_elements(array_body)
        .map(|(_, elems)| {
            elems
                .into_iter()
                .filter_map(|span| array_body[span].parse::<ObjectRef>().ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Element spans of the array that opens `array_body`, plus the array span.
fn array_elements(array_body: &str) -> Option<(Range<usize>, Vec<Range<usize>>)> {
    let bytes = array_body.as_bytes();
    let open = token_at(bytes, 0)?;
    if open.token != Token::ArrayStart {
        return None;
    }
    let mut elems = Vec::new();
    let mut pos = open.span.end;
    loop {
        let tok = token_at(bytes, pos)?;
        if tok.token == Token::ArrayEnd {
            return Some((open.span.start..tok.span.end, elems));
        }
        let span = value_span(bytes, pos)?;
        pos = span.end;
        elems.push(span);
    }
}

/// Numbers of a numeric array such as `/Rect [x1 y1 x2 y2]`.
pub fn array_numbers(array_body: &str) -> Option<Vec<f64>> {
    let (_, elems) = array_elements(array_body)?;
    elems
        .into_iter()
        .map(|span| array_body[span].trim().parse::<f64>().ok())
        .collect()
}

/// Append `r` to the array literal that opens `array_body`.
///
/// Text after the closing bracket is kept. An empty array becomes a
/// one-element array.
pub fn add_ref_to_array(array_body: &str, r: ObjectRef) -> String {
    let Some((span, _)) = array_elements(array_body) else {
        return array_body.to_string();
    };
    splice_append(array_body, span, r)
}

fn splice_append(text: &str, array: Range<usize>, r: ObjectRef) -> String {
    let inner = &text[array.start + 1..array.end - 1];
    let content = inner.trim_end();
    let new_array = if content.trim_start().is_empty() {
        format!("[{}]", r)
    } else {
        format!("[{} {}]", content, r)
    };
    let mut out = String::with_capacity(text.len() + new_array.len());
    out.push_str(&text[..array.start]);
    out.push_str(&new_array);
    out.push_str(&text[array.end..]);
    out
}

/// Append `r` to the inline array stored under `key` in `dict_body`.
///
/// Returns the body unchanged when the key is absent or its value is not an
/// inline array.
pub fn add_ref_to_inline_array(dict_body: &str, key: &str, r: ObjectRef) -> String {
    let Some(value) = find_entry(dict_body, key).and_then(|e| e.value) else {
        return dict_body.to_string();
    };
    if !dict_body[value.clone()].starts_with('[') {
        return dict_body.to_string();
    }
    splice_append(dict_body, value, r)
}

/// Drop every occurrence of `r` from the array literal that opens
/// `array_body`.
pub fn remove_ref_from_array(array_body: &str, r: ObjectRef) -> String {
    let Some((span, elems)) = array_elements(array_body) else {
        return array_body.to_string();
    };
    splice_remove(array_body, span, &elems, r)
}

fn splice_remove(text: &str, array: Range<usize>, elems: &[Range<usize>], r: ObjectRef) -> String {
    let kept: Vec<&str> = elems
        .iter()
        .map(|span| &text[span.clone()])
        .filter(|elem| elem.parse::<ObjectRef>().ok() != Some(r))
        .collect();
    if kept.len() == elems.len() {
        return text.to_string();
    }
    format!("{}[{}]{}", &text[..array.start], kept.join(" "), &text[array.end..])
}

/// Drop `r` from the inline array stored under `key` in `dict_body`.
pub fn remove_ref_from_inline_array(dict_body: &str, key: &str, r: ObjectRef) -> String {
    let Some(value) = find_entry(dict_body, key).and_then(|e| e.value) else {
        return dict_body.to_string();
    };
    let value_text = &dict_body[value.clone()];
    let Some((_, elems)) = array_elements(value_text) else {
        return dict_body.to_string();
    };
    let new_value = splice_remove(value_text, 0..value_text.len(), &elems, r);
    format!("{}{}{}", &dict_body[..value.start], new_value, &dict_body[value.end..])
}

/// Set `key` to `value_literal`: replace the value when the key exists,
/// otherwise add the entry before the closing `>>`.
pub fn upsert_key_value(dict_body: &str, key: &str, value_literal: &str) -> String {
    let Some((entries, close)) = dict_entries(dict_body) else {
        return dict_body.to_string();
    };
    let name = decode_name_escapes(key_name(key));
    if let Some(entry) = entries.iter().find(|e| e.name == name) {
        return replace_entry(dict_body, entry, value_literal);
    }

    let head = &dict_body[..close];
    let insert = if head.ends_with('\n') {
        format!("  {} {}\n", slash_key(key), value_literal)
    } else if head.ends_with(|c: char| c.is_ascii_whitespace()) {
        format!("{} {} ", slash_key(key), value_literal)
    } else {
        format!(" {} {}", slash_key(key), value_literal)
    };
    format!("{}{}{}", head, insert, &dict_body[close..])
}

/// Replace the value of an existing `key`. No-op when the key is absent.
pub fn replace_key_value(dict_body: &str, key: &str, new_value_literal: &str) -> String {
    match find_entry(dict_body, key) {
        Some(entry) => replace_entry(dict_body, &entry, new_value_literal),
        None => dict_body.to_string(),
    }
}

fn replace_entry(dict_body: &str, entry: &Entry, new_value: &str) -> String {
    match &entry.value {
        Some(v) => format!("{}{}{}", &dict_body[..v.start], new_value, &dict_body[v.end..]),
        None => format!(
            "{} {}{}",
            &dict_body[..entry.key.end],
            new_value,
            &dict_body[entry.key.end..]
        ),
    }
}

/// Remove `key` and its value. No-op when the key is absent.
pub fn remove_key(dict_body: &str, key: &str) -> String {
    let Some(entry) = find_entry(dict_body, key) else {
        return dict_body.to_string();
    };
    let end = entry.value.map(|v| v.end).unwrap_or(entry.key.end);
    let start = dict_body[..entry.key.start].trim_end_matches([' ', '\t']).len();
    format!("{}{}", &dict_body[..start], &dict_body[end..])
}

/// Encode a logical string as a PDF string literal, passing through values
/// that already are a single PDF name, string or dictionary.
///
/// ```
/// # use pdf_acroedit::dict_scan::encode_pdf_string;
/// assert_eq!(encode_pdf_string("Hello"), "(Hello)");
/// assert_eq!(encode_pdf_string("/Yes"), "/Yes");
/// assert_eq!(encode_pdf_string("(already)"), "(already)");
/// assert_eq!(encode_pdf_string("(broken"), "(\\(broken)");
/// ```
pub fn encode_pdf_string(value: &str) -> String {
    if is_single_pdf_token(value) {
        value.to_string()
    } else {
        encode_text_string(value)
    }
}

fn is_single_pdf_token(value: &str) -> bool {
    if !value.starts_with(['(', '<', '/']) {
        return false;
    }
    let bytes = value.as_bytes();
    match token_at(bytes, 0) {
        Some(tok) => match tok.token {
            Token::DictStart => container_end(bytes, 0) == Some(bytes.len()),
            Token::Name(_) | Token::LiteralString(_) | Token::HexString(_) => {
                tok.span.end == bytes.len()
            },
            _ => false,
        },
        None => false,
    }
}

/// Encode text as a PDF string without any pass-through.
///
/// ASCII text becomes an escaped literal string; anything else becomes a
/// UTF-16BE hex string with a byte order mark.
pub fn encode_text_string(value: &str) -> String {
    if value.is_ascii() {
        let mut out = String::with_capacity(value.len() + 2);
        out.push('(');
        for c in value.chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                '(' => out.push_str("\\("),
                ')' => out.push_str("\\)"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                '\u{8}' => out.push_str("\\b"),
                '\u{c}' => out.push_str("\\f"),
                _ => out.push(c),
            }
        }
        out.push(')');
        out
    } else {
        let mut out = String::from("<FEFF");
        for unit in value.encode_utf16() {
            out.push_str(&format!("{:04X}", unit));
        }
        out.push('>');
        out
    }
}

/// Decode a PDF string token (`(...)` or `<...>`) to text.
///
/// Strings starting with a UTF-16BE byte order mark are decoded as UTF-16,
/// everything else as Latin-1. Returns `None` for anything that is not a
/// string token.
pub fn decode_pdf_string(token_text: &str) -> Option<String> {
    let raw = latin1_to_bytes(token_text.trim());
    let tok = token_at(&raw, 0)?;
    if tok.span.end != raw.len() {
        return None;
    }
    let bytes = match tok.token {
        Token::LiteralString(content) => unescape_literal(content),
        Token::HexString(content) => decode_hex(content),
        _ => return None,
    };
    Some(decode_text_bytes(&bytes))
}

fn decode_text_bytes(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks(2)
            .map(|pair| u16::from_be_bytes([pair[0], *pair.get(1).unwrap_or(&0)]))
            .collect();
        String::from_utf16_lossy(&units)
    } else if bytes.len() >= 3 && bytes[..3] == [0xEF, 0xBB, 0xBF] {
        String::from_utf8_lossy(&bytes[3..]).into_owned()
    } else {
        bytes_to_latin1(bytes)
    }
}

fn unescape_literal(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] != b'\\' || i + 1 >= raw.len() {
            out.push(raw[i]);
            i += 1;
            continue;
        }
        let c = raw[i + 1];
        i += 2;
        match c {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(8),
            b'f' => out.push(12),
            // Line continuation
            b'\n' => {},
            b'\r' => {
                if raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            },
            b'0'..=b'7' => {
                let mut val = u32::from(c - b'0');
                for _ in 0..2 {
                    match raw.get(i) {
                        Some(&d @ b'0'..=b'7') => {
                            val = val * 8 + u32::from(d - b'0');
                            i += 1;
                        },
                        _ => break,
                    }
                }
                out.push((val & 0xFF) as u8);
            },
            other => out.push(other),
        }
    }
    out
}

fn decode_hex(raw: &[u8]) -> Vec<u8> {
    let digits: Vec<u8> = raw
        .iter()
        .filter_map(|&c| (c as char).to_digit(16).map(|d| d as u8))
        .collect();
    digits
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect()
}

/// Encode text as a PDF name, `#xx`-escaping delimiters, whitespace and
/// non-ASCII bytes. A leading `/` in `value` is kept rather than doubled.
pub fn encode_name(value: &str) -> String {
    let raw = value.strip_prefix('/').unwrap_or(value);
    let mut out = String::with_capacity(raw.len() + 1);
    out.push('/');
    for &b in raw.as_bytes() {
        let regular = b.is_ascii_graphic()
            && !matches!(b, b'#' | b'/' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'%');
        if regular {
            out.push(b as char);
        } else {
            out.push_str(&format!("#{:02X}", b));
        }
    }
    out
}

/// Format a number the way it is written in a PDF body: integers without a
/// fractional part, reals in plain decimal notation.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else if value.is_finite() {
        format!("{}", value)
    } else {
        "0".to_string()
    }
}
