//! PDF lexer (tokenizer).
//!
//! Splits dictionary, array and trailer text into tokens while remembering
//! where each token starts and ends. The editing primitives in
//! [`crate::dict_scan`] never build an object tree: they walk these spans to
//! find the byte range of a value and splice around it.
//!
//! Whitespace (space, \t, \r, \n, \0, \f) and comments (% to EOL) are skipped.

use std::ops::Range;

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_till, take_while, take_while1},
    character::complete::{char, digit1, one_of},
    combinator::{map, opt, value},
    multi::many0,
    sequence::{delimited, preceded},
};

/// Token types recognized by the lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g., 42, -123)
    Integer(i64),

    /// Real number (e.g., 3.14, -2.5, .5)
    Real(f64),

    /// Literal string content without the outer parentheses.
    /// Escape sequences are left encoded.
    LiteralString(&'a [u8]),

    /// Hexadecimal string content without the angle brackets
    HexString(&'a [u8]),

    /// Name without the leading slash, `#XX` escapes decoded
    Name(String),

    /// `true`
    True,

    /// `false`
    False,

    /// `null`
    Null,

    /// `[`
    ArrayStart,

    /// `]`
    ArrayEnd,

    /// `<<`
    DictStart,

    /// `>>`
    DictEnd,

    /// `obj`
    ObjStart,

    /// `endobj`
    ObjEnd,

    /// `stream`
    StreamStart,

    /// `endstream`
    StreamEnd,

    /// Reference marker `R` (as in `10 0 R`)
    R,

    /// Any other run of regular characters (operators, `xref`, `trailer`,
    /// garbage in damaged files)
    Keyword(&'a [u8]),
}

/// A token together with the byte range it occupies in the scanned input.
#[derive(Debug, PartialEq, Clone)]
pub struct TokenSpan<'a> {
    /// The token
    pub token: Token<'a>,
    /// Byte range of the token, delimiters included
    pub span: Range<usize>,
}

fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

fn is_delimiter(c: u8) -> bool {
    matches!(c, b'/' | b'%' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}')
}

/// At least one whitespace byte.
fn whitespace(input: &[u8]) -> IResult<&[u8], ()> {
    value((), take_while1(is_whitespace))(input)
}

/// `%` up to (not including) the end of line.
fn comment(input: &[u8]) -> IResult<&[u8], ()> {
    value((), preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n')))(input)
}

/// Skip any mix of whitespace and comments.
fn skip_ws(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let mut remaining = input;
    loop {
        if let Ok((rest, _)) = whitespace(remaining) {
            remaining = rest;
        } else if let Ok((rest, _)) = comment(remaining) {
            remaining = rest;
        } else {
            break;
        }
    }
    Ok((remaining, input))
}

fn digit_error(input: &[u8]) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
}

/// Integers (`42`, `-123`, `+17`) and reals (`3.14`, `.5`, `5.`).
fn parse_number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (input, sign) = opt(one_of("+-"))(input)?;
    let (input, int_part) = opt(digit1)(input)?;
    let (input, frac_part) = opt(preceded(char('.'), opt(digit1)))(input)?;

    if int_part.is_none() && frac_part.is_none() {
        return Err(digit_error(input));
    }

    let int_text = int_part
        .map(std::str::from_utf8)
        .transpose()
        .map_err(|_| digit_error(input))?;

    match frac_part {
        Some(frac) => {
            let frac_text = frac
                .map(std::str::from_utf8)
                .transpose()
                .map_err(|_| digit_error(input))?;
            let text = format!(
                "{}{}.{}",
                if sign == Some('-') { "-" } else { "" },
                int_text.unwrap_or("0"),
                frac_text.unwrap_or("0")
            );
            let num: f64 = text.parse().map_err(|_| digit_error(input))?;
            Ok((input, Token::Real(num)))
        },
        None => {
            let digits = int_text.ok_or_else(|| digit_error(input))?;
            let num: i64 = digits.parse().map_err(|_| digit_error(input))?;
            Ok((input, Token::Integer(if sign == Some('-') { -num } else { num })))
        },
    }
}

/// Literal string with balanced nested parentheses and backslash escapes.
fn parse_literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (remaining, _) = char('(')(input)?;
    let mut depth = 1usize;
    let mut pos = 0usize;

    while depth > 0 && pos < remaining.len() {
        match remaining[pos] {
            // The escaped byte can never open or close a level.
            b'\\' => pos += 2,
            b'(' => {
                depth += 1;
                pos += 1;
            },
            b')' => {
                depth -= 1;
                pos += 1;
            },
            _ => pos += 1,
        }
    }

    if depth != 0 || pos > remaining.len() {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }

    Ok((&remaining[pos..], Token::LiteralString(&remaining[..pos - 1])))
}

/// Hex string `<48656C6C6F>`; whitespace inside is allowed.
fn parse_hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    if input.starts_with(b"<<") {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }

    delimited(
        char('<'),
        map(
            take_while(|c: u8| c.is_ascii_hexdigit() || c.is_ascii_whitespace()),
            Token::HexString,
        ),
        char('>'),
    )(input)
}

/// Decode `#XX` escape sequences in a name.
///
/// Invalid sequences are kept as written.
///
/// ```
/// # use pdf_acroedit::lexer::decode_name_escapes;
/// assert_eq!(decode_name_escapes("A#20B#23C"), "A B#C");
/// assert_eq!(decode_name_escapes("Helv"), "Helv");
/// assert_eq!(decode_name_escapes("A#"), "A#");
/// ```
pub fn decode_name_escapes(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut rest = name;

    while let Some(idx) = rest.find('#') {
        result.push_str(&rest[..idx]);
        let after = &rest[idx + 1..];
        let decoded = after
            .get(..2)
            .and_then(|hex| u8::from_str_radix(hex, 16).ok());
        match decoded {
            Some(byte) => {
                result.push(byte as char);
                rest = &after[2..];
            },
            None => {
                result.push('#');
                rest = after;
            },
        }
    }
    result.push_str(rest);
    result
}

/// Name starting with `/`.
fn parse_name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    preceded(
        char('/'),
        map(
            take_while(|c: u8| !is_whitespace(c) && !is_delimiter(c)),
            |bytes| Token::Name(decode_name_escapes(&String::from_utf8_lossy(bytes))),
        ),
    )(input)
}

/// Reserved words and delimiters. `<<` is tried before `<`, `>>` before `>`,
/// `endstream` before `stream`.
fn parse_keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, tok) = alt((
        value(Token::False, tag(b"false")),
        value(Token::True, tag(b"true")),
        value(Token::Null, tag(b"null")),
        value(Token::ObjStart, tag(b"obj")),
        value(Token::ObjEnd, tag(b"endobj")),
        value(Token::StreamEnd, tag(b"endstream")),
        value(Token::StreamStart, tag(b"stream")),
        value(Token::R, tag(b"R")),
    ))(input)?;

    // "Rect" or "nullx" are bare words, not keywords.
    match rest.first() {
        Some(&c) if !is_whitespace(c) && !is_delimiter(c) => {
            Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)))
        },
        _ => Ok((rest, tok)),
    }
}

fn parse_delimiter(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    alt((
        value(Token::DictStart, tag(b"<<")),
        value(Token::DictEnd, tag(b">>")),
        value(Token::ArrayStart, tag(b"[")),
        value(Token::ArrayEnd, tag(b"]")),
    ))(input)
}

fn parse_bare_keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    map(take_while1(|c: u8| !is_whitespace(c) && !is_delimiter(c)), Token::Keyword)(input)
}

/// Parse a single token after skipping whitespace and comments.
///
/// Keywords are tried before names and numbers, strings last. Anything else
/// made of regular characters comes back as [`Token::Keyword`].
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (input, _) = skip_ws(input)?;

    alt((
        parse_delimiter,
        parse_keyword,
        parse_name,
        parse_number,
        parse_literal_string,
        parse_hex_string,
        parse_bare_keyword,
    ))(input)
}

/// Parse tokens until the input is exhausted or a token fails.
pub fn tokens(input: &[u8]) -> IResult<&[u8], Vec<Token<'_>>> {
    many0(token)(input)
}

/// Parse the token that starts at or after `pos`, returning its span
/// relative to the start of `input`.
///
/// Returns `None` at end of input or when the bytes at the cursor do not
/// form a token (an unbalanced string, a stray `)` or `>`).
pub fn token_at(input: &[u8], pos: usize) -> Option<TokenSpan<'_>> {
    let slice = input.get(pos..)?;
    let (after_ws, _) = skip_ws(slice).ok()?;
    if after_ws.is_empty() {
        return None;
    }
    let start = input.len() - after_ws.len();
    let (rest, tok) = token(after_ws).ok()?;
    let end = input.len() - rest.len();
    Some(TokenSpan {
        token: tok,
        span: start..end,
    })
}

/// Position of the first non-whitespace, non-comment byte at or after `pos`.
pub fn skip_whitespace(input: &[u8], pos: usize) -> usize {
    match input.get(pos..) {
        Some(slice) => match skip_ws(slice) {
            Ok((rest, _)) => input.len() - rest.len(),
            Err(_) => pos,
        },
        None => input.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_integers() {
        assert_eq!(token(b"42"), Ok((&b""[..], Token::Integer(42))));
        assert_eq!(token(b"-123"), Ok((&b""[..], Token::Integer(-123))));
        assert_eq!(token(b"+17"), Ok((&b""[..], Token::Integer(17))));
    }

    #[test]
    fn test_parse_reals() {
        assert_eq!(token(b"-2.5"), Ok((&b""[..], Token::Real(-2.5))));
        assert_eq!(token(b".5"), Ok((&b""[..], Token::Real(0.5))));
        assert_eq!(token(b"5."), Ok((&b""[..], Token::Real(5.0))));
    }

    #[test]
    fn test_parse_literal_string_nested_and_escaped() {
        assert_eq!(
            token(b"(Hello (World))"),
            Ok((&b""[..], Token::LiteralString(b"Hello (World)")))
        );
        assert_eq!(token(b"(a\\)b)"), Ok((&b""[..], Token::LiteralString(b"a\\)b"))));
        assert_eq!(token(b"()"), Ok((&b""[..], Token::LiteralString(b""))));
    }

    #[test]
    fn test_unbalanced_literal_string_fails() {
        assert!(token(b"(abc").is_err());
    }

    #[test]
    fn test_parse_hex_string() {
        assert_eq!(token(b"<48 65>"), Ok((&b""[..], Token::HexString(b"48 65"))));
    }

    #[test]
    fn test_dict_start_is_not_hex_string() {
        assert_eq!(token(b"<</Type"), Ok((&b"/Type"[..], Token::DictStart)));
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(token(b"/Type"), Ok((&b""[..], Token::Name("Type".to_string()))));
        assert_eq!(token(b"/A#20B"), Ok((&b""[..], Token::Name("A B".to_string()))));
        assert_eq!(token(b"/Helv/Font"), Ok((&b"/Font"[..], Token::Name("Helv".to_string()))));
    }

    #[test]
    fn test_parse_keywords() {
        assert_eq!(token(b"true"), Ok((&b""[..], Token::True)));
        assert_eq!(token(b"null]"), Ok((&b"]"[..], Token::Null)));
        assert_eq!(token(b"endobj"), Ok((&b""[..], Token::ObjEnd)));
        assert_eq!(token(b"endstream"), Ok((&b""[..], Token::StreamEnd)));
        assert_eq!(token(b"R>>"), Ok((&b">>"[..], Token::R)));
    }

    #[test]
    fn test_bare_keywords() {
        assert_eq!(token(b"trailer"), Ok((&b""[..], Token::Keyword(b"trailer"))));
        assert_eq!(token(b"Rect"), Ok((&b""[..], Token::Keyword(b"Rect"))));
        assert_eq!(token(b"Tf "), Ok((&b" "[..], Token::Keyword(b"Tf"))));
    }

    #[test]
    fn test_skip_comments() {
        assert_eq!(token(b"% note\n  42"), Ok((&b""[..], Token::Integer(42))));
    }

    #[test]
    fn test_reference_tokens() {
        let (_, toks) = tokens(b"10 0 R").unwrap();
        assert_eq!(toks, vec![Token::Integer(10), Token::Integer(0), Token::R]);
    }

    #[test]
    fn test_token_at_reports_span() {
        let input = b"<< /T (Name) >>";
        let first = token_at(input, 2).unwrap();
        assert_eq!(first.token, Token::Name("T".to_string()));
        assert_eq!(first.span, 3..5);
        let second = token_at(input, first.span.end).unwrap();
        assert_eq!(second.token, Token::LiteralString(b"Name"));
        assert_eq!(&input[second.span.clone()], b"(Name)");
    }

    #[test]
    fn test_token_at_end_of_input() {
        assert!(token_at(b"  ", 0).is_none());
        assert!(token_at(b"x", 5).is_none());
    }

    #[test]
    fn test_skip_whitespace() {
        assert_eq!(skip_whitespace(b"   /A", 0), 3);
        assert_eq!(skip_whitespace(b"/A", 0), 0);
        assert_eq!(skip_whitespace(b"  ", 0), 2);
    }
}
