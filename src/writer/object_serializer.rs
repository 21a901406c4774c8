//! Byte-level pieces shared by the output strategies: indirect objects,
//! xref sections and trailers.

use std::io::Write;

use crate::dict_scan;
use crate::document::PdfSource;
use crate::error::Result;
use crate::object::ObjectRef;
use crate::utils::latin1_to_bytes;

/// Write `{id} {gen} obj\n{body}\nendobj\n`, with stream data when given.
///
/// `/Length` is set to the data length so edited or new streams stay
/// consistent.
pub(crate) fn write_indirect(out: &mut Vec<u8>, obj_ref: ObjectRef, body: &str, stream: Option<&[u8]>) -> Result<()> {
    writeln!(out, "{} {} obj", obj_ref.id, obj_ref.gen)?;
    match stream {
        Some(data) => {
            let body = dict_scan::upsert_key_value(body, "/Length", &data.len().to_string());
            out.extend_from_slice(&latin1_to_bytes(&body));
            out.extend_from_slice(b"\nstream\n");
            out.extend_from_slice(data);
            out.extend_from_slice(b"\nendstream");
        },
        None => out.extend_from_slice(&latin1_to_bytes(body)),
    }
    out.extend_from_slice(b"\nendobj\n");
    Ok(())
}

/// One in-use xref entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct XrefLine {
    pub id: u32,
    pub offset: u64,
    pub gen: u16,
}

/// `xref` keyword and one subsection per run of consecutive object numbers.
///
/// `entries` must be sorted by number without duplicates.
pub(crate) fn write_xref_subsections(out: &mut Vec<u8>, entries: &[XrefLine]) -> Result<()> {
    writeln!(out, "xref")?;
    let mut start = 0;
    while start < entries.len() {
        let mut end = start + 1;
        while end < entries.len() && entries[end].id == entries[end - 1].id + 1 {
            end += 1;
        }
        writeln!(out, "{} {}", entries[start].id, end - start)?;
        for entry in &entries[start..end] {
            write!(out, "{:010} {:05} n \n", entry.offset, entry.gen)?;
        }
        start = end;
    }
    Ok(())
}

/// Trailer dictionary, `startxref` and `%%EOF\n`.
///
/// `/Info` and `/ID` are carried over from the source trailer.
pub(crate) fn write_trailer(
    out: &mut Vec<u8>,
    source: &PdfSource,
    size: u32,
    prev: Option<u64>,
    xref_offset: usize,
) -> Result<()> {
    writeln!(out, "trailer")?;
    writeln!(out, "<<")?;
    writeln!(out, "  /Size {}", size)?;
    writeln!(out, "  /Root {}", source.root_ref())?;
    for key in ["/Info", "/ID"] {
        if let Some(value) = dict_scan::value_token_after(key, source.trailer()) {
            out.extend_from_slice(b"  ");
            out.extend_from_slice(key.as_bytes());
            out.push(b' ');
            out.extend_from_slice(&latin1_to_bytes(value));
            out.push(b'\n');
        }
    }
    if let Some(prev) = prev {
        writeln!(out, "  /Prev {}", prev)?;
    }
    writeln!(out, ">>")?;
    writeln!(out, "startxref")?;
    writeln!(out, "{}", xref_offset)?;
    writeln!(out, "%%EOF")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_indirect() {
        let mut out = Vec::new();
        write_indirect(&mut out, ObjectRef::new(7, 0), "<< /A (\u{e9}) >>", None).unwrap();
        assert_eq!(out, b"7 0 obj\n<< /A (\xE9) >>\nendobj\n");
    }

    #[test]
    fn test_write_stream_fixes_length() {
        let mut out = Vec::new();
        write_indirect(&mut out, ObjectRef::new(3, 0), "<< /Length 99 >>", Some(b"abc")).unwrap();
        assert_eq!(out, b"3 0 obj\n<< /Length 3 >>\nstream\nabc\nendstream\nendobj\n");
    }

    #[test]
    fn test_xref_subsections_group_runs() {
        let entries = [
            XrefLine { id: 3, offset: 10, gen: 0 },
            XrefLine { id: 5, offset: 20, gen: 0 },
            XrefLine { id: 6, offset: 30, gen: 2 },
        ];
        let mut out = Vec::new();
        write_xref_subsections(&mut out, &entries).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "xref\n3 1\n0000000010 00000 n \n5 2\n0000000020 00000 n \n0000000030 00002 n \n"
        );
        assert!(text.lines().skip(1).filter(|l| l.ends_with(" n ")).all(|l| l.len() == 19));
    }
}
