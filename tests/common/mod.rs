//! PDF fixtures built in memory with exact cross-reference offsets.

#![allow(dead_code)]

/// Assemble a classic PDF from object bodies numbered `1..=n`.
///
/// `trailer_extra` is added to the trailer dictionary. When `final_newline`
/// is false the file ends right after `%%EOF`.
pub fn build_pdf(objects: &[&str], trailer_extra: &str, final_newline: bool) -> Vec<u8> {
    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R{} >>\nstartxref\n{}\n%%EOF",
            objects.len() + 1,
            trailer_extra,
            xref
        )
        .as_bytes(),
    );
    if final_newline {
        out.push(b'\n');
    }
    out
}

/// Catalog, Pages, an empty AcroForm and one page.
pub fn minimal_form() -> Vec<u8> {
    build_pdf(
        &[
            "<< /Type /Catalog /Pages 2 0 R /AcroForm 3 0 R >>",
            "<< /Type /Pages /Kids [4 0 R] /Count 1 >>",
            "<< /Fields [] /NeedAppearances false >>",
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Annots [] >>",
        ],
        "",
        false,
    )
}

/// The minimal form plus a text field `Old` (5) with its widget (6).
pub fn form_with_field() -> Vec<u8> {
    build_pdf(
        &[
            "<< /Type /Catalog /Pages 2 0 R /AcroForm 3 0 R >>",
            "<< /Type /Pages /Kids [4 0 R] /Count 1 >>",
            "<< /Fields [5 0 R] /NeedAppearances false >>",
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Annots [6 0 R] >>",
            "<< /FT /Tx /T (Old) /V (Initial) /Ff 0 /DA (/Helv 0 Tf 0 g) >>",
            "<< /Type /Annot /Subtype /Widget /Parent 5 0 R /P 4 0 R /Rect [100 500 200 520] /F 4 >>",
        ],
        " /Info 7 0 R /ID [<0123> <4567>]",
        true,
    )
}

/// A document without any AcroForm.
pub fn no_form() -> Vec<u8> {
    build_pdf(
        &[
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
            "<< /Type /Page /Parent 2 0 R >>",
        ],
        "",
        true,
    )
}

/// Byte offset named by the last `startxref`.
pub fn last_startxref(bytes: &[u8]) -> usize {
    let text = String::from_utf8_lossy(bytes);
    let pos = text.rfind("startxref").expect("startxref present");
    text[pos + "startxref".len()..]
        .split_whitespace()
        .next()
        .and_then(|n| n.parse().ok())
        .expect("numeric startxref")
}

/// A PDF 1.5 form whose AcroForm (4) and page (5) live in an object stream
/// (3), indexed by a cross-reference stream (6).
pub fn compressed_form() -> Vec<u8> {
    let acroform = "<< /Fields [] >>";
    let page = "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>";
    let header = format!("4 0 5 {} ", acroform.len() + 1);
    let data = pdf_acroedit::decoders::compress(format!("{}{} {}", header, acroform, page).as_bytes())
        .expect("compress object stream");

    let mut out = b"%PDF-1.5\n".to_vec();
    let catalog_at = out.len();
    out.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R /AcroForm 4 0 R >>\nendobj\n");
    let pages_at = out.len();
    out.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [5 0 R] /Count 1 >>\nendobj\n");
    let objstm_at = out.len();
    out.extend_from_slice(
        format!(
            "3 0 obj\n<< /Type /ObjStm /N 2 /First {} /Filter /FlateDecode /Length {} >>\nstream\n",
            header.len(),
            data.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(&data);
    out.extend_from_slice(b"\nendstream\nendobj\n");

    // W [1 4 2]
    let xref_at = out.len();
    let mut rows = Vec::new();
    for (kind, field2, field3) in [
        (0u8, 0u32, 65535u16),
        (1, catalog_at as u32, 0),
        (1, pages_at as u32, 0),
        (1, objstm_at as u32, 0),
        (2, 3, 0),
        (2, 3, 1),
        (1, xref_at as u32, 0),
    ] {
        rows.push(kind);
        rows.extend_from_slice(&field2.to_be_bytes());
        rows.extend_from_slice(&field3.to_be_bytes());
    }
    out.extend_from_slice(
        format!(
            "6 0 obj\n<< /Type /XRef /Size 7 /W [1 4 2] /Root 1 0 R /Length {} >>\nstream\n",
            rows.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(&rows);
    out.extend_from_slice(format!("\nendstream\nendobj\nstartxref\n{}\n%%EOF\n", xref_at).as_bytes());
    out
}
