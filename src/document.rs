//! Source document: the original bytes plus every object body as text.
//!
//! A `PdfSource` is built once per session. It locates the cross-reference
//! data, reads each indirect object into a byte-transparent `String`, pulls
//! members out of object streams, and keeps the trailer text. Nothing here
//! is ever modified; edits live in the [`ObjectStore`](crate::editor::ObjectStore)
//! overlay.
//!
//! # Example
//!
//! ```no_run
//! use pdf_acroedit::document::PdfSource;
//!
//! let source = PdfSource::open("form.pdf")?;
//! println!("PDF {} with {} objects", source.version(), source.object_count());
//! println!("catalog: {}", source.root_ref());
//! # Ok::<(), pdf_acroedit::error::Error>(())
//! ```

use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::ops::Range;
use std::path::Path;

use crate::dict_scan;
use crate::error::{Error, Result};
use crate::object::ObjectRef;
use crate::objstm::parse_object_stream;
use crate::parser::{parse_indirect_object, RawObject};
use crate::parser_config::ParserOptions;
use crate::utils::find_bytes;
use crate::xref::{find_xref_offset, parse_xref, CrossRefTable, XRefEntry};
use crate::xref_reconstruction::reconstruct_xref;

/// How far into the file the `%PDF-` marker may appear.
const HEADER_SEARCH_LIMIT: usize = 1024;

/// What an object is, as far as writing it back out is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Dictionary, array or scalar without stream data
    Plain,
    /// Any stream other than the two container kinds below
    Stream,
    /// `/Type /ObjStm` container
    ObjectStream,
    /// `/Type /XRef` cross-reference stream
    XRefStream,
}

/// One object of the source document.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceObject {
    /// Object reference
    pub obj_ref: ObjectRef,
    /// Value text (stream dictionary for streams)
    pub body: String,
    /// `N G obj ... endobj` span in the source bytes; `None` for members of
    /// object streams
    pub raw: Option<Range<usize>>,
    /// Stream data span in the source bytes
    pub stream: Option<Range<usize>>,
    /// Object kind
    pub kind: ObjectKind,
    /// Containing object stream, for compressed objects
    pub container: Option<u32>,
}

impl SourceObject {
    fn from_raw(raw: RawObject) -> Self {
        let kind = match (&raw.stream, dict_scan::name_after("/Type", &raw.body)) {
            (Some(_), Some("/ObjStm")) => ObjectKind::ObjectStream,
            (Some(_), Some("/XRef")) => ObjectKind::XRefStream,
            (Some(_), _) => ObjectKind::Stream,
            (None, _) => ObjectKind::Plain,
        };
        Self {
            obj_ref: raw.obj_ref,
            body: raw.body,
            raw: Some(raw.span),
            stream: raw.stream,
            kind,
            container: None,
        }
    }
}

/// A parsed, read-only source document.
#[derive(Debug, Clone)]
pub struct PdfSource {
    bytes: Vec<u8>,
    version: String,
    objects: BTreeMap<u32, SourceObject>,
    trailer: String,
    startxref: Option<u64>,
    root: ObjectRef,
}

impl PdfSource {
    /// Read and parse the file at `path` with default options.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(path, ParserOptions::default())
    }

    /// Read and parse the file at `path`.
    pub fn open_with_options(path: impl AsRef<Path>, options: ParserOptions) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("opening {}", path.display());
        let bytes = std::fs::read(path)?;
        Self::from_bytes_with_options(bytes, options)
    }

    /// Read everything from `reader` and parse it with default options.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Self::from_reader_with_options(reader, ParserOptions::default())
    }

    /// Read everything from `reader` and parse it.
    pub fn from_reader_with_options<R: Read>(mut reader: R, options: ParserOptions) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes_with_options(bytes, options)
    }

    /// Parse in-memory bytes with default options.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        Self::from_bytes_with_options(bytes, ParserOptions::default())
    }

    /// Parse in-memory bytes.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidHeader`] when `%PDF-` is not in the first 1024 bytes
    /// - [`Error::InvalidXref`] and friends when the cross-reference data is
    ///   damaged and reconstruction is disabled or fails
    /// - [`Error::Unsupported`] for encrypted documents
    /// - [`Error::InvalidPdf`] when the trailer has no usable `/Root`
    pub fn from_bytes_with_options(bytes: impl Into<Vec<u8>>, options: ParserOptions) -> Result<Self> {
        let bytes = bytes.into();
        let version = parse_header(&bytes)?;

        let (xref, startxref) = load_xref(&bytes, &options)?;
        let trailer = xref
            .trailer()
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidPdf("trailer dictionary not found".to_string()))?;

        if dict_scan::has_key(&trailer, "/Encrypt") {
            return Err(Error::Unsupported("encrypted documents cannot be edited".to_string()));
        }

        let objects = load_objects(&bytes, &xref, startxref.is_none(), &options)?;

        let root = dict_scan::ref_after("/Root", &trailer)
            .ok_or_else(|| Error::InvalidPdf("trailer has no /Root reference".to_string()))?;
        if !objects.contains_key(&root.id) {
            return Err(Error::InvalidPdf(format!("catalog {} not found", root)));
        }

        log::info!(
            "loaded PDF {} with {} objects{}",
            version,
            objects.len(),
            if startxref.is_none() { " (reconstructed xref)" } else { "" }
        );

        Ok(Self {
            bytes,
            version,
            objects,
            trailer,
            startxref,
            root,
        })
    }

    /// The untouched source bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Header version, e.g. `"1.7"`.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Trailer dictionary text. For cross-reference streams this is the
    /// stream dictionary.
    pub fn trailer(&self) -> &str {
        &self.trailer
    }

    /// Offset of the newest cross-reference section, or `None` when the
    /// table had to be rebuilt from a scan.
    pub fn startxref(&self) -> Option<u64> {
        self.startxref
    }

    /// `true` when the cross-reference data was rebuilt by scanning.
    pub fn is_reconstructed(&self) -> bool {
        self.startxref.is_none()
    }

    /// The catalog reference from trailer `/Root`.
    pub fn root_ref(&self) -> ObjectRef {
        self.root
    }

    /// `/Size` from the trailer.
    pub fn declared_size(&self) -> Option<u32> {
        dict_scan::literal_after("/Size", &self.trailer)
            .and_then(|l| l.as_integer())
            .and_then(|n| u32::try_from(n).ok())
    }

    /// Body text of an object.
    ///
    /// Returns `None` when no object has that number or its generation
    /// differs.
    pub fn object_body_by_ref(&self, obj_ref: ObjectRef) -> Option<&str> {
        self.object(obj_ref).map(|o| o.body.as_str())
    }

    /// The object with this reference.
    pub fn object(&self, obj_ref: ObjectRef) -> Option<&SourceObject> {
        match self.objects.get(&obj_ref.id) {
            Some(obj) if obj.obj_ref.gen == obj_ref.gen => Some(obj),
            Some(obj) => {
                log::debug!("{} requested but source has {}", obj_ref, obj.obj_ref);
                None
            },
            None => None,
        }
    }

    /// The object with this number, whatever its generation.
    pub fn object_by_number(&self, id: u32) -> Option<&SourceObject> {
        self.objects.get(&id)
    }

    /// Objects in ascending number order.
    pub fn objects(&self) -> impl Iterator<Item = &SourceObject> + '_ {
        self.objects.values()
    }

    /// Number of objects loaded.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Encoded stream data of a stream object.
    pub fn stream_data(&self, obj_ref: ObjectRef) -> Option<&[u8]> {
        let range = self.object(obj_ref)?.stream.clone()?;
        self.bytes.get(range)
    }

    /// Raw `N G obj ... endobj` bytes of an uncompressed object.
    pub fn raw_object(&self, obj_ref: ObjectRef) -> Option<&[u8]> {
        let range = self.object(obj_ref)?.raw.clone()?;
        self.bytes.get(range)
    }

    /// Highest object number present.
    pub fn max_object_number(&self) -> u32 {
        self.objects.keys().next_back().copied().unwrap_or(0)
    }
}

/// Version string from the `%PDF-x.y` header.
fn parse_header(bytes: &[u8]) -> Result<String> {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_LIMIT)];
    let pos = find_bytes(window, b"%PDF-", 0).ok_or_else(|| {
        Error::InvalidHeader(format!("'%PDF-' not found in the first {} bytes", HEADER_SEARCH_LIMIT))
    })?;
    if pos > 0 {
        log::debug!("{} bytes of garbage before header", pos);
    }

    let rest = &bytes[pos + 5..];
    let len = rest
        .iter()
        .take_while(|b| b.is_ascii_digit() || **b == b'.')
        .count();
    let version = std::str::from_utf8(&rest[..len]).unwrap_or_default();
    if version.is_empty() || !version.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(Error::InvalidHeader(format!("invalid version after '%PDF-': {:?}", version)));
    }
    Ok(version.to_string())
}

/// Cross-reference table and the `startxref` it came from; the offset is
/// `None` when the table was rebuilt.
fn load_xref(bytes: &[u8], options: &ParserOptions) -> Result<(CrossRefTable, Option<u64>)> {
    let regular = find_xref_offset(bytes).and_then(|offset| {
        let xref = parse_xref(bytes, offset, options)?;
        if xref.trailer().is_none() {
            return Err(Error::InvalidXref);
        }
        Ok((xref, offset))
    });

    match regular {
        Ok((xref, offset)) if !xref.is_empty() => Ok((xref, Some(offset))),
        Ok(_) if !options.allow_reconstruction => Err(Error::InvalidXref),
        Err(e) if !options.allow_reconstruction => Err(e),
        other => {
            if let Err(e) = &other {
                log::warn!("xref unreadable ({}), reconstructing", e);
            } else {
                log::warn!("xref is empty, reconstructing");
            }
            reconstruct_xref(bytes).map(|xref| (xref, None))
        },
    }
}

fn load_objects(
    bytes: &[u8],
    xref: &CrossRefTable,
    reconstructed: bool,
    options: &ParserOptions,
) -> Result<BTreeMap<u32, SourceObject>> {
    let mut objects = BTreeMap::new();
    let mut compressed: HashMap<u32, Vec<u32>> = HashMap::new();
    let mut fallback: Option<CrossRefTable> = None;

    let mut entries: Vec<(u32, &XRefEntry)> = xref.iter().collect();
    entries.sort_unstable_by_key(|(num, _)| *num);

    for (num, entry) in entries {
        match *entry {
            XRefEntry::Free => {},
            XRefEntry::Compressed { stream, .. } => compressed.entry(stream).or_default().push(num),
            XRefEntry::InUse { offset, gen } => {
                let parsed = parse_indirect_object(bytes, offset as usize)
                    .ok()
                    .filter(|raw| raw.obj_ref == ObjectRef::new(num, gen));
                let raw = match parsed {
                    Some(raw) => raw,
                    None if options.strict => {
                        return Err(Error::ParseError {
                            offset: offset as usize,
                            reason: format!("object {} {} R not at its xref offset", num, gen),
                        });
                    },
                    None => {
                        // Offsets are often slightly wrong; look the object up by scanning.
                        if fallback.is_none() && !reconstructed {
                            fallback = reconstruct_xref(bytes).ok();
                        }
                        match relocate(bytes, fallback.as_ref(), num) {
                            Some(raw) => raw,
                            None => {
                                log::warn!("skipping unreadable object {} {} R at {}", num, gen, offset);
                                continue;
                            },
                        }
                    },
                };
                objects.insert(num, SourceObject::from_raw(raw));
            },
        }
    }

    for (container, wanted) in compressed {
        for member in extract_members(bytes, &objects, container, options) {
            if wanted.contains(&member.obj_ref.id) {
                objects.insert(member.obj_ref.id, member);
            }
        }
    }

    if reconstructed {
        // A scan sees no compressed entries; take every member not defined elsewhere.
        let containers: Vec<u32> = objects
            .values()
            .filter(|o| o.kind == ObjectKind::ObjectStream)
            .map(|o| o.obj_ref.id)
            .collect();
        for container in containers {
            for member in extract_members(bytes, &objects, container, options) {
                objects.entry(member.obj_ref.id).or_insert(member);
            }
        }
    }

    Ok(objects)
}

fn relocate(bytes: &[u8], table: Option<&CrossRefTable>, num: u32) -> Option<RawObject> {
    match table?.get(num)? {
        XRefEntry::InUse { offset, .. } => {
            let raw = parse_indirect_object(bytes, *offset as usize).ok()?;
            log::debug!("relocated {} at {}", raw.obj_ref, offset);
            Some(raw)
        },
        _ => None,
    }
}

fn extract_members(
    bytes: &[u8],
    objects: &BTreeMap<u32, SourceObject>,
    container: u32,
    options: &ParserOptions,
) -> Vec<SourceObject> {
    let Some(stream_obj) = objects.get(&container) else {
        log::warn!("object stream {} not found", container);
        return Vec::new();
    };
    let Some(data) = stream_obj.stream.clone().and_then(|r| bytes.get(r)) else {
        log::warn!("object stream {} has no data", container);
        return Vec::new();
    };
    match parse_object_stream(&stream_obj.body, data, options) {
        Ok(members) => members
            .into_iter()
            .map(|m| SourceObject {
                obj_ref: ObjectRef::new(m.id, 0),
                body: m.body,
                raw: None,
                stream: None,
                kind: ObjectKind::Plain,
                container: Some(container),
            })
            .collect(),
        Err(e) => {
            log::warn!("object stream {} unreadable: {}", container, e);
            Vec::new()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoders::compress;

    /// Assemble a file with a correct traditional xref from object bodies.
    fn build(objects: &[&str], trailer_extra: &str) -> Vec<u8> {
        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref_at = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
        for off in offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R{} >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                trailer_extra,
                xref_at
            )
            .as_bytes(),
        );
        out
    }

    fn minimal() -> Vec<u8> {
        build(
            &[
                "<< /Type /Catalog /Pages 2 0 R /AcroForm 3 0 R >>",
                "<< /Type /Pages /Kids [4 0 R] /Count 1 >>",
                "<< /Fields [] >>",
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>",
            ],
            "",
        )
    }

    #[test]
    fn test_load_minimal() {
        let source = PdfSource::from_bytes(minimal()).unwrap();
        assert_eq!(source.version(), "1.4");
        assert_eq!(source.object_count(), 4);
        assert_eq!(source.root_ref(), ObjectRef::new(1, 0));
        assert_eq!(source.max_object_number(), 4);
        assert_eq!(source.declared_size(), Some(5));
        assert!(!source.is_reconstructed());
        assert_eq!(source.object_body_by_ref(ObjectRef::new(3, 0)), Some("<< /Fields [] >>"));
        assert_eq!(source.object(ObjectRef::new(4, 0)).unwrap().kind, ObjectKind::Plain);
    }

    #[test]
    fn test_generation_must_match() {
        let source = PdfSource::from_bytes(minimal()).unwrap();
        assert!(source.object_body_by_ref(ObjectRef::new(3, 1)).is_none());
        assert!(source.object_body_by_ref(ObjectRef::new(99, 0)).is_none());
    }

    #[test]
    fn test_raw_object_bytes() {
        let source = PdfSource::from_bytes(minimal()).unwrap();
        let raw = source.raw_object(ObjectRef::new(3, 0)).unwrap();
        assert_eq!(raw, b"3 0 obj\n<< /Fields [] >>\nendobj");
    }

    #[test]
    fn test_header_required() {
        let result = PdfSource::from_bytes(b"hello world".to_vec());
        assert!(matches!(result, Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn test_header_after_garbage() {
        let mut bytes = b"junk\n".to_vec();
        bytes.extend_from_slice(&minimal());
        // Every offset is now off by five; lenient loading recovers.
        let source = PdfSource::from_bytes(bytes).unwrap();
        assert_eq!(source.object_count(), 4);
    }

    #[test]
    fn test_encrypted_rejected() {
        let bytes = build(&["<< /Type /Catalog >>", "<< /Filter /Standard >>"], " /Encrypt 2 0 R");
        assert!(matches!(PdfSource::from_bytes(bytes), Err(Error::Unsupported(_))));
    }

    #[test]
    fn test_missing_root_is_invalid() {
        let mut bytes = minimal();
        let text = String::from_utf8(bytes.clone()).unwrap().replace("/Root 1 0 R", "/Root 9 0 R");
        bytes = text.into_bytes();
        assert!(matches!(PdfSource::from_bytes(bytes), Err(Error::InvalidPdf(_))));
    }

    #[test]
    fn test_reconstructs_without_startxref() {
        let text = String::from_utf8(minimal()).unwrap();
        let cut = text.find("startxref").unwrap();
        let bytes = text[..cut].as_bytes().to_vec();
        let source = PdfSource::from_bytes(bytes.clone()).unwrap();
        assert!(source.is_reconstructed());
        assert_eq!(source.object_count(), 4);

        let strict = PdfSource::from_bytes_with_options(bytes, ParserOptions::strict());
        assert!(strict.is_err());
    }

    #[test]
    fn test_stream_and_object_stream() {
        let members = "<< /Type /Font /BaseFont /Helvetica >> [1 0 R]";
        let header = "5 0 6 39 ";
        let data = compress(format!("{}{}", header, members).as_bytes()).unwrap();
        let objstm_dict = format!(
            "<< /Type /ObjStm /N 2 /First {} /Filter /FlateDecode /Length {} >>",
            header.len(),
            data.len()
        );

        let mut out = b"%PDF-1.5\n".to_vec();
        let cat_at = out.len();
        out.extend_from_slice(b"1 0 obj\n<< /Type /Catalog >>\nendobj\n");
        let stm_at = out.len();
        out.extend_from_slice(format!("2 0 obj\n{}\nstream\n", objstm_dict).as_bytes());
        out.extend_from_slice(&data);
        out.extend_from_slice(b"\nendstream\nendobj\n");

        // Cross-reference stream: W [1 4 2], entries for objects 0..=6.
        let xref_at = out.len();
        let mut rows = Vec::new();
        let mut row = |t: u8, f2: u32, f3: u16| {
            rows.push(t);
            rows.extend_from_slice(&f2.to_be_bytes());
            rows.extend_from_slice(&f3.to_be_bytes());
        };
        row(0, 0, 65535);
        row(1, cat_at as u32, 0);
        row(1, stm_at as u32, 0);
        row(1, xref_at as u32, 0);
        row(0, 0, 0);
        row(2, 2, 0);
        row(2, 2, 1);
        out.extend_from_slice(
            format!(
                "3 0 obj\n<< /Type /XRef /Size 7 /W [1 4 2] /Root 1 0 R /Length {} >>\nstream\n",
                rows.len()
            )
            .as_bytes(),
        );
        out.extend_from_slice(&rows);
        out.extend_from_slice(format!("\nendstream\nendobj\nstartxref\n{}\n%%EOF\n", xref_at).as_bytes());

        let source = PdfSource::from_bytes(out).unwrap();
        assert_eq!(source.object(ObjectRef::new(2, 0)).unwrap().kind, ObjectKind::ObjectStream);
        assert_eq!(source.object(ObjectRef::new(3, 0)).unwrap().kind, ObjectKind::XRefStream);
        let font = source.object(ObjectRef::new(5, 0)).unwrap();
        assert_eq!(font.body, "<< /Type /Font /BaseFont /Helvetica >>");
        assert_eq!(font.container, Some(2));
        assert!(font.raw.is_none());
        assert_eq!(source.object_body_by_ref(ObjectRef::new(6, 0)), Some("[1 0 R]"));
        assert_eq!(source.max_object_number(), 6);
    }

    #[test]
    fn test_from_reader() {
        let source = PdfSource::from_reader(std::io::Cursor::new(minimal())).unwrap();
        assert_eq!(source.object_count(), 4);
    }
}
