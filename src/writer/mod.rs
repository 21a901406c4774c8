//! PDF output for an editing session.
//!
//! Two strategies turn the source bytes plus the patch ledger into a file:
//!
//! ```text
//! ObjectStore (source + PatchLedger)
//!     ↓
//! SaveOptions::incremental() → [IncrementalUpdate]
//!     original bytes, touched objects, xref subsections, trailer with /Prev
//! SaveOptions::flatten()     → [Flatten]
//!     one generation: every object, one xref table, trailer without /Prev
//!     ↓
//! PDF bytes (always `%PDF-` ... `%%EOF\n`)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use pdf_acroedit::{Document, SaveOptions};
//!
//! # fn main() -> pdf_acroedit::Result<()> {
//! let mut doc = Document::open("form.pdf")?;
//! doc.update_field("Name", "Jane", Default::default());
//! doc.write_to("flat.pdf", &SaveOptions::flatten())?;
//! # Ok(())
//! # }
//! ```

mod flatten;
mod incremental;
mod object_serializer;

use std::io::Write;
use std::path::Path;

use crate::editor::ObjectStore;
use crate::error::{Error, Result};
use crate::utils::rfind_bytes;

pub use flatten::Flatten;
pub use incremental::IncrementalUpdate;

/// Options for writing a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Rewrite as a single generation instead of appending an update
    pub flatten: bool,
}

impl SaveOptions {
    /// Append an incremental update (default).
    pub fn incremental() -> Self {
        Self { flatten: false }
    }

    /// Rewrite the whole file as one generation.
    pub fn flatten() -> Self {
        Self { flatten: true }
    }

    /// The strategy these options select.
    pub fn strategy(&self) -> Box<dyn OutputStrategy> {
        if self.flatten {
            Box::new(Flatten)
        } else {
            Box::new(IncrementalUpdate)
        }
    }
}

/// One way of serializing an [`ObjectStore`].
pub trait OutputStrategy {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Produce the complete output file.
    fn write(&self, store: &ObjectStore) -> Result<Vec<u8>>;
}

/// Serialize `store` with the strategy selected by `options`.
pub fn write(store: &ObjectStore, options: &SaveOptions) -> Result<Vec<u8>> {
    let strategy = options.strategy();
    let out = strategy.write(store)?;
    log::debug!(
        "{} output: {} bytes, {} patches",
        strategy.name(),
        out.len(),
        store.ledger().len()
    );
    Ok(out)
}

/// Write `bytes` to `path` through a temporary file in the same directory,
/// renamed into place once flushed.
pub fn persist(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// Source bytes ending in exactly one `%%EOF\n`.
///
/// Whitespace after the last `%%EOF` is dropped; a file with anything else
/// after it (or no marker at all) gets a marker appended.
pub(crate) fn normalize_eof(bytes: &[u8]) -> Vec<u8> {
    const EOF: &[u8] = b"%%EOF";
    if let Some(pos) = rfind_bytes(bytes, EOF) {
        let end = pos + EOF.len();
        if bytes[end..].iter().all(u8::is_ascii_whitespace) {
            let mut out = Vec::with_capacity(end + 1);
            out.extend_from_slice(&bytes[..end]);
            out.push(b'\n');
            return out;
        }
    }
    let mut out = bytes.to_vec();
    if !out.ends_with(b"\n") {
        out.push(b'\n');
    }
    out.extend_from_slice(b"%%EOF\n");
    out
}
