//! Incremental update: the original bytes followed by one new section.

use crate::editor::ObjectStore;
use crate::error::Result;

use super::object_serializer::{write_indirect, write_trailer, write_xref_subsections, XrefLine};
use super::{normalize_eof, Flatten, OutputStrategy};

/// Appends each touched object once (its latest patch), an xref section for
/// just those objects and a trailer chained to the previous one by `/Prev`.
///
/// A source whose xref had to be reconstructed has no section to chain to
/// and is written with [`Flatten`] instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct IncrementalUpdate;

impl OutputStrategy for IncrementalUpdate {
    fn name(&self) -> &'static str {
        "incremental"
    }

    fn write(&self, store: &ObjectStore) -> Result<Vec<u8>> {
        let source = store.source();
        if !store.has_patches() {
            return Ok(normalize_eof(source.bytes()));
        }
        let Some(prev) = source.startxref() else {
            log::warn!("source xref was reconstructed, writing a flattened file instead");
            return Flatten.write(store);
        };

        let mut out = source.bytes().to_vec();
        if !out.ends_with(b"\n") && !out.ends_with(b"\r") {
            out.push(b'\n');
        }

        let mut entries: Vec<XrefLine> = Vec::new();
        for patch in store.ledger().resolved() {
            let offset = out.len() as u64;
            let stream = store.stream_data(patch.obj_ref);
            write_indirect(&mut out, patch.obj_ref, &patch.body, stream.as_deref())?;
            let line = XrefLine {
                id: patch.obj_ref.id,
                offset,
                gen: patch.obj_ref.gen,
            };
            // Two generations of one number: the later one wins.
            match entries.last_mut() {
                Some(last) if last.id == line.id => *last = line,
                _ => entries.push(line),
            }
        }

        let highest_patched = entries.last().map(|e| e.id).unwrap_or(0);
        let declared = source.declared_size().map(|s| s.saturating_sub(1)).unwrap_or(0);
        let size = source.max_object_number().max(declared).max(highest_patched) + 1;

        let xref_offset = out.len();
        write_xref_subsections(&mut out, &entries)?;
        write_trailer(&mut out, source, size, Some(prev), xref_offset)?;
        log::debug!("incremental section: {} objects, /Prev {}", entries.len(), prev);
        Ok(out)
    }
}
