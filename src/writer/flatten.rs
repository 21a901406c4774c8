//! Single-generation rewrite.

use std::collections::BTreeMap;
use std::io::Write;

use crate::document::ObjectKind;
use crate::editor::ObjectStore;
use crate::error::Result;

use super::object_serializer::{write_indirect, write_trailer};
use super::OutputStrategy;

/// Rewrites every object once, patches applied, with one full xref table
/// and a trailer without `/Prev`.
///
/// Unpatched objects that sit directly in the file are copied byte for
/// byte. Members of object streams are written as plain objects; the
/// object streams and cross-reference streams themselves are dropped, and
/// their numbers become free entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct Flatten;

impl OutputStrategy for Flatten {
    fn name(&self) -> &'static str {
        "flatten"
    }

    fn write(&self, store: &ObjectStore) -> Result<Vec<u8>> {
        let source = store.source();
        let mut out = Vec::new();
        writeln!(out, "%PDF-{}", source.version())?;
        out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

        // Object number -> (offset, generation)
        let mut offsets: BTreeMap<u32, (usize, u16)> = BTreeMap::new();
        for obj_ref in store.object_refs() {
            if let Some(patch) = store.ledger().latest(obj_ref) {
                offsets.insert(obj_ref.id, (out.len(), obj_ref.gen));
                let stream = store.stream_data(obj_ref);
                write_indirect(&mut out, obj_ref, &patch.body, stream.as_deref())?;
                continue;
            }

            let Some(object) = source.object(obj_ref) else {
                continue;
            };
            if matches!(object.kind, ObjectKind::ObjectStream | ObjectKind::XRefStream) {
                log::debug!("dropping {:?} {}", object.kind, obj_ref);
                continue;
            }
            offsets.insert(obj_ref.id, (out.len(), obj_ref.gen));
            match source.raw_object(obj_ref) {
                Some(raw) => {
                    out.extend_from_slice(raw);
                    if !raw.ends_with(b"endobj") {
                        out.extend_from_slice(b"\nendobj");
                    }
                    out.push(b'\n');
                },
                None => write_indirect(&mut out, obj_ref, &object.body, None)?,
            }
        }

        let size = offsets.keys().next_back().map(|id| id + 1).unwrap_or(1);
        let free: Vec<u32> = (1..size).filter(|id| !offsets.contains_key(id)).collect();

        let xref_offset = out.len();
        writeln!(out, "xref")?;
        writeln!(out, "0 {}", size)?;
        write!(out, "{:010} 65535 f \n", free.first().copied().unwrap_or(0))?;
        let mut next_free = free.iter().skip(1);
        for id in 1..size {
            match offsets.get(&id) {
                Some((offset, gen)) => write!(out, "{:010} {:05} n \n", offset, gen)?,
                None => write!(out, "{:010} 00001 f \n", next_free.next().copied().unwrap_or(0))?,
            }
        }

        write_trailer(&mut out, source, size, None, xref_offset)?;
        log::debug!("flattened {} objects, {} free", offsets.len(), free.len());
        Ok(out)
    }
}
