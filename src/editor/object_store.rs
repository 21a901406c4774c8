//! Object lookup with the patch overlay, and fresh object numbers.

use bytes::Bytes;

use crate::dict_scan;
use crate::document::PdfSource;
use crate::error::{Error, Result};
use crate::object::{Literal, ObjectRef};

use super::patch::{Patch, PatchLedger};

/// Ledger position to roll back to when an action fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    ledger_len: usize,
}

/// Current view of every object: the source bodies overlaid with the
/// ledger, last writer wins.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    source: PdfSource,
    ledger: PatchLedger,
    /// Highest number handed out or present in the source
    last_number: u32,
}

impl ObjectStore {
    /// Wrap a source with an empty ledger.
    pub fn new(source: PdfSource) -> Self {
        let declared = source.declared_size().map(|s| s.saturating_sub(1)).unwrap_or(0);
        let last_number = source.max_object_number().max(declared);
        Self {
            source,
            ledger: PatchLedger::new(),
            last_number,
        }
    }

    /// The source document.
    pub fn source(&self) -> &PdfSource {
        &self.source
    }

    /// Queued patches.
    pub fn ledger(&self) -> &PatchLedger {
        &self.ledger
    }

    /// `true` when at least one patch is queued.
    pub fn has_patches(&self) -> bool {
        !self.ledger.is_empty()
    }

    /// Current body of `obj_ref`.
    ///
    /// # Errors
    ///
    /// [`Error::ObjectNotFound`] when neither a patch nor a source object
    /// exists.
    pub fn get_object_body_with_patch(&self, obj_ref: ObjectRef) -> Result<String> {
        self.body(obj_ref)
            .map(str::to_string)
            .ok_or(Error::ObjectNotFound(obj_ref.id, obj_ref.gen))
    }

    /// Borrowing variant of [`get_object_body_with_patch`](Self::get_object_body_with_patch).
    pub fn body(&self, obj_ref: ObjectRef) -> Option<&str> {
        match self.ledger.latest(obj_ref) {
            Some(patch) => Some(patch.body.as_str()),
            None => self.source.object_body_by_ref(obj_ref),
        }
    }

    /// Look an object up by number alone, ignoring the generation.
    pub fn body_by_number(&self, id: u32) -> Option<(ObjectRef, &str)> {
        if let Some(patch) = self.ledger.latest_by_number(id) {
            return Some((patch.obj_ref, patch.body.as_str()));
        }
        self.source
            .object_by_number(id)
            .map(|o| (o.obj_ref, o.body.as_str()))
    }

    /// Current stream data of a stream object, still encoded. A patch that
    /// only replaces the dictionary keeps the source data.
    pub fn stream_data(&self, obj_ref: ObjectRef) -> Option<Bytes> {
        self.ledger
            .latest(obj_ref)
            .and_then(|patch| patch.stream.clone())
            .or_else(|| self.source.stream_data(obj_ref).map(Bytes::copy_from_slice))
    }

    /// Follow `text` if it is a reference, otherwise return it as is.
    pub fn resolve_value(&self, text: &str) -> Option<String> {
        match dict_scan::classify(text) {
            Literal::Reference(r) => self.body(r).map(str::to_string),
            _ => Some(text.to_string()),
        }
    }

    /// Queue `new_body` for `obj_ref` unless it equals `old_body`.
    ///
    /// Returns `true` when a patch was queued.
    pub fn apply_patch(&mut self, obj_ref: ObjectRef, new_body: &str, old_body: &str) -> bool {
        if new_body == old_body {
            log::debug!("{} unchanged, no patch", obj_ref);
            return false;
        }
        self.ledger.push(Patch::new(obj_ref, new_body));
        true
    }

    /// Queue a brand new object.
    pub fn push_object(&mut self, obj_ref: ObjectRef, body: impl Into<String>) {
        self.ledger.push(Patch::new(obj_ref, body));
    }

    /// Queue a brand new stream object. `/Length` in `body` must match `data`.
    pub fn push_stream_object(&mut self, obj_ref: ObjectRef, body: impl Into<String>, data: impl Into<Bytes>) {
        self.ledger.push(Patch::with_stream(obj_ref, body, data));
    }

    /// Allocate the next object number. Numbers are never reused within a
    /// session, even after a rollback.
    pub fn next_fresh_object_number(&mut self) -> u32 {
        self.last_number += 1;
        self.last_number
    }

    /// Allocate a fresh generation-0 reference.
    pub fn fresh_ref(&mut self) -> ObjectRef {
        ObjectRef::new(self.next_fresh_object_number(), 0)
    }

    /// Highest object number allocated or present so far.
    pub fn highest_object_number(&self) -> u32 {
        self.last_number
    }

    /// Remember the current ledger position.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            ledger_len: self.ledger.len(),
        }
    }

    /// Drop every patch queued since `checkpoint`.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.ledger.truncate(checkpoint.ledger_len);
    }

    /// Every reference visible through the overlay, ascending.
    pub fn object_refs(&self) -> Vec<ObjectRef> {
        let mut refs: Vec<ObjectRef> = self
            .source
            .objects()
            .map(|o| o.obj_ref)
            .chain(self.ledger.iter().map(|p| p.obj_ref))
            .collect();
        refs.sort_unstable();
        refs.dedup();
        refs
    }

    /// Catalog reference from trailer `/Root`.
    pub fn catalog_ref(&self) -> ObjectRef {
        self.source.root_ref()
    }

    /// The indirect `/AcroForm` of the catalog.
    ///
    /// `None` when the catalog has no `/AcroForm` or holds it inline.
    pub fn acroform_ref(&self) -> Option<ObjectRef> {
        let catalog = self.body(self.catalog_ref())?;
        dict_scan::ref_after("/AcroForm", catalog)
    }

    /// Swap in a freshly parsed source and forget the ledger. Object numbers
    /// keep counting from where they were.
    pub fn rebase(&mut self, source: PdfSource) {
        let declared = source.declared_size().map(|s| s.saturating_sub(1)).unwrap_or(0);
        self.last_number = self.last_number.max(source.max_object_number()).max(declared);
        self.source = source;
        self.ledger.clear();
    }
}
