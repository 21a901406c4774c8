//! Queued object replacements.
//!
//! The ledger is append-only during an action. A later patch for the same
//! reference does not replace an earlier one in the sequence; lookups simply
//! take the most recent.

use bytes::Bytes;

use crate::object::ObjectRef;

/// A replacement (or brand new) object body.
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    /// Target object
    pub obj_ref: ObjectRef,
    /// New body text
    pub body: String,
    /// Stream data for stream objects, already encoded per the body's `/Filter`
    pub stream: Option<Bytes>,
}

impl Patch {
    /// Patch without stream data.
    pub fn new(obj_ref: ObjectRef, body: impl Into<String>) -> Self {
        Self {
            obj_ref,
            body: body.into(),
            stream: None,
        }
    }

    /// Patch for a stream object.
    pub fn with_stream(obj_ref: ObjectRef, body: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            obj_ref,
            body: body.into(),
            stream: Some(data.into()),
        }
    }
}

/// Ordered list of patches; insertion order is application order.
#[derive(Debug, Clone, Default)]
pub struct PatchLedger {
    patches: Vec<Patch>,
}

impl PatchLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a patch.
    pub fn push(&mut self, patch: Patch) {
        log::debug!("queued patch for {} ({} bytes)", patch.obj_ref, patch.body.len());
        self.patches.push(patch);
    }

    /// Most recent patch targeting `obj_ref`.
    pub fn latest(&self, obj_ref: ObjectRef) -> Option<&Patch> {
        self.patches.iter().rev().find(|p| p.obj_ref == obj_ref)
    }

    /// Most recent patch for any generation of object `id`.
    pub fn latest_by_number(&self, id: u32) -> Option<&Patch> {
        self.patches.iter().rev().find(|p| p.obj_ref.id == id)
    }

    /// Every queued patch in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Patch> + '_ {
        self.patches.iter()
    }

    /// The winning patch of each touched reference, ordered by reference.
    pub fn resolved(&self) -> Vec<&Patch> {
        let mut refs: Vec<ObjectRef> = self.patches.iter().map(|p| p.obj_ref).collect();
        refs.sort_unstable();
        refs.dedup();
        refs.into_iter().filter_map(|r| self.latest(r)).collect()
    }

    /// Number of queued patches, duplicates included.
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    /// `true` when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Drop every patch after the first `len`.
    pub fn truncate(&mut self, len: usize) {
        if len < self.patches.len() {
            log::debug!("discarding {} queued patches", self.patches.len() - len);
        }
        self.patches.truncate(len);
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.patches.clear();
    }
}
