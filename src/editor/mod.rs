//! Form editing over an existing PDF.
//!
//! This module provides the editing session and everything under it:
//! - [`Document`]: open, add/update/remove/list fields, write
//! - [`ObjectStore`] and [`PatchLedger`]: the patched object view
//! - field views and options ([`Field`], [`AddFieldOptions`], ...)
//! - [`SignatureAppearance`]: visible appearances for image signatures
//!
//! ## Architecture
//!
//! ```text
//! PdfSource (read-only source)
//!     ↓
//! ObjectStore (source bodies + PatchLedger, fresh object numbers)
//!     ↓
//! actions::{add_field, update_field, remove_field}
//!     ↓
//! writer: incremental update or flatten
//! ```

mod actions;
pub mod document_editor;
pub mod field_index;
pub mod form_fields;
pub mod object_store;
pub mod patch;
pub mod resolver;
pub mod signature_appearance;

pub use document_editor::Document;
pub use form_fields::{
    AddFieldOptions, Field, FieldFlags, FieldPosition, FieldSelector, FieldType, MetadataValue, UpdateOptions,
};
pub use object_store::{Checkpoint, ObjectStore};
pub use patch::{Patch, PatchLedger};
pub use signature_appearance::{ImageSignatureAppearance, SignatureAppearance};
