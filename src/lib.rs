#![allow(clippy::too_many_arguments)]
#![allow(clippy::enum_variant_names)]
#![allow(clippy::should_implement_trait)]

//! # PDF AcroEdit
//!
//! Edit the interactive form (AcroForm) of an existing PDF without
//! re-rendering it: add, rename, update and remove form fields and their
//! widget annotations, then save either as an incremental update appended to
//! the original bytes or as a single-generation rewrite.
//!
//! ## Architecture
//!
//! ```text
//! PdfSource (original bytes, xref, object bodies as text)
//!     ↓
//! ObjectStore + PatchLedger (last-writer-wins overlay, fresh numbers)
//!     ↓
//! Field actions (add / update / remove) via DictScan text surgery
//!     ↓
//! Writer: incremental section chained with /Prev, or flatten
//! ```
//!
//! Object bodies are never parsed into a tree. Edits splice the exact text
//! of one value inside a dictionary or array and leave every other byte as
//! it was.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdf_acroedit::{AddFieldOptions, Document, SaveOptions, UpdateOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut doc = Document::open("form.pdf")?;
//!
//! doc.add_field("Email", AddFieldOptions::new().value("a@b.c").page(1));
//! doc.update_field("Name", "Jane", UpdateOptions::default());
//! doc.remove_field("Obsolete");
//!
//! for field in doc.list_fields() {
//!     println!("{}", field);
//! }
//!
//! doc.write_to("form-filled.pdf", &SaveOptions::incremental())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## License
//!
//! Licensed under either of:
//!
//! * Apache License, Version 2.0 (<http://www.apache.org/licenses/LICENSE-2.0>)
//! * MIT license (<http://opensource.org/licenses/MIT>)
//!
//! at your option.

#![warn(missing_docs)]

// Error handling
pub mod error;

// Core PDF reading
pub mod document;
pub mod lexer;
pub mod object;
pub mod objstm;
pub mod parser;
/// Parser configuration options
pub mod parser_config;
pub mod xref;
pub mod xref_reconstruction;

// Stream decoders
pub mod decoders;

// Dictionary/array text surgery
pub mod dict_scan;

// Form editing
pub mod editor;

// Output
pub mod writer;

// Re-exports
pub use document::PdfSource;
pub use editor::{
    AddFieldOptions, Document, Field, FieldFlags, FieldPosition, FieldSelector, FieldType,
    ImageSignatureAppearance, MetadataValue, ObjectStore, Patch, PatchLedger, SignatureAppearance,
    UpdateOptions,
};
pub use error::{Error, Result};
pub use object::{Literal, ObjectRef};
pub use parser_config::ParserOptions;
pub use writer::SaveOptions;

// Internal utilities
pub(crate) mod utils {
    //! Internal utility functions for the library.
    //!
    //! Object bodies are held as `String`s in which every char stands for
    //! exactly one source byte (Latin-1), so binary bytes inside strings
    //! survive a read/splice/write cycle unchanged.

    /// Map each byte to the char with the same code point.
    pub fn bytes_to_latin1(bytes: &[u8]) -> String {
        bytes.iter().map(|&b| b as char).collect()
    }

    /// Inverse of [`bytes_to_latin1`]. Chars above U+00FF (only possible in
    /// text supplied by callers) are written as UTF-8.
    pub fn latin1_to_bytes(text: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(text.len());
        for c in text.chars() {
            let code = c as u32;
            if code <= 0xFF {
                out.push(code as u8);
            } else {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
        out
    }

    /// Position of the last occurrence of `needle` in `haystack`.
    pub fn rfind_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        if needle.is_empty() || needle.len() > haystack.len() {
            return None;
        }
        (0..=haystack.len() - needle.len())
            .rev()
            .find(|&i| &haystack[i..i + needle.len()] == needle)
    }

    /// Position of the first occurrence of `needle` at or after `from`.
    pub fn find_bytes(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
        if needle.is_empty() || from >= haystack.len() {
            return None;
        }
        haystack[from..]
            .windows(needle.len())
            .position(|w| w == needle)
            .map(|p| p + from)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_latin1_round_trip() {
            let bytes: Vec<u8> = (0u8..=255).collect();
            assert_eq!(latin1_to_bytes(&bytes_to_latin1(&bytes)), bytes);
        }

        #[test]
        fn test_latin1_wide_chars_become_utf8() {
            assert_eq!(latin1_to_bytes("€"), "€".as_bytes());
        }

        #[test]
        fn test_find_bytes() {
            assert_eq!(find_bytes(b"abcabc", b"bc", 0), Some(1));
            assert_eq!(find_bytes(b"abcabc", b"bc", 2), Some(4));
            assert_eq!(find_bytes(b"abc", b"x", 0), None);
            assert_eq!(rfind_bytes(b"abcabc", b"ab"), Some(3));
            assert_eq!(rfind_bytes(b"a", b"ab"), None);
        }
    }
}

// Version info
/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
