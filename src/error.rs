//! Error types for the form editing library.
//!
//! Construction and write failures surface as [`Error`]. Field-level actions
//! use these variants internally and report misses to callers as `false` or
//! `None` instead.

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while reading, editing or writing a PDF.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// Invalid PDF header (expected '%PDF-')
    #[error("Invalid PDF header: expected '%PDF-', found '{0}'")]
    InvalidHeader(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Invalid cross-reference table
    #[error("Invalid cross-reference table")]
    InvalidXref,

    /// Referenced object has neither a patch nor an original body
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unsupported feature
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Invalid PDF structure (missing catalog, unreadable trailer)
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Unsupported stream filter
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Image error
    #[error("Image error: {0}")]
    Image(String),

    /// A dictionary or array body could not be edited
    #[error("Malformed structure: {0}")]
    MalformedStructure(String),

    /// An indirect `/Fields` or `/Annots` array points at a missing object
    #[error("Unresolved array for {key}: {array_ref}")]
    UnresolvedArray {
        /// Dictionary key that holds the reference
        key: String,
        /// Reference that could not be resolved
        array_ref: crate::object::ObjectRef,
    },

    /// Recursion depth limit exceeded
    #[error("Recursion depth limit exceeded (max: {0})")]
    RecursionLimitExceeded(u32),
}
