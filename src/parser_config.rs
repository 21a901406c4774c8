//! Options for reading source documents.

/// Parser options controlling recovery behavior and resource limits.
///
/// # Example
///
/// ```
/// use pdf_acroedit::parser_config::ParserOptions;
///
/// // Lenient mode - rebuild a damaged cross-reference table (default)
/// let lenient = ParserOptions::lenient();
/// assert!(lenient.allow_reconstruction);
///
/// // Strict mode - fail on a damaged cross-reference table
/// let strict = ParserOptions::strict();
/// assert!(!strict.allow_reconstruction);
///
/// // Custom configuration
/// let custom = ParserOptions {
///     max_prev_depth: 10,
///     ..ParserOptions::default()
/// };
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    /// Fail on the first structural error instead of attempting recovery
    pub strict: bool,

    /// Scan the file for `N G obj` headers when the xref cannot be read
    pub allow_reconstruction: bool,

    /// Maximum number of sections followed through `/Prev`
    pub max_prev_depth: u32,

    /// Maximum decompressed stream size in bytes (0 = unlimited)
    ///
    /// Applies to cross-reference streams and object streams.
    pub max_decompressed_size: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self::lenient()
    }
}

impl ParserOptions {
    /// Strict mode: any damaged structure is a construction error.
    pub fn strict() -> Self {
        Self {
            strict: true,
            allow_reconstruction: false,
            max_prev_depth: 100,
            max_decompressed_size: 100 * 1024 * 1024, // 100 MB
        }
    }

    /// Lenient mode: recover from damaged cross-reference data.
    pub fn lenient() -> Self {
        Self {
            strict: false,
            allow_reconstruction: true,
            max_prev_depth: 100,
            max_decompressed_size: 100 * 1024 * 1024,
        }
    }
}
