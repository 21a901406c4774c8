//! Main form editing interface.
//!
//! Provides the [`Document`] type: one editing session over one PDF.

use std::fmt;
use std::io::Read;
use std::path::Path;

use crate::document::PdfSource;
use crate::error::Result;
use crate::parser_config::ParserOptions;
use crate::writer::{self, SaveOptions};

use super::actions;
use super::field_index;
use super::form_fields::{AddFieldOptions, Field, FieldSelector, UpdateOptions};
use super::object_store::ObjectStore;
use super::resolver;
use super::signature_appearance::{ImageSignatureAppearance, SignatureAppearance};

/// An editing session.
///
/// Actions queue patches; nothing is written until [`write`](Self::write)
/// or [`write_to`](Self::write_to). After a successful write the session
/// continues on the written bytes, so later edits and writes append further
/// incremental sections.
///
/// Field actions never fail with an error: a field that cannot be found or
/// edited yields `false` / `None` and a `log` warning, and leaves the queued
/// patches as they were.
///
/// # Example
///
/// ```no_run
/// use pdf_acroedit::{AddFieldOptions, Document, SaveOptions};
///
/// # fn main() -> pdf_acroedit::Result<()> {
/// let mut doc = Document::open("form.pdf")?;
/// let field = doc.add_field("Email", AddFieldOptions::new().rect(72.0, 700.0, 200.0, 18.0));
/// assert!(field.is_some());
/// let bytes = doc.write(&SaveOptions::incremental())?;
/// assert!(bytes.ends_with(b"%%EOF\n"));
/// # Ok(())
/// # }
/// ```
pub struct Document {
    store: ObjectStore,
    options: ParserOptions,
    appearance: Box<dyn SignatureAppearance>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("store", &self.store)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Document {
    /// Open a PDF file.
    ///
    /// # Errors
    ///
    /// Any I/O or parse failure; no session is created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(path, ParserOptions::default())
    }

    /// Open a PDF file with explicit parser options.
    pub fn open_with_options(path: impl AsRef<Path>, options: ParserOptions) -> Result<Self> {
        let source = PdfSource::open_with_options(path, options)?;
        Ok(Self::from_source(source, options))
    }

    /// Start a session over in-memory bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_bytes_with_options(bytes, ParserOptions::default())
    }

    /// Start a session over in-memory bytes with explicit parser options.
    pub fn from_bytes_with_options(bytes: Vec<u8>, options: ParserOptions) -> Result<Self> {
        let source = PdfSource::from_bytes_with_options(bytes, options)?;
        Ok(Self::from_source(source, options))
    }

    /// Start a session by reading `reader` to the end.
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let options = ParserOptions::default();
        let source = PdfSource::from_reader_with_options(reader, options)?;
        Ok(Self::from_source(source, options))
    }

    fn from_source(source: PdfSource, options: ParserOptions) -> Self {
        log::debug!(
            "session over PDF {} with {} objects",
            source.version(),
            source.object_count()
        );
        Self {
            store: ObjectStore::new(source),
            options,
            appearance: Box::new(ImageSignatureAppearance),
        }
    }

    /// Replace the provider used for signature fields whose value is an
    /// image.
    pub fn with_signature_appearance(mut self, provider: impl SignatureAppearance + 'static) -> Self {
        self.appearance = Box::new(provider);
        self
    }

    /// The object view: source plus queued patches.
    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// Mutable object view, for edits beyond the field actions.
    pub fn store_mut(&mut self) -> &mut ObjectStore {
        &mut self.store
    }

    /// `true` when patches are queued that no write has consumed yet.
    pub fn has_pending_changes(&self) -> bool {
        self.store.has_patches()
    }

    /// Number of leaf pages.
    pub fn page_count(&self) -> usize {
        resolver::page_refs(&self.store).len()
    }

    /// Every terminal field, in `/Fields` order, queued edits included.
    pub fn list_fields(&self) -> Vec<Field> {
        field_index::list_fields(&self.store)
    }

    /// The field with fully qualified name `name`.
    pub fn field(&self, name: &str) -> Option<Field> {
        field_index::find_field(&self.store, name)
    }

    /// Add a field with one widget on `options.page`.
    ///
    /// Returns `None` and queues nothing when the document has no indirect
    /// AcroForm or one of the arrays to extend cannot be resolved.
    pub fn add_field(&mut self, name: &str, options: AddFieldOptions) -> Option<Field> {
        actions::add_field(&mut self.store, self.appearance.as_ref(), name, &options)
    }

    /// Set the value of `name`, renaming it when `options.new_name` is set.
    ///
    /// Returns `false` when the field does not exist.
    pub fn update_field(&mut self, name: &str, new_value: &str, options: UpdateOptions) -> bool {
        actions::update_field(&mut self.store, self.appearance.as_ref(), name, new_value, &options)
    }

    /// Detach a field, given by name or by a [`Field`] from
    /// [`list_fields`](Self::list_fields).
    ///
    /// Returns `false` when the field is not (or no longer) registered.
    pub fn remove_field(&mut self, field: impl Into<FieldSelector>) -> bool {
        actions::remove_field(&mut self.store, field.into())
    }

    /// Serialize the session and continue from the result.
    ///
    /// # Errors
    ///
    /// Fails only if the output cannot be produced or read back.
    pub fn write(&mut self, options: &SaveOptions) -> Result<Vec<u8>> {
        let (bytes, source) = self.render(options)?;
        self.store.rebase(source);
        Ok(bytes)
    }

    /// Write to `path` atomically: the file is either fully replaced or left
    /// untouched.
    pub fn write_to(&mut self, path: impl AsRef<Path>, options: &SaveOptions) -> Result<()> {
        let (bytes, source) = self.render(options)?;
        writer::persist(path.as_ref(), &bytes)?;
        self.store.rebase(source);
        log::info!("wrote {} bytes to {}", bytes.len(), path.as_ref().display());
        Ok(())
    }

    /// Output bytes and their parsed form.
    fn render(&self, options: &SaveOptions) -> Result<(Vec<u8>, PdfSource)> {
        let bytes = writer::write(&self.store, options)?;
        let source = PdfSource::from_bytes_with_options(bytes.clone(), self.options)?;
        Ok((bytes, source))
    }
}
