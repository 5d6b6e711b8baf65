//! docqa-reader
//!
//! Text extraction for the supported document formats (PDF, DOCX, plain text)
//! plus the helpers the ingest path needs around it: a format-keyed reader
//! registry, content hashing for document ids, and recursive file discovery.

pub mod docx;
pub mod pdf;
pub mod text;

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use docqa_core::traits::DocumentReader;
use docqa_core::types::{Document, DocumentFormat};
use docqa_core::{Error, Result};

pub use docx::DocxReader;
pub use pdf::PdfReader;
pub use text::TextReader;

/// Dispatches a file to the reader registered for its extension.
pub struct ReaderRegistry {
    readers: HashMap<DocumentFormat, Box<dyn DocumentReader>>,
}

impl Default for ReaderRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(DocumentFormat::Pdf, Box::new(PdfReader));
        registry.register(DocumentFormat::Docx, Box::new(DocxReader));
        registry.register(DocumentFormat::Text, Box::new(TextReader));
        registry
    }
}

impl ReaderRegistry {
    pub fn empty() -> Self {
        Self { readers: HashMap::new() }
    }

    /// Replaces any reader previously registered for `format`.
    pub fn register(&mut self, format: DocumentFormat, reader: Box<dyn DocumentReader>) {
        self.readers.insert(format, reader);
    }

    pub fn supports(&self, path: &Path) -> bool {
        DocumentFormat::from_path(path).is_some_and(|f| self.readers.contains_key(&f))
    }

    /// Extracts the text of `path` without hashing it.
    pub fn read(&self, path: &Path) -> Result<(DocumentFormat, String)> {
        let format = DocumentFormat::from_path(path).ok_or_else(|| unsupported(path))?;
        let reader = self.readers.get(&format).ok_or_else(|| unsupported(path))?;
        let text = reader.read(path)?;
        Ok((format, text))
    }

    /// Reads `path` into a [`Document`] whose id is the hash of the file bytes.
    pub fn load(&self, path: &Path) -> Result<Document> {
        let (format, text) = self.read(path)?;
        let id = content_hash(path)?;
        tracing::debug!(path = %path.display(), %format, chars = text.chars().count(), "read document");
        Ok(Document { id, path: path.to_path_buf(), format, text })
    }
}

fn unsupported(path: &Path) -> Error {
    let ext = path.extension().map(|e| e.to_string_lossy().to_string()).unwrap_or_default();
    if ext.is_empty() {
        Error::UnsupportedFormat(format!("{} has no extension", path.display()))
    } else {
        Error::UnsupportedFormat(format!(".{ext} ({})", path.display()))
    }
}

/// Hex blake3 digest of the file contents.
pub fn content_hash(path: &Path) -> Result<String> {
    let mut hasher = blake3::Hasher::new();
    let mut file = File::open(path)?;
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize().to_hex().to_string())
}

/// Expands `inputs` into a sorted file list.
///
/// Files are returned as given, supported or not, so the caller can report
/// them. Directories are walked recursively and contribute only files with a
/// supported extension.
pub fn collect_files<P: AsRef<Path>>(inputs: &[P]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        let input = input.as_ref();
        if input.is_dir() {
            let mut found: Vec<PathBuf> = walkdir::WalkDir::new(input)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| DocumentFormat::from_path(p).is_some())
                .collect();
            found.sort();
            tracing::debug!(dir = %input.display(), files = found.len(), "scanned directory");
            files.extend(found);
        } else {
            files.push(input.to_path_buf());
        }
    }
    files.dedup();
    files
}
