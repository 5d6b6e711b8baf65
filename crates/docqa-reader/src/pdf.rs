use std::fs::File;
use std::io::Read;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use docqa_core::traits::DocumentReader;
use docqa_core::{Error, Result};

/// Extracts the text layer of a PDF. Scanned pages without text come back empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfReader;

impl DocumentReader for PdfReader {
    fn read(&self, path: &Path) -> Result<String> {
        let mut bytes = Vec::new();
        File::open(path)?.read_to_end(&mut bytes)?;
        // pdf-extract panics on some malformed inputs instead of returning an error
        let extracted = catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(&bytes)));
        match extracted {
            Ok(Ok(text)) => Ok(text.trim().to_string()),
            Ok(Err(e)) => Err(Error::CorruptFile { path: path.to_path_buf(), reason: e.to_string() }),
            Err(_) => Err(Error::CorruptFile { path: path.to_path_buf(), reason: "PDF parser aborted".into() }),
        }
    }
}
