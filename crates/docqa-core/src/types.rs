//! Domain types shared by readers, stores and the pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

pub type ChunkId = String;
pub type Embedding = Vec<f32>;

/// Source formats the readers understand.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Text,
}

impl DocumentFormat {
    /// Resolve a format from a file extension, case-insensitively.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "txt" => Some(Self::Text),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Text => "txt",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "txt" | "text" => Some(Self::Text),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document as read from disk. Only its chunks outlive ingestion.
///
/// - `id`: content hash of the file bytes, stable across renames
/// - `path`: where the file was read from
/// - `format`: which reader produced `text`
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub path: PathBuf,
    pub format: DocumentFormat,
    pub text: String,
}

impl Document {
    /// File name used to label chunks in prompts and listings.
    pub fn source_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.to_string_lossy().to_string())
    }
}

/// A bounded span of one document's text, the unit of indexing.
///
/// - `id`: `"{doc_id}:{index}"`
/// - `doc_id`: owning document's content hash
/// - `source`: owning document's file name
/// - `format`: owning document's format
/// - `index`/`total`: position within the parent document
/// - `overlap`: leading characters repeated from the previous chunk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub id: ChunkId,
    pub doc_id: String,
    pub source: String,
    pub format: DocumentFormat,
    pub index: usize,
    pub total: usize,
    pub overlap: usize,
    pub content: String,
}

/// A chunk paired with its similarity to a query. Higher is closer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Summary counts over a knowledge store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreStats {
    pub documents: usize,
    pub chunks: usize,
    pub formats: BTreeMap<DocumentFormat, usize>,
}
