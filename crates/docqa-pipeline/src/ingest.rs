//! Per-document outcomes of an ingest run.

use std::path::PathBuf;

use docqa_core::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A document with the same content hash is already stored.
    Duplicate,
    /// The reader found no text (e.g. a scanned PDF).
    NoText,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocStatus {
    Ingested { chunks: usize },
    Skipped(SkipReason),
    Failed(String),
}

/// Progress notifications, one `Started`/`Finished` pair per input path.
#[derive(Debug, Clone)]
pub enum IngestEvent {
    Started { path: PathBuf, position: usize, total: usize },
    Finished { path: PathBuf, position: usize, total: usize, status: DocStatus },
}

#[derive(Debug, Clone)]
pub struct IngestedDocument {
    pub path: PathBuf,
    pub doc_id: String,
    pub chunks: usize,
}

#[derive(Debug)]
pub struct IngestFailure {
    pub path: PathBuf,
    pub error: Error,
}

#[derive(Debug, Default)]
pub struct IngestReport {
    pub ingested: Vec<IngestedDocument>,
    pub skipped: Vec<(PathBuf, SkipReason)>,
    pub failed: Vec<IngestFailure>,
}

impl IngestReport {
    pub fn total_chunks(&self) -> usize {
        self.ingested.iter().map(|d| d.chunks).sum()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}
