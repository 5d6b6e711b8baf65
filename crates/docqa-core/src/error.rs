use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Prompt too large: {size} exceeds budget {budget} even without context")]
    PromptTooLarge { size: usize, budget: usize },

    #[error("Inference server unavailable: {0} (start the server and retry once)")]
    ServerUnavailable(String),

    #[error("Inference failed{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Inference { status: Option<u16>, message: String },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Corrupt file {}: {reason}", .path.display())]
    CorruptFile { path: PathBuf, reason: String },

    #[error("Store failure: {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap any backend error as a store failure.
    pub fn store<E: std::fmt::Display>(e: E) -> Self {
        Self::Store(e.to_string())
    }

    /// Whether a caller may reasonably try the same operation again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ServerUnavailable(_) | Self::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
