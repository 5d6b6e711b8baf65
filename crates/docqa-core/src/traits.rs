use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;
use crate::types::{Chunk, ScoredChunk, StoreStats};

/// Turns text into fixed-dimension vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `ollama:nomic-embed-text`).
    fn id(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embeds many texts; output order matches input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for t in texts {
            out.push(self.embed(t).await?);
        }
        Ok(out)
    }
}

/// Persistent (chunk, embedding) index with similarity search.
///
/// `add` must be all-or-nothing and `reset` must look atomic to readers.
#[async_trait]
pub trait Store: Send + Sync {
    async fn add(&mut self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()>;

    /// Top `k` chunks by cosine similarity, best first, ties to the earlier insert.
    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;

    async fn reset(&mut self) -> Result<()>;

    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    async fn contains_document(&self, doc_id: &str) -> Result<bool>;

    async fn stats(&self) -> Result<StoreStats>;
}

/// Sends a prompt to a language model and returns its answer.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str, model: &str) -> Result<String>;
}

/// Extracts raw text from one file format.
pub trait DocumentReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<String>;
}
