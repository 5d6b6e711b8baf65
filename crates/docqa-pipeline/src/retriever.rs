use docqa_core::traits::{Embedder, Store};
use docqa_core::types::{Chunk, ScoredChunk};
use docqa_core::{Error, Result};

/// Embeds a question and looks it up in a store.
pub struct Retriever<'a, S: ?Sized> {
    embedder: &'a dyn Embedder,
    store: &'a S,
    min_score: f32,
}

impl<'a, S: Store + ?Sized> Retriever<'a, S> {
    pub fn new(embedder: &'a dyn Embedder, store: &'a S) -> Self {
        Self { embedder, store, min_score: f32::NEG_INFINITY }
    }

    /// Drops hits whose similarity is below `min_score`.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    /// Up to `k` hits, most similar first.
    pub async fn retrieve_scored(&self, question: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let embedding = self.embedder.embed(question).await.map_err(|e| match e {
            Error::Embedding(_) => e,
            other => Error::Embedding(other.to_string()),
        })?;
        let mut hits = self.store.query(&embedding, k).await?;
        hits.retain(|h| h.score >= self.min_score);
        tracing::debug!(k, hits = hits.len(), top = hits.first().map(|h| h.score), "retrieved");
        Ok(hits)
    }

    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<Chunk>> {
        Ok(self.retrieve_scored(question, k).await?.into_iter().map(|h| h.chunk).collect())
    }
}
