use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};

use docqa_core::traits::Store;
use docqa_core::types::{Chunk, ScoredChunk, StoreStats};
use docqa_core::{Error, Result};

use crate::{check_batch, check_k, cosine, rank};

struct Entry {
    chunk: Chunk,
    embedding: Vec<f32>,
    seq: i64,
}

/// Keeps everything in a `Vec` and scans it on every query.
///
/// The vector width is fixed by the first `add` and forgotten on `reset`.
#[derive(Default)]
pub struct MemoryStore {
    entries: Vec<Entry>,
    dim: Option<usize>,
    next_seq: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dim(&self) -> Option<usize> {
        self.dim
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn add(&mut self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
        let Some(dim) = check_batch(chunks, embeddings, self.dim)? else {
            return Ok(());
        };
        self.dim = Some(dim);
        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            self.entries.push(Entry { chunk: chunk.clone(), embedding: embedding.clone(), seq: self.next_seq });
            self.next_seq += 1;
        }
        Ok(())
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        check_k(k)?;
        let Some(dim) = self.dim else {
            return Ok(Vec::new());
        };
        if embedding.len() != dim {
            return Err(Error::DimensionMismatch { expected: dim, actual: embedding.len() });
        }
        let hits = self
            .entries
            .iter()
            .map(|e| (ScoredChunk { chunk: e.chunk.clone(), score: cosine(embedding, &e.embedding) }, e.seq))
            .collect();
        Ok(rank(hits, k))
    }

    async fn reset(&mut self) -> Result<()> {
        self.entries.clear();
        self.dim = None;
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.len())
    }

    async fn contains_document(&self, doc_id: &str) -> Result<bool> {
        Ok(self.entries.iter().any(|e| e.chunk.doc_id == doc_id))
    }

    async fn stats(&self) -> Result<StoreStats> {
        let mut seen = HashSet::new();
        let mut formats = BTreeMap::new();
        for e in &self.entries {
            if seen.insert(e.chunk.doc_id.as_str()) {
                *formats.entry(e.chunk.format).or_insert(0) += 1;
            }
        }
        Ok(StoreStats { documents: seen.len(), chunks: self.entries.len(), formats })
    }
}
