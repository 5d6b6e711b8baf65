use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use docqa_core::traits::Store;
use docqa_core::types::{Chunk, ScoredChunk, StoreStats};
use docqa_core::Result;

/// Cloneable handle over one store.
///
/// Writers hold the lock for the whole `add` or `reset`, so readers see the
/// store either before or after a mutation, never in between.
pub struct SharedStore<S> {
    inner: Arc<RwLock<S>>,
}

impl<S> Clone for SharedStore<S> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<S: Store> SharedStore<S> {
    pub fn new(store: S) -> Self {
        Self { inner: Arc::new(RwLock::new(store)) }
    }
}

#[async_trait]
impl<S: Store> Store for SharedStore<S> {
    async fn add(&mut self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
        self.inner.write().await.add(chunks, embeddings).await
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        self.inner.read().await.query(embedding, k).await
    }

    async fn reset(&mut self) -> Result<()> {
        self.inner.write().await.reset().await
    }

    async fn len(&self) -> Result<usize> {
        self.inner.read().await.len().await
    }

    async fn contains_document(&self, doc_id: &str) -> Result<bool> {
        self.inner.read().await.contains_document(doc_id).await
    }

    async fn stats(&self) -> Result<StoreStats> {
        self.inner.read().await.stats().await
    }
}
