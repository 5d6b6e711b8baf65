//! docqa-embed
//!
//! Embedding providers behind [`docqa_core::traits::Embedder`]:
//! - [`OllamaEmbedder`] asks the local inference server (`/api/embed`)
//! - [`HashingEmbedder`] is a deterministic bag-of-words fallback that needs no model
//!
//! `APP_USE_FAKE_EMBEDDINGS=1` makes [`embedder_from_settings`] pick the hashing
//! embedder whatever the configuration says.

mod hashing;
mod ollama;

use std::sync::Arc;
use std::time::Duration;

use docqa_core::config::{EmbeddingProvider, Settings};
use docqa_core::traits::Embedder;
use docqa_core::Result;

pub use hashing::HashingEmbedder;
pub use ollama::OllamaEmbedder;

/// Builds the embedder selected by `settings.embedding`.
pub fn embedder_from_settings(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    let provider = if docqa_core::config::use_fake_embeddings() {
        EmbeddingProvider::Hashing
    } else {
        settings.embedding.provider
    };
    let embedder: Arc<dyn Embedder> = match provider {
        EmbeddingProvider::Hashing => Arc::new(HashingEmbedder::new(settings.embedding.dim)?),
        EmbeddingProvider::Ollama => Arc::new(OllamaEmbedder::new(
            &settings.llm.base_url,
            &settings.embedding.model,
            Duration::from_secs(settings.llm.timeout_secs),
        )?),
    };
    tracing::info!(embedder = embedder.id(), "embedder ready");
    Ok(embedder)
}
