use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use docqa_core::traits::Embedder;
use docqa_core::{Error, Result};

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
    #[serde(default)]
    error: Option<String>,
}

/// Embeddings from an Ollama-compatible server.
///
/// Every failure, including an unreachable server, surfaces as
/// [`Error::Embedding`].
pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    id: String,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self {
            client,
            url: format!("{}/api/embed", base_url.trim_end_matches('/')),
            model: model.to_string(),
            id: format!("ollama:{model}"),
        })
    }

    async fn request(&self, input: &[String]) -> Result<Vec<Vec<f32>>> {
        let resp = self
            .client
            .post(&self.url)
            .json(&EmbedRequest { model: &self.model, input })
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("{} unreachable: {e}", self.url)))?;
        let status = resp.status();
        let body: EmbedResponse = resp
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("bad response from {} (HTTP {status}): {e}", self.url)))?;
        if let Some(err) = body.error {
            return Err(Error::Embedding(format!("{}: {err}", self.model)));
        }
        if !status.is_success() {
            return Err(Error::Embedding(format!("HTTP {status} from {}", self.url)));
        }
        if body.embeddings.len() != input.len() {
            return Err(Error::Embedding(format!(
                "asked for {} embeddings, server returned {}",
                input.len(),
                body.embeddings.len()
            )));
        }
        tracing::debug!(model = %self.model, count = input.len(), "embedded batch");
        Ok(body.embeddings)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut out = self.request(&[text.to_string()]).await?;
        out.pop().ok_or_else(|| Error::Embedding("empty embedding response".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }
}
