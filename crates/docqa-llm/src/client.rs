use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use docqa_core::config::LlmConfig;
use docqa_core::traits::Generator;
use docqa_core::{Error, Result};

use crate::{base, transport_error};

/// Sampling parameters sent with every generation request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self { temperature: 0.7, top_p: 0.9, max_tokens: 2000 }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: RequestOptions,
}

#[derive(Serialize)]
struct RequestOptions {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
    error: Option<String>,
}

/// Non-streaming client for `/api/generate`. One request per call, no retries.
#[derive(Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    endpoint: String,
    options: GenerationOptions,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout: Duration, options: GenerationOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self { client, endpoint: format!("{}/api/generate", base(base_url)), options })
    }

    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        let options = GenerationOptions { temperature: cfg.temperature, top_p: cfg.top_p, max_tokens: cfg.max_tokens };
        Self::new(&cfg.base_url, Duration::from_secs(cfg.timeout_secs), options)
    }

    pub fn options(&self) -> GenerationOptions {
        self.options
    }
}

#[async_trait]
impl Generator for OllamaClient {
    async fn generate(&self, prompt: &str, model: &str) -> Result<String> {
        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
            options: RequestOptions {
                temperature: self.options.temperature,
                top_p: self.options.top_p,
                num_predict: self.options.max_tokens,
            },
        };
        tracing::debug!(model, prompt_chars = prompt.chars().count(), "generate request");
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(&self.endpoint, e))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| transport_error(&self.endpoint, e))?;
        let parsed: Option<GenerateResponse> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            let message = parsed.and_then(|p| p.error).unwrap_or(body);
            return Err(Error::Inference { status: Some(status.as_u16()), message });
        }
        let Some(parsed) = parsed else {
            return Err(Error::Inference { status: Some(status.as_u16()), message: format!("malformed response: {body}") });
        };
        if let Some(message) = parsed.error {
            return Err(Error::Inference { status: Some(status.as_u16()), message });
        }
        let text = parsed.response.ok_or_else(|| Error::Inference {
            status: Some(status.as_u16()),
            message: "response field missing".into(),
        })?;
        tracing::debug!(model, answer_chars = text.chars().count(), "generate finished");
        Ok(text.trim().to_string())
    }
}
