//! docqa-llm
//!
//! Talks to a local Ollama-compatible inference server:
//! - [`OllamaClient`] implements [`docqa_core::traits::Generator`] over `/api/generate`
//! - [`ServerSupervisor`] probes, starts and provisions the server

mod client;
mod supervisor;

pub use client::{GenerationOptions, OllamaClient};
pub use supervisor::{ServerHandle, ServerSupervisor, DEFAULT_STARTUP_TIMEOUT};

use docqa_core::Error;

/// Maps a transport failure onto the error taxonomy callers branch on.
pub(crate) fn transport_error(url: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(format!("no answer from {url}"))
    } else if e.is_connect() {
        Error::ServerUnavailable(format!("cannot connect to {url}"))
    } else {
        Error::Inference { status: e.status().map(|s| s.as_u16()), message: e.to_string() }
    }
}

pub(crate) fn base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
