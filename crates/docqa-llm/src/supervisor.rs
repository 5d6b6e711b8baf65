//! Lifecycle of the local inference server process.

use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::json;

use docqa_core::{Error, Result};

use crate::{base, transport_error};

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const PULL_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How long [`ServerSupervisor::ensure_running`] waits for a fresh server.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

#[derive(Deserialize)]
struct PullResponse {
    status: Option<String>,
    error: Option<String>,
}

/// A server process started by this program.
///
/// Dropping the handle kills and reaps the process; [`ServerHandle::detach`]
/// leaves it running instead.
#[derive(Debug)]
pub struct ServerHandle {
    child: Option<Child>,
}

impl ServerHandle {
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Lets the server outlive this handle.
    pub fn detach(mut self) {
        if let Some(child) = self.child.take() {
            tracing::info!(pid = child.id(), "leaving inference server running");
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let pid = child.id();
            if let Err(e) = child.kill() {
                tracing::warn!(pid, error = %e, "could not stop inference server");
            }
            if let Err(e) = child.wait() {
                tracing::warn!(pid, error = %e, "could not reap inference server");
            }
        }
    }
}

pub struct ServerSupervisor {
    client: reqwest::Client,
    base_url: String,
    program: String,
}

impl ServerSupervisor {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self { client, base_url: base(base_url), program: "ollama".into() })
    }

    /// Executable used by [`start`](Self::start) and [`installed_version`](Self::installed_version).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// True when `/api/tags` answers with a success status.
    pub async fn is_running(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(url, error = %e, "server probe failed");
                false
            }
        }
    }

    /// Polls once per second until the server answers or `timeout` elapses.
    pub async fn wait_until_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_running().await {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout(format!(
                    "inference server at {} not ready after {}s",
                    self.base_url,
                    timeout.as_secs()
                )));
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    /// Output of `<program> --version`, or `None` when the program is missing.
    pub async fn installed_version(&self) -> Option<String> {
        let output = tokio::process::Command::new(&self.program).arg("--version").output().await.ok()?;
        if !output.status.success() {
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Spawns `<program> serve` with all stdio discarded.
    pub fn start(&self) -> Result<ServerHandle> {
        let child = Command::new(&self.program)
            .arg("serve")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::ServerUnavailable(format!("could not start `{} serve`: {e}", self.program)))?;
        tracing::info!(pid = child.id(), program = %self.program, "started inference server");
        Ok(ServerHandle { child: Some(child) })
    }

    /// Starts the server unless one already answers. Returns the handle of a
    /// server started here.
    pub async fn ensure_running(&self, timeout: Duration) -> Result<Option<ServerHandle>> {
        if self.is_running().await {
            return Ok(None);
        }
        let handle = self.start()?;
        self.wait_until_ready(timeout).await?;
        Ok(Some(handle))
    }

    /// Names of the models the server has locally.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = self.client.get(&url).send().await.map_err(|e| transport_error(&url, e))?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(Error::Inference { status: Some(status.as_u16()), message });
        }
        let tags: TagsResponse = resp.json().await.map_err(|e| transport_error(&url, e))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Pulls `model` if the server does not have it. Returns whether a pull happened.
    pub async fn ensure_model(&self, model: &str) -> Result<bool> {
        let models = self.list_models().await?;
        let latest = format!("{model}:latest");
        if models.iter().any(|m| m == model || *m == latest) {
            return Ok(false);
        }
        tracing::info!(model, "pulling model, this can take a while");
        let url = format!("{}/api/pull", self.base_url);
        let resp = self
            .client
            .post(&url)
            .timeout(PULL_TIMEOUT)
            .json(&json!({ "model": model, "stream": false }))
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| transport_error(&url, e))?;
        let parsed: Option<PullResponse> = serde_json::from_str(&body).ok();
        match parsed {
            Some(PullResponse { error: Some(message), .. }) => Err(Error::Inference { status: Some(status.as_u16()), message }),
            _ if !status.is_success() => Err(Error::Inference { status: Some(status.as_u16()), message: body }),
            Some(PullResponse { status: Some(s), .. }) if s == "success" => {
                tracing::info!(model, "model ready");
                Ok(true)
            }
            _ => Err(Error::Inference { status: Some(status.as_u16()), message: format!("unexpected pull reply: {body}") }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_is_server_unavailable() {
        let sup = ServerSupervisor::new("http://127.0.0.1:9").unwrap().with_program("definitely-not-an-installed-binary");
        assert!(matches!(sup.start(), Err(Error::ServerUnavailable(_))));
    }

    #[test]
    fn dropping_handle_stops_the_process() {
        let child = Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id();
        let handle = ServerHandle { child: Some(child) };
        assert_eq!(handle.id(), Some(pid));
        drop(handle);
        // reaped, so the pid no longer has a /proc entry (or was reused by an unrelated process)
        let status = std::fs::read_to_string(format!("/proc/{pid}/cmdline")).unwrap_or_default();
        assert!(!status.contains("sleep"));
    }

    #[tokio::test]
    async fn missing_program_has_no_version() {
        let sup = ServerSupervisor::new("http://127.0.0.1:9").unwrap().with_program("definitely-not-an-installed-binary");
        assert_eq!(sup.installed_version().await, None);
    }
}
