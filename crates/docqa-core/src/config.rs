//! Layered configuration and path helpers.
//!
//! Uses Figment to merge built-in defaults, `config.toml`,
//! `config.<env>.toml` and `APP_*` env vars (`__` separates nested keys, so
//! `APP_LLM__MODEL=mistral` sets `llm.model`). Provides helpers to expand `~`
//! and `${VAR}` and to resolve relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::chunker::ChunkingConfig;
use crate::error::{Error, Result};
use crate::prompt::PromptConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub prompt: PromptConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    /// Hits scoring below this cosine similarity are dropped; `-inf` keeps every hit.
    pub min_score: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3, min_score: f32::NEG_INFINITY }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    /// Leave a server started by this process running after exit.
    pub keep_server_running: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            model: "llama3.1:8b".into(),
            timeout_secs: 120,
            temperature: 0.7,
            top_p: 0.9,
            max_tokens: 2000,
            keep_server_running: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    Ollama,
    Hashing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub model: String,
    /// Only used by the hashing provider; server models report their own size.
    pub dim: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { provider: EmbeddingProvider::Ollama, model: "nomic-embed-text".into(), dim: 1024 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: String,
    pub table: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: "knowledge_base".into(), table: "document_chunks".into() }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        if self.retrieval.top_k == 0 {
            return Err(Error::InvalidConfig("retrieval.top_k must be greater than 0".into()));
        }
        if self.retrieval.min_score.is_nan() {
            return Err(Error::InvalidConfig("retrieval.min_score must be a number".into()));
        }
        if self.prompt.budget == 0 {
            return Err(Error::InvalidConfig("prompt.budget must be greater than 0".into()));
        }
        if self.llm.timeout_secs == 0 {
            return Err(Error::InvalidConfig("llm.timeout_secs must be greater than 0".into()));
        }
        if self.embedding.provider == EmbeddingProvider::Hashing && self.embedding.dim == 0 {
            return Err(Error::InvalidConfig("embedding.dim must be greater than 0".into()));
        }
        if self.store.table.trim().is_empty() {
            return Err(Error::InvalidConfig("store.table must not be empty".into()));
        }
        Ok(())
    }

    /// Store directory after `~`/`${VAR}` expansion, relative to `base`.
    pub fn store_path(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.store.path)
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_for_env(None)
    }

    pub fn load_for_env(env_name: Option<&str>) -> Result<Self> {
        let env_name = env_name
            .map(str::to_string)
            .unwrap_or_else(|| env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string()));

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            other => tracing::warn!(env = other, "unknown RUST_ENV, using config.toml only"),
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    /// Extracts and validates the full settings tree.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        if use_fake_embeddings() {
            settings.embedding.provider = EmbeddingProvider::Hashing;
        }
        settings.validate()?;
        Ok(settings)
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }
}

/// `APP_USE_FAKE_EMBEDDINGS=1|true` switches to the offline hashing embedder.
pub fn use_fake_embeddings() -> bool {
    env::var("APP_USE_FAKE_EMBEDDINGS")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::TextMeasure;
    use figment::Jail;

    #[test]
    fn defaults_without_files() {
        Jail::expect_with(|_jail| {
            let s = Config::load_for_env(Some("dev")).unwrap().settings().unwrap();
            assert_eq!(s.chunking.max_size, 1000);
            assert_eq!(s.chunking.overlap, 200);
            assert_eq!(s.retrieval.top_k, 3);
            assert_eq!(s.llm.base_url, "http://localhost:11434");
            assert_eq!(s.store.table, "document_chunks");
            assert_eq!(s.prompt.measure, TextMeasure::Chars);
            assert_eq!(s.retrieval.min_score, f32::NEG_INFINITY);
            Ok(())
        });
    }

    #[test]
    fn env_file_overrides_base_and_env_vars_override_files() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[llm]\nmodel = \"base-model\"\n[retrieval]\ntop_k = 5\n")?;
            jail.create_file("config.prod.toml", "[llm]\nmodel = \"prod-model\"\n")?;
            jail.set_env("APP_RETRIEVAL__TOP_K", "7");
            let s = Config::load_for_env(Some("prod")).unwrap().settings().unwrap();
            assert_eq!(s.llm.model, "prod-model");
            assert_eq!(s.retrieval.top_k, 7);
            // untouched sections keep their defaults
            assert_eq!(s.chunking.max_size, 1000);
            Ok(())
        });
    }

    #[test]
    fn min_score_floor_can_be_set() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[retrieval]\nmin_score = 0.25\n")?;
            let s = Config::load_for_env(Some("dev")).unwrap().settings().unwrap();
            assert_eq!(s.retrieval.min_score, 0.25);
            Ok(())
        });
    }

    #[test]
    fn invalid_chunking_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[chunking]\nmax_size = 100\noverlap = 100\n")?;
            let err = Config::load_for_env(Some("dev")).unwrap().settings().unwrap_err();
            assert!(matches!(err, Error::InvalidConfig(_)));
            Ok(())
        });
    }

    #[test]
    fn fake_embeddings_flag_forces_hashing() {
        Jail::expect_with(|jail| {
            jail.set_env("APP_USE_FAKE_EMBEDDINGS", "1");
            let s = Config::load_for_env(Some("test")).unwrap().settings().unwrap();
            assert_eq!(s.embedding.provider, EmbeddingProvider::Hashing);
            Ok(())
        });
    }

    #[test]
    fn get_reads_single_keys() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[store]\npath = \"~/kb\"\n")?;
            let cfg = Config::load_for_env(Some("dev")).unwrap();
            let path: String = cfg.get("store.path").unwrap();
            assert_eq!(path, "~/kb");
            Ok(())
        });
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let base = Path::new("/srv/app");
        assert_eq!(resolve_with_base(base, "kb"), PathBuf::from("/srv/app/kb"));
        assert_eq!(resolve_with_base(base, "/var/kb"), PathBuf::from("/var/kb"));
    }
}
