//! TOML configuration.
//!
//! ```toml
//! [db]
//! path = "./data/repolens.sqlite"
//!
//! [github]
//! max_concurrent_requests = 8
//!
//! [embedding]
//! provider = "ollama"
//! model = "nomic-embed-text"
//! dims = 768
//!
//! [llm]
//! provider = "openai"
//! base_url = "https://api.groq.com/openai/v1"
//! model = "llama-3.1-8b-instant"
//! ```
//!
//! Every section except `[db]` has defaults. [`load_config`] validates the
//! result before any collaborator is contacted.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use repolens_core::chunk::{DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP_RATIO};
use repolens_core::search::DEFAULT_TOP_K;
use repolens_core::summary::{DEFAULT_MAX_CHARS, DEFAULT_MAX_FILE_SIZE};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GithubConfig {
    pub api_url: String,
    /// Environment variable holding the API token. The token is optional.
    pub token_env: String,
    /// Upper bound on in-flight requests during a directory walk.
    pub max_concurrent_requests: usize,
    /// Directories deeper than this are recorded empty.
    pub max_depth: usize,
    pub timeout_secs: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
            max_concurrent_requests: 8,
            max_depth: 32,
            timeout_secs: 30,
        }
    }
}

impl GithubConfig {
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env).ok().filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the `ollama` provider, or an OpenAI-compatible endpoint.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
    /// Most chunks sent to the provider in one request.
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            max_retries: default_embedding_retries(),
            timeout_secs: default_embedding_timeout(),
            batch_size: default_embedding_batch_size(),
        }
    }
}

fn default_embedding_provider() -> String {
    "disabled".to_string()
}
fn default_embedding_retries() -> u32 {
    5
}
fn default_embedding_timeout() -> u64 {
    30
}
fn default_embedding_batch_size() -> usize {
    64
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    /// `"openai"` (any OpenAI-compatible endpoint) or `"ollama"`.
    pub provider: String,
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub max_retries: u32,
    pub timeout_secs: u64,
    pub summary_temperature: f32,
    pub answer_temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.1".to_string(),
            api_key_env: "LLM_API_KEY".to_string(),
            max_retries: 3,
            timeout_secs: 120,
            summary_temperature: 0.3,
            answer_temperature: 0.4,
        }
    }
}

impl LlmConfig {
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in characters.
    pub chunk_size: usize,
    pub overlap_ratio: f64,
    /// Bound on the stored preview. Defaults to `chunk_size`.
    pub preview_chars: Option<usize>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap_ratio: DEFAULT_OVERLAP_RATIO,
            preview_chars: None,
        }
    }
}

impl ChunkingConfig {
    pub fn preview_limit(&self) -> usize {
        self.preview_chars.unwrap_or(self.chunk_size)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SummaryConfig {
    /// Character budget of the text sent for summarization.
    pub max_chars: usize,
    /// Size ceiling (bytes) for files outside the priority list.
    pub max_file_size: u64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    /// Mark embedding and summarization `failed` when ingestion fails.
    pub cascade_ingest_failure: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cascade_ingest_failure: true,
        }
    }
}

impl Config {
    /// Defaults for everything, with the database at `db_path`.
    pub fn with_db_path(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            github: GithubConfig::default(),
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            summary: SummaryConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate a configuration document.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.github.max_concurrent_requests == 0 {
        bail!("github.max_concurrent_requests must be > 0");
    }

    if config.chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }
    if !(0.0..1.0).contains(&config.chunking.overlap_ratio) {
        bail!("chunking.overlap_ratio must be in [0.0, 1.0)");
    }
    if config.chunking.preview_chars == Some(0) {
        bail!("chunking.preview_chars must be > 0");
    }

    if config.retrieval.top_k < 1 {
        bail!("retrieval.top_k must be >= 1");
    }

    if config.summary.max_chars == 0 {
        bail!("summary.max_chars must be > 0");
    }

    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "local" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.unwrap_or(0) == 0 {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }

    match config.llm.provider.as_str() {
        "openai" | "ollama" => {}
        other => bail!("Unknown LLM provider: '{}'. Must be openai or ollama.", other),
    }
    if config.llm.model.trim().is_empty() {
        bail!("llm.model must not be empty");
    }
    for (name, t) in [
        ("llm.summary_temperature", config.llm.summary_temperature),
        ("llm.answer_temperature", config.llm.answer_temperature),
    ] {
        if !(0.0..=2.0).contains(&t) {
            bail!("{} must be in [0.0, 2.0]", name);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let cfg = parse_config("[db]\npath = \"./data/x.sqlite\"\n").unwrap();
        assert_eq!(cfg.github.api_url, "https://api.github.com");
        assert_eq!(cfg.github.max_concurrent_requests, 8);
        assert_eq!(cfg.chunking.chunk_size, 1024);
        assert_eq!(cfg.chunking.preview_limit(), 1024);
        assert_eq!(cfg.retrieval.top_k, 5);
        assert_eq!(cfg.summary.max_chars, 8000);
        assert!(cfg.pipeline.cascade_ingest_failure);
        assert!(!cfg.embedding.is_enabled());
        assert_eq!(cfg.embedding.batch_size, 64);
    }

    #[test]
    fn test_missing_db_section_rejected() {
        assert!(parse_config("[retrieval]\ntop_k = 3\n").is_err());
    }

    #[test]
    fn test_enabled_embedding_requires_model_and_dims() {
        let err = parse_config("[db]\npath = \"x\"\n[embedding]\nprovider = \"openai\"\n")
            .unwrap_err()
            .to_string();
        assert!(err.contains("embedding.model"));

        let err = parse_config(
            "[db]\npath = \"x\"\n[embedding]\nprovider = \"ollama\"\nmodel = \"m\"\ndims = 0\n",
        )
        .unwrap_err()
        .to_string();
        assert!(err.contains("embedding.dims"));
    }

    #[test]
    fn test_rejects_bad_ranges() {
        assert!(parse_config("[db]\npath = \"x\"\n[chunking]\noverlap_ratio = 1.0\n").is_err());
        assert!(parse_config("[db]\npath = \"x\"\n[retrieval]\ntop_k = 0\n").is_err());
        assert!(
            parse_config("[db]\npath = \"x\"\n[github]\nmax_concurrent_requests = 0\n").is_err()
        );
        assert!(parse_config("[db]\npath = \"x\"\n[llm]\nprovider = \"groq\"\n").is_err());
        assert!(parse_config("[db]\npath = \"x\"\n[embedding]\nbatch_size = 0\n").is_err());
    }
}
