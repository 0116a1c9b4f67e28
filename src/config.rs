//! TOML configuration.
//!
//! Every section and key has a default matching the reference deployment
//! (Milvus on `127.0.0.1:19530`, Ollama on `127.0.0.1:11434`), so a config
//! file only needs the values that differ. The file is read once at process
//! start; there is no runtime reconfiguration.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub milvus: MilvusConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MilvusConfig {
    #[serde(default = "default_milvus_host")]
    pub host: String,
    #[serde(default = "default_milvus_port")]
    pub port: u16,
    #[serde(default = "default_collection_name")]
    pub collection_name: String,
    /// Bearer token (`user:password` or an API key) for secured deployments.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_milvus_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for MilvusConfig {
    fn default() -> Self {
        Self {
            host: default_milvus_host(),
            port: default_milvus_port(),
            collection_name: default_collection_name(),
            token: None,
            timeout_secs: default_milvus_timeout_secs(),
        }
    }
}

impl MilvusConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

fn default_milvus_host() -> String {
    "127.0.0.1".to_string()
}
fn default_milvus_port() -> u16 {
    19530
}
fn default_collection_name() -> String {
    "LangChainCollection1".to_string()
}
fn default_milvus_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Ollama base URL, only read by the `ollama` provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            dims: None,
            batch_size: default_batch_size(),
            url: None,
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_embedding_model() -> String {
    "all-minilm-l6-v2".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    /// Sampling temperature for RAG answers. Direct mode uses the model default.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            base_url: default_llm_base_url(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_model() -> String {
    "llama3.2".to_string()
}
fn default_llm_base_url() -> String {
    "http://127.0.0.1:11434".to_string()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_llm_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data/ancient_greece")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8501".to_string()
}

/// Parse and validate configuration from a TOML string.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

fn validate(config: &Config) -> Result<()> {
    if config.milvus.collection_name.trim().is_empty() {
        anyhow::bail!("milvus.collection_name must not be empty");
    }

    match config.embedding.provider.as_str() {
        "local" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be local or ollama.",
            other
        ),
    }

    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    if config.embedding.dims == Some(0) {
        anyhow::bail!("embedding.dims must be > 0 when set");
    }

    if !(0.0..=2.0).contains(&config.llm.temperature) {
        anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
    }

    if config.llm.model.trim().is_empty() {
        anyhow::bail!("llm.model must not be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_reference_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.milvus.base_url(), "http://127.0.0.1:19530");
        assert_eq!(config.milvus.collection_name, "LangChainCollection1");
        assert_eq!(config.embedding.provider, "local");
        assert_eq!(config.embedding.model, "all-minilm-l6-v2");
        assert_eq!(config.llm.model, "llama3.2");
        assert_eq!(config.llm.base_url, "http://127.0.0.1:11434");
        assert!((config.llm.temperature - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = parse_config(
            r#"
[milvus]
host = "milvus.internal"
collection_name = "greece"

[llm]
model = "mistral"
"#,
        )
        .unwrap();
        assert_eq!(config.milvus.base_url(), "http://milvus.internal:19530");
        assert_eq!(config.milvus.collection_name, "greece");
        assert_eq!(config.llm.model, "mistral");
        assert_eq!(config.llm.base_url, "http://127.0.0.1:11434");
    }

    #[test]
    fn unknown_provider_rejected() {
        let err = parse_config("[embedding]\nprovider = \"openai\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn out_of_range_temperature_rejected() {
        assert!(parse_config("[llm]\ntemperature = 3.5\n").is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_config(Path::new("/nonexistent/agora.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
