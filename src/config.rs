//! TOML configuration.
//!
//! Every section has defaults, so ChatMuse runs against a local Qdrant and
//! Ollama with no file at all. When `--config` is given the file must exist
//! and is validated by [`load_config`].

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    500
}
fn default_chunk_overlap() -> usize {
    50
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
    /// Base URL for the `ollama` provider.
    #[serde(default = "default_ollama_url")]
    pub url: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            dims: None,
            batch_size: default_batch_size(),
            url: default_ollama_url(),
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
fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_qdrant_url")]
    pub url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_batch_size")]
    pub upsert_batch_size: usize,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: default_qdrant_url(),
            collection: default_collection(),
            upsert_batch_size: default_batch_size(),
            timeout_secs: None,
        }
    }
}

fn default_backend() -> String {
    "qdrant".to_string()
}
fn default_qdrant_url() -> String {
    "http://localhost:6333".to_string()
}
fn default_collection() -> String {
    "pdf_chunks".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            model: default_llm_model(),
            timeout_secs: None,
        }
    }
}

fn default_llm_model() -> String {
    "llama3.2".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct VoiceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_lang")]
    pub lang: String,
    /// Top-level domain of the Google Translate host (`com`, `co.uk`, ...).
    #[serde(default = "default_tld")]
    pub tld: String,
    /// Where the transient audio file is written. Defaults to the OS temp dir.
    #[serde(default)]
    pub audio_dir: Option<PathBuf>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lang: default_lang(),
            tld: default_tld(),
            audio_dir: None,
        }
    }
}

impl VoiceConfig {
    pub fn audio_dir(&self) -> PathBuf {
        self.audio_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

fn default_true() -> bool {
    true
}
fn default_lang() -> String {
    "en".to_string()
}
fn default_tld() -> String {
    "com".to_string()
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

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    #[serde(default = "default_export_dir")]
    pub dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dir: default_export_dir(),
        }
    }
}

fn default_export_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Load the configuration from `path`, or the defaults when no path is given.
pub fn load_or_default(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load_config(path),
        None => Ok(Config::default()),
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!(
            "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
            config.chunking.chunk_overlap,
            config.chunking.chunk_size
        );
    }

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    // Validate embedding
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    if config.embedding.dims == Some(0) {
        anyhow::bail!("embedding.dims must be > 0 when set");
    }
    match config.embedding.provider.as_str() {
        "local" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be local or ollama.",
            other
        ),
    }

    // Validate store
    match config.store.backend.as_str() {
        "qdrant" | "memory" => {}
        other => anyhow::bail!(
            "Unknown store backend: '{}'. Must be qdrant or memory.",
            other
        ),
    }
    if config.store.collection.trim().is_empty() {
        anyhow::bail!("store.collection must not be empty");
    }
    if config.store.upsert_batch_size == 0 {
        anyhow::bail!("store.upsert_batch_size must be > 0");
    }

    Ok(())
}
