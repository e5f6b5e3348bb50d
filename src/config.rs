use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::Error;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_persist_dir")]
    pub persist_dir: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            persist_dir: default_persist_dir(),
            collection: default_collection(),
        }
    }
}

fn default_persist_dir() -> PathBuf {
    PathBuf::from("./rag_db")
}
fn default_collection() -> String {
    "papers".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_words")]
    pub max_words: usize,
    #[serde(default = "default_overlap_words")]
    pub overlap_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_words: default_max_words(),
            overlap_words: default_overlap_words(),
        }
    }
}

fn default_max_words() -> usize {
    280
}
fn default_overlap_words() -> usize {
    40
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_embed_timeout_secs(),
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_batch_size() -> usize {
    128
}
fn default_max_retries() -> u32 {
    5
}
fn default_embed_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_generation_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_generation_model(),
            temperature: default_temperature(),
            max_retries: default_generation_retries(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_generation_model() -> String {
    "gpt-4.1-mini".to_string()
}
fn default_temperature() -> f64 {
    0.3
}
fn default_generation_retries() -> u32 {
    3
}
fn default_generation_timeout_secs() -> u64 {
    60
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
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Number of documents processed concurrently during batch ingestion.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

fn default_workers() -> usize {
    4
}

/// Validate cross-field constraints. Called by [`load_config`] and by the
/// pipeline entry points before any work happens.
pub fn validate(config: &Config) -> std::result::Result<(), Error> {
    if config.chunking.max_words == 0 {
        return Err(Error::InvalidConfiguration(
            "chunking.max_words must be > 0".to_string(),
        ));
    }
    if config.chunking.overlap_words >= config.chunking.max_words {
        return Err(Error::InvalidConfiguration(format!(
            "chunking.overlap_words ({}) must be < chunking.max_words ({})",
            config.chunking.overlap_words, config.chunking.max_words
        )));
    }
    if config.embedding.dims == 0 {
        return Err(Error::InvalidConfiguration(
            "embedding.dims must be > 0".to_string(),
        ));
    }
    if config.embedding.batch_size == 0 {
        return Err(Error::InvalidConfiguration(
            "embedding.batch_size must be > 0".to_string(),
        ));
    }
    if config.retrieval.top_k == 0 {
        return Err(Error::InvalidConfiguration(
            "retrieval.top_k must be >= 1".to_string(),
        ));
    }
    if config.ingest.workers == 0 {
        return Err(Error::InvalidConfiguration(
            "ingest.workers must be >= 1".to_string(),
        ));
    }
    Ok(())
}

/// Load configuration from a TOML file. A missing file yields the built-in
/// defaults; an unreadable or invalid file is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    let config: Config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default()
    };

    validate(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_pipeline_expectations() {
        let config = Config::default();
        assert_eq!(config.chunking.max_words, 280);
        assert_eq!(config.chunking.overlap_words, 40);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.index.collection, "papers");
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn overlap_must_stay_below_max_words() {
        let mut config = Config::default();
        config.chunking.max_words = 40;
        config.chunking.overlap_words = 40;
        assert!(matches!(
            validate(&config),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn zero_top_k_rejected() {
        let mut config = Config::default();
        config.retrieval.top_k = 0;
        assert!(matches!(
            validate(&config),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [chunking]
            max_words = 100
            "#,
        )
        .unwrap();
        assert_eq!(config.chunking.max_words, 100);
        assert_eq!(config.chunking.overlap_words, 40);
        assert_eq!(config.embedding.model, "text-embedding-3-small");
    }
}
