use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Qdrant endpoint, e.g. `http://localhost:6334`.
    pub url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Bound on every store RPC; a timeout surfaces as a retryable error.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_collection() -> String {
    "corpus_chunks".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

/// Model names resolved by the store's inference layer, one per vector space.
#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_dense_model")]
    pub dense_model: String,
    #[serde(default = "default_dense_dims")]
    pub dense_dims: u64,
    #[serde(default = "default_sparse_model")]
    pub sparse_model: String,
    #[serde(default = "default_late_model")]
    pub late_interaction_model: String,
    #[serde(default = "default_late_dims")]
    pub late_interaction_dims: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dense_model: default_dense_model(),
            dense_dims: default_dense_dims(),
            sparse_model: default_sparse_model(),
            late_interaction_model: default_late_model(),
            late_interaction_dims: default_late_dims(),
        }
    }
}

fn default_dense_model() -> String {
    "sentence-transformers/all-minilm-l6-v2".to_string()
}
fn default_dense_dims() -> u64 {
    384
}
fn default_sparse_model() -> String {
    "qdrant/bm25".to_string()
}
fn default_late_model() -> String {
    "colbert-ir/colbertv2.0".to_string()
}
fn default_late_dims() -> u64 {
    128
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Records per bulk upsert call.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Cap on the snapshot scroll; sessions larger than this are rejected
    /// upstream by the chunker, not silently truncated here.
    #[serde(default = "default_snapshot_limit")]
    pub snapshot_limit: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            snapshot_limit: default_snapshot_limit(),
        }
    }
}

fn default_batch_size() -> usize {
    20
}
fn default_snapshot_limit() -> u32 {
    10_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Results returned when the caller does not ask for a specific `k`.
    #[serde(default = "default_final_limit")]
    pub final_limit: u64,
    /// Each prefetch stage fetches `k × prefetch_multiplier` candidates.
    #[serde(default = "default_prefetch_multiplier")]
    pub prefetch_multiplier: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            final_limit: default_final_limit(),
            prefetch_multiplier: default_prefetch_multiplier(),
        }
    }
}

fn default_final_limit() -> u64 {
    10
}
fn default_prefetch_multiplier() -> u64 {
    2
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
    "127.0.0.1:7410".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.store.url.trim().is_empty() {
        anyhow::bail!("store.url must not be empty");
    }

    if config.sync.batch_size == 0 {
        anyhow::bail!("sync.batch_size must be > 0");
    }

    if config.sync.snapshot_limit == 0 {
        anyhow::bail!("sync.snapshot_limit must be > 0");
    }

    if config.retrieval.final_limit < 1 {
        anyhow::bail!("retrieval.final_limit must be >= 1");
    }

    if config.retrieval.prefetch_multiplier < 1 {
        anyhow::bail!("retrieval.prefetch_multiplier must be >= 1");
    }

    if config.embedding.dense_dims == 0 || config.embedding.late_interaction_dims == 0 {
        anyhow::bail!("embedding dims must be > 0");
    }

    Ok(config)
}
