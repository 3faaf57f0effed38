//! Configuration loader and path helpers.
//!
//! Figment merges built-in defaults, `config.toml`, `config.<env>.toml` and
//! `APP_*` env vars (`__` separates nested keys, e.g. `APP_SEARCH__RRF_K`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::Error;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?.validate()?;
        Ok(config)
    }

    /// Wrap an already-assembled figment (tests, embedding applications).
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub bm25: Bm25Settings,
    pub chunking: ChunkingSettings,
    pub search: SearchSettings,
    pub embedding: EmbeddingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub catalog_path: String,
    /// `None` selects the built-in English list.
    pub stopwords_path: Option<String>,
    pub cache_dir: String,
    pub golden_dataset_path: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            catalog_path: "data/movies.json".into(),
            stopwords_path: None,
            cache_dir: "cache".into(),
            golden_dataset_path: "data/golden_dataset.json".into(),
        }
    }
}

impl DataSettings {
    pub fn catalog(&self) -> PathBuf { expand_path(&self.catalog_path) }
    pub fn stopwords(&self) -> Option<PathBuf> { self.stopwords_path.as_deref().map(expand_path) }
    pub fn cache(&self) -> PathBuf { expand_path(&self.cache_dir) }
    pub fn golden_dataset(&self) -> PathBuf { expand_path(&self.golden_dataset_path) }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Settings {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Settings {
    fn default() -> Self { Self { k1: 1.5, b: 0.75 } }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Words per fixed-size window.
    pub chunk_size: usize,
    /// Words repeated from the previous fixed-size window.
    pub overlap: usize,
    /// Sentences per sentence window.
    pub max_chunk_sentences: usize,
    /// Sentences shared between consecutive sentence windows.
    pub overlap_sentences: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self { Self { chunk_size: 200, overlap: 1, max_chunk_sentences: 4, overlap_sentences: 1 } }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub default_limit: usize,
    /// Each sub-search fetches `limit * over_fetch` candidates before fusion.
    pub over_fetch: usize,
    pub rrf_k: f64,
    pub alpha: f64,
    pub excerpt_chars: usize,
    pub score_precision: u32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { default_limit: 5, over_fetch: 500, rrf_k: 60.0, alpha: 0.5, excerpt_chars: 100, score_precision: 4 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GranularitySetting {
    Document,
    Chunked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheValidation {
    /// Stored embedding count must equal the recomputed chunk count.
    CountOnly,
    /// Count match plus a blake3 checksum over the chunk texts.
    Checksum,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model: String,
    pub dim: usize,
    pub granularity: GranularitySetting,
    pub concurrency: usize,
    pub batch_size: usize,
    pub max_retries: usize,
    pub retry_backoff_ms: u64,
    pub timeout_ms: u64,
    pub validation: CacheValidation,
    pub show_progress: bool,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "hash".into(),
            dim: 384,
            granularity: GranularitySetting::Chunked,
            concurrency: 4,
            batch_size: 32,
            max_retries: 3,
            retry_backoff_ms: 200,
            timeout_ms: 30_000,
            validation: CacheValidation::CountOnly,
            show_progress: false,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> crate::error::Result<()> {
        let c = &self.chunking;
        if c.chunk_size == 0 || c.overlap >= c.chunk_size {
            return Err(Error::InvalidConfiguration(format!(
                "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
                c.overlap, c.chunk_size
            )));
        }
        if c.max_chunk_sentences == 0 || c.overlap_sentences >= c.max_chunk_sentences {
            return Err(Error::InvalidConfiguration(format!(
                "chunking.overlap_sentences ({}) must be smaller than chunking.max_chunk_sentences ({})",
                c.overlap_sentences, c.max_chunk_sentences
            )));
        }
        if !(0.0..=1.0).contains(&self.search.alpha) {
            return Err(Error::InvalidConfiguration(format!("search.alpha must be in [0, 1], got {}", self.search.alpha)));
        }
        if !self.search.rrf_k.is_finite() || self.search.rrf_k < 0.0 {
            return Err(Error::InvalidConfiguration(format!("search.rrf_k must be >= 0, got {}", self.search.rrf_k)));
        }
        if self.search.over_fetch == 0 {
            return Err(Error::InvalidConfiguration("search.over_fetch must be at least 1".into()));
        }
        let e = &self.embedding;
        if e.dim == 0 || e.concurrency == 0 || e.batch_size == 0 {
            return Err(Error::InvalidConfiguration(
                "embedding.dim, embedding.concurrency and embedding.batch_size must be positive".into(),
            ));
        }
        Ok(())
    }
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
