//! Configuration management for archivist
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use crate::store::{Metric, StoreBackendKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Vector store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Embedding model configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunk: ChunkConfig,

    /// Query configuration
    #[serde(default)]
    pub query: QueryConfig,

    /// Language model configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Ingestion configuration
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Web crawling configuration
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Which backend holds the vectors
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackendKind,

    /// SQLite store file. Relative paths resolve against the config directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Qdrant connection URL (qdrant backend only)
    #[serde(default = "default_qdrant_url")]
    pub url: String,

    /// Logical collection name
    #[serde(default = "default_collection_name")]
    pub collection: String,

    /// Maximum records per physical write call
    #[serde(default = "default_store_batch_limit")]
    pub batch_limit: usize,

    /// Similarity metric for every collection in the store
    #[serde(default = "default_store_metric")]
    pub metric: Metric,

    /// Retries for a sub-batch that failed with a retryable error
    #[serde(default = "default_store_write_retries")]
    pub write_retries: u32,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Backend kind: "http", "hashing" or "fastembed"
    #[serde(default = "default_embedding_backend")]
    pub backend: String,

    /// Model name/identifier
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension (must match model)
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Batch size for embedding
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,

    /// Embedding service URL (http backend only)
    #[serde(default = "default_embedding_url")]
    pub url: String,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Retries per embedding request
    #[serde(default = "default_embedding_retries")]
    pub retries: usize,
}

/// Lookup the expected embedding dimension for a known model
pub fn embedding_dimension_for_model(model: &str) -> Option<usize> {
    match model {
        "BAAI/bge-small-en-v1.5" => Some(384),
        "BAAI/bge-base-en-v1.5" => Some(768),
        "BAAI/bge-large-en-v1.5" => Some(1024),
        "sentence-transformers/all-MiniLM-L6-v2" | "all-MiniLM-L6-v2" => Some(384),
        "sentence-transformers/all-mpnet-base-v2" => Some(768),
        _ => None,
    }
}

impl EmbeddingConfig {
    /// Resolve the effective embedding dimension based on the configured model.
    /// The hashing backend has no model table and always uses the configured value.
    pub fn resolved_dimension(&self) -> usize {
        if self.backend == "hashing" {
            return self.dimension;
        }
        if let Some(expected) = embedding_dimension_for_model(&self.model) {
            if expected != self.dimension {
                warn!(
                    "Embedding dimension {} does not match model '{}' ({}); using {}",
                    self.dimension, self.model, expected, expected
                );
            }
            expected
        } else {
            self.dimension
        }
    }
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Maximum characters per chunk
    #[serde(default = "default_chunk_max_chars")]
    pub max_chars: usize,

    /// Overlap characters between chunks
    #[serde(default = "default_chunk_overlap")]
    pub overlap_chars: usize,

    /// Normalization policy applied before chunking: "none", "whitespace", "legal"
    #[serde(default = "default_chunk_normalizer")]
    pub normalizer: String,
}

/// Query configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Default number of results
    #[serde(default = "default_query_k")]
    pub default_k: usize,

    /// Maximum results allowed
    #[serde(default = "default_query_max_k")]
    pub max_k: usize,

    /// Drop results scoring below this value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f32>,

    /// Character budget for the assembled context
    #[serde(default = "default_context_budget")]
    pub context_budget: usize,

    /// Separator placed between chunks in the context
    #[serde(default = "default_context_separator")]
    pub context_separator: String,

    /// Appended to a chunk that had to be cut to fit the budget
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncation_marker: Option<String>,
}

/// Language model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL
    #[serde(default = "default_llm_url")]
    pub url: String,

    /// Model identifier
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Environment variable name for the API key
    #[serde(default = "default_llm_api_key_env")]
    pub api_key_env: String,

    /// Maximum tokens to generate
    #[serde(default = "default_llm_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

/// Ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Documents chunked and embedded at the same time
    #[serde(default = "default_ingest_concurrency")]
    pub concurrency: usize,

    /// File extensions picked up by directory ingestion
    #[serde(default = "default_ingest_extensions")]
    pub extensions: Vec<String>,
}

/// Web crawling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Maximum pages to keep per crawl
    #[serde(default = "default_crawl_max_pages")]
    pub max_pages: usize,

    /// Requests per second per host
    #[serde(default = "default_crawl_rate_limit")]
    pub rate_limit_per_host: f64,

    /// Request timeout in seconds
    #[serde(default = "default_crawl_timeout")]
    pub timeout_secs: u64,

    /// User agent string
    #[serde(default = "default_crawl_user_agent")]
    pub user_agent: String,

    /// CSS selector of the main content container
    #[serde(default = "default_crawl_content_selector")]
    pub content_selector: String,

    /// A link is followed only if its path contains one of these (case-insensitive)
    #[serde(default = "default_crawl_link_keywords")]
    pub link_keywords: Vec<String>,

    /// Last path segments starting with any of these are never followed
    #[serde(default = "default_crawl_skip_prefixes")]
    pub skip_prefixes: Vec<String>,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for archivist data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            embedding: EmbeddingConfig::default(),
            chunk: ChunkConfig::default(),
            query: QueryConfig::default(),
            llm: LlmConfig::default(),
            ingest: IngestConfig::default(),
            crawl: CrawlConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: None,
            url: default_qdrant_url(),
            collection: default_collection_name(),
            batch_limit: default_store_batch_limit(),
            metric: default_store_metric(),
            write_retries: default_store_write_retries(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: default_embedding_backend(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            batch_size: default_embedding_batch_size(),
            url: default_embedding_url(),
            timeout_secs: default_embedding_timeout(),
            retries: default_embedding_retries(),
        }
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_chars: default_chunk_max_chars(),
            overlap_chars: default_chunk_overlap(),
            normalizer: default_chunk_normalizer(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_k: default_query_k(),
            max_k: default_query_max_k(),
            min_score: None,
            context_budget: default_context_budget(),
            context_separator: default_context_separator(),
            truncation_marker: None,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            url: default_llm_url(),
            model: default_llm_model(),
            api_key_env: default_llm_api_key_env(),
            max_output_tokens: default_llm_max_output_tokens(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            concurrency: default_ingest_concurrency(),
            extensions: default_ingest_extensions(),
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_pages: default_crawl_max_pages(),
            rate_limit_per_host: default_crawl_rate_limit(),
            timeout_secs: default_crawl_timeout(),
            user_agent: default_crawl_user_agent(),
            content_selector: default_crawl_content_selector(),
            link_keywords: default_crawl_link_keywords(),
            skip_prefixes: default_crawl_skip_prefixes(),
        }
    }
}

impl Config {
    /// Get the default base directory for archivist (~/.archivist)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".archivist")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::InvalidConfig(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific base directory, falling back to defaults
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Location of the SQLite store file
    pub fn store_path(&self) -> PathBuf {
        match &self.store.path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.paths.base_dir.join(path),
            None => self.paths.base_dir.join("vector_db").join("archivist.db"),
        }
    }

    /// Get the LLM API key from environment
    pub fn llm_api_key(&self) -> Option<String> {
        std::env::var(&self.llm.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.chunk.max_chars == 0 {
            return Err(Error::InvalidConfig(
                "chunk.max_chars must be positive".to_string(),
            ));
        }

        if self.chunk.overlap_chars >= self.chunk.max_chars {
            return Err(Error::InvalidConfig(
                "chunk.overlap_chars must be < chunk.max_chars".to_string(),
            ));
        }

        if !matches!(
            self.chunk.normalizer.as_str(),
            "none" | "whitespace" | "legal"
        ) {
            return Err(Error::InvalidConfig(format!(
                "chunk.normalizer must be one of none, whitespace, legal (got '{}')",
                self.chunk.normalizer
            )));
        }

        if self.store.batch_limit == 0 {
            return Err(Error::InvalidConfig(
                "store.batch_limit must be positive".to_string(),
            ));
        }

        if self.store.collection.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "store.collection must not be empty".to_string(),
            ));
        }

        if self.embedding.dimension == 0 {
            return Err(Error::InvalidConfig(
                "embedding.dimension must be positive".to_string(),
            ));
        }

        if self.embedding.batch_size == 0 {
            return Err(Error::InvalidConfig(
                "embedding.batch_size must be positive".to_string(),
            ));
        }

        if self.query.default_k == 0 || self.query.default_k > self.query.max_k {
            return Err(Error::InvalidConfig(
                "query.default_k must be between 1 and query.max_k".to_string(),
            ));
        }

        if let Some(min_score) = self.query.min_score {
            if !min_score.is_finite() {
                return Err(Error::InvalidConfig(
                    "query.min_score must be a finite number".to_string(),
                ));
            }
        }

        if self.query.context_budget == 0 {
            return Err(Error::InvalidConfig(
                "query.context_budget must be positive".to_string(),
            ));
        }

        if let Some(marker) = &self.query.truncation_marker {
            if marker.chars().count() >= self.query.context_budget {
                return Err(Error::InvalidConfig(
                    "query.truncation_marker must be shorter than query.context_budget"
                        .to_string(),
                ));
            }
        }

        if self.llm.timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "llm.timeout_secs must be positive".to_string(),
            ));
        }

        if self.ingest.concurrency == 0 {
            return Err(Error::InvalidConfig(
                "ingest.concurrency must be at least 1".to_string(),
            ));
        }

        if self.crawl.rate_limit_per_host <= 0.0 {
            return Err(Error::InvalidConfig(
                "crawl.rate_limit_per_host must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.store.collection, "legal_docs");
        assert_eq!(config.store.batch_limit, 5000);
        assert_eq!(config.store.backend, StoreBackendKind::Sqlite);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.store.collection = "test_collection".to_string();
        config.store.metric = Metric::NegSquaredEuclidean;

        config.save().unwrap();
        assert!(config.paths.config_file.exists());

        let loaded = Config::load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(loaded.store.collection, "test_collection");
        assert_eq!(loaded.store.metric, Metric::NegSquaredEuclidean);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [chunk]
            max_chars = 200

            [store]
            metric = "neg_squared_euclidean"
            "#,
        )
        .unwrap();

        assert_eq!(config.chunk.max_chars, 200);
        assert_eq!(config.chunk.overlap_chars, 50);
        assert_eq!(config.store.metric, Metric::NegSquaredEuclidean);
        assert_eq!(config.query.default_k, 10);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        // Invalid: overlap >= max
        config.chunk.overlap_chars = config.chunk.max_chars;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        config.chunk.overlap_chars = 100;
        assert!(config.validate().is_ok());

        config.query.default_k = 0;
        assert!(config.validate().is_err());
        config.query.default_k = 5;

        config.store.batch_limit = 0;
        assert!(config.validate().is_err());
        config.store.batch_limit = 10;

        config.chunk.normalizer = "aggressive".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_store_path_resolution() {
        let mut config = Config::default();
        config.init_paths(Some(PathBuf::from("/data/archivist")));

        assert_eq!(
            config.store_path(),
            PathBuf::from("/data/archivist/vector_db/archivist.db")
        );

        config.store.path = Some(PathBuf::from("custom.db"));
        assert_eq!(config.store_path(), PathBuf::from("/data/archivist/custom.db"));

        config.store.path = Some(PathBuf::from("/tmp/other.db"));
        assert_eq!(config.store_path(), PathBuf::from("/tmp/other.db"));
    }

    #[test]
    fn test_resolved_dimension_matches_model() {
        let mut config = Config::default();
        config.embedding.model = "BAAI/bge-base-en-v1.5".to_string();
        config.embedding.dimension = 384;

        assert_eq!(config.embedding.resolved_dimension(), 768);
    }

    #[test]
    fn test_resolved_dimension_hashing_backend_uses_config() {
        let mut config = Config::default();
        config.embedding.backend = "hashing".to_string();
        config.embedding.dimension = 64;

        assert_eq!(config.embedding.resolved_dimension(), 64);
    }
}
