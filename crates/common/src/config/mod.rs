//! Configuration management for Artalk services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Vector index configuration
    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Ingestion pipeline configuration
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Generative model configuration
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VectorStoreConfig {
    /// Backend: qdrant, memory
    #[serde(default = "default_store_provider")]
    pub provider: String,

    /// Qdrant REST endpoint
    #[serde(default = "default_store_url")]
    pub url: String,

    /// Optional API key sent as `api-key`
    pub api_key: Option<String>,

    /// Points requested per scroll page
    #[serde(default = "default_scroll_page_size")]
    pub scroll_page_size: usize,

    /// Similarity hits per query
    #[serde(default = "default_search_k")]
    pub search_k: usize,

    /// Request timeout in seconds
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai, mock
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for self-hosted OpenAI-compatible endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,

    /// Batch size for embedding requests
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Directory for the content-hash vector cache (disabled when unset)
    pub cache_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestionConfig {
    /// Hard upper bound on chunk size in characters
    #[serde(default = "default_max_characters")]
    pub max_characters: usize,

    /// Soft bound after which a section is closed
    #[serde(default = "default_new_after_n_chars")]
    pub new_after_n_chars: usize,

    /// Sections smaller than this are merged with their successor
    #[serde(default = "default_combine_under_n_chars")]
    pub combine_text_under_n_chars: usize,

    /// Allow sections to span page breaks
    #[serde(default = "default_multipage_sections")]
    pub multipage_sections: bool,

    /// Document languages recorded in element metadata
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    /// Directory for the chunker output cache (disabled when unset)
    pub cache_dir: Option<PathBuf>,

    /// Points per upsert request
    #[serde(default = "default_upsert_batch_size")]
    pub upsert_batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// Generation provider: gemini, mock
    #[serde(default = "default_generation_provider")]
    pub provider: String,

    /// API key for the generative model
    pub api_key: Option<String>,

    /// API base URL
    #[serde(default = "default_generation_base")]
    pub api_base: String,

    /// Model to use
    #[serde(default = "default_generation_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error) or a full EnvFilter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default)]
    pub metrics_port: u16,

    /// Service name attached to log lines
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_store_provider() -> String { "qdrant".to_string() }
fn default_store_url() -> String { "http://localhost:6333".to_string() }
fn default_scroll_page_size() -> usize { crate::DEFAULT_SCROLL_PAGE_SIZE }
fn default_search_k() -> usize { crate::DEFAULT_SEARCH_K }
fn default_store_timeout() -> u64 { 30 }
fn default_embedding_provider() -> String { "openai".to_string() }
fn default_embedding_model() -> String { "OrdalieTech/Solon-embeddings-large-0.1".to_string() }
fn default_embedding_dimension() -> usize { 1024 }
fn default_embedding_timeout() -> u64 { 30 }
fn default_embedding_retries() -> u32 { 3 }
fn default_batch_size() -> usize { 32 }
fn default_max_characters() -> usize { 4000 }
fn default_new_after_n_chars() -> usize { 2500 }
fn default_combine_under_n_chars() -> usize { 500 }
fn default_multipage_sections() -> bool { true }
fn default_languages() -> Vec<String> { vec!["fra".to_string()] }
fn default_upsert_batch_size() -> usize { 64 }
fn default_generation_provider() -> String { "gemini".to_string() }
fn default_generation_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_generation_model() -> String { "gemini-1.5-flash".to_string() }
fn default_generation_timeout() -> u64 { 60 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_service_name() -> String { "artalk".to_string() }

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            provider: default_store_provider(),
            url: default_store_url(),
            api_key: None,
            scroll_page_size: default_scroll_page_size(),
            search_k: default_search_k(),
            timeout_secs: default_store_timeout(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            max_retries: default_embedding_retries(),
            batch_size: default_batch_size(),
            cache_dir: None,
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_characters: default_max_characters(),
            new_after_n_chars: default_new_after_n_chars(),
            combine_text_under_n_chars: default_combine_under_n_chars(),
            multipage_sections: default_multipage_sections(),
            languages: default_languages(),
            cache_dir: None,
            upsert_batch_size: default_upsert_batch_size(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            api_key: None,
            api_base: default_generation_base(),
            model: default_generation_model(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: 0,
            service_name: default_service_name(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // e.g., APP__VECTOR_STORE__URL=http://qdrant:6333
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get vector store request timeout as Duration
    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.vector_store.timeout_secs)
    }

    /// Get generation request timeout as Duration
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation.timeout_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            vector_store: VectorStoreConfig::default(),
            embedding: EmbeddingConfig::default(),
            ingestion: IngestionConfig::default(),
            generation: GenerationConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}
