//! Artalk Common Library
//!
//! Shared code for the Artalk RAG services including:
//! - Chunk model and metadata normalization
//! - Vector index abstraction (Qdrant REST and in-memory)
//! - Embedding client abstraction
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod embeddings;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod observability;
pub mod vectorstore;

// Re-export commonly used types
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use models::{Chunk, Metadata, MetadataValue, RawChunk};
pub use vectorstore::VectorIndex;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default number of similarity hits per query
pub const DEFAULT_SEARCH_K: usize = 6;

/// Default page size for collection scrolls
pub const DEFAULT_SCROLL_PAGE_SIZE: usize = 100;

/// Metadata key carrying the chunk's position in its collection
pub const CHUNK_NUMBER_KEY: &str = "chunk_number";
