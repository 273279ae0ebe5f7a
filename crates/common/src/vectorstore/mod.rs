//! Vector index abstraction
//!
//! The index is an external service; this module only fixes the narrow contract
//! the retrieval core consumes:
//! - collection existence, creation and deletion
//! - upsert of points (vector + payload)
//! - top-k similarity search
//! - cursor-paginated scroll over every point of a collection

mod memory;
mod qdrant;

pub use memory::InMemoryIndex;
pub use qdrant::QdrantIndex;

use crate::config::VectorStoreConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// A point to write: vector plus payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Value,
}

/// A point returned by similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub payload: Value,
}

/// A point returned by scroll (no vector)
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPoint {
    pub id: String,
    pub payload: Value,
}

/// Opaque position in a scroll, handed back by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScrollCursor(pub Value);

/// One page of a scroll. `next` is `None` on the last page.
#[derive(Debug, Clone, Default)]
pub struct ScrollPage {
    pub points: Vec<StoredPoint>,
    pub next: Option<ScrollCursor>,
}

/// Narrow interface over the external vector index
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn collection_exists(&self, collection: &str) -> Result<bool>;

    /// Create an empty collection with cosine distance
    async fn create_collection(&self, collection: &str, dimension: usize) -> Result<()>;

    /// Insert or replace points by id
    async fn upsert(&self, collection: &str, points: Vec<PointRecord>) -> Result<()>;

    /// Top `k` points by descending similarity.
    ///
    /// Returns `CollectionNotFound` for a missing collection.
    async fn search(&self, collection: &str, vector: &[f32], k: usize) -> Result<Vec<ScoredPoint>>;

    /// Next page of points after `cursor` (first page when `None`).
    ///
    /// Returns `CollectionNotFound` for a missing collection. No ordering is promised.
    async fn scroll(
        &self,
        collection: &str,
        cursor: Option<ScrollCursor>,
        limit: usize,
    ) -> Result<ScrollPage>;

    /// Drop a whole collection. Returns whether it existed.
    async fn delete_collection(&self, collection: &str) -> Result<bool>;

    async fn list_collections(&self) -> Result<Vec<String>>;
}

/// Build the configured index backend
pub fn create_index(config: &VectorStoreConfig) -> Result<Arc<dyn VectorIndex>> {
    match config.provider.as_str() {
        "qdrant" => Ok(Arc::new(QdrantIndex::new(config)?)),
        "memory" => Ok(Arc::new(InMemoryIndex::new())),
        other => Err(AppError::Configuration {
            message: format!("Unknown vector store provider: {}", other),
        }),
    }
}
