//! Context retrieval: similarity search plus neighbor expansion

use crate::expansion::expand;
use crate::similarity::SimilaritySearch;
use crate::store::ChunkStore;
use artalk_common::config::AppConfig;
use artalk_common::embeddings::{create_embedder, Embedder};
use artalk_common::errors::{AppError, Result};
use artalk_common::metrics;
use artalk_common::models::Chunk;
use artalk_common::vectorstore::{create_index, VectorIndex};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Source of ordered context for a query
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Chunks relevant to `query`, ascending by chunk number
    async fn get_context(
        &self,
        query: &str,
        collection: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Chunk>>;
}

/// Runs similarity search and the full collection scan concurrently, then
/// expands the hits with their neighbors.
pub struct ContextRetriever {
    search: SimilaritySearch,
    store: ChunkStore,
    k: usize,
}

impl ContextRetriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        k: usize,
        page_size: usize,
    ) -> Self {
        Self {
            search: SimilaritySearch::new(embedder, index.clone()),
            store: ChunkStore::new(index, page_size),
            k,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(
            create_embedder(&config.embedding)?,
            create_index(&config.vector_store)?,
            config.vector_store.search_k,
            config.vector_store.scroll_page_size,
        ))
    }

    async fn retrieve(
        &self,
        query: &str,
        collection: &str,
        cancel: &CancellationToken,
    ) -> Result<(usize, Vec<Chunk>)> {
        let search = async {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(AppError::Cancelled),
                hits = self.search.search(query, collection, self.k) => hits,
            }
        };

        let (hits, all) = tokio::try_join!(search, self.store.fetch_all(collection, cancel))?;
        let expanded = expand(&hits, &all)?;
        Ok((hits.len(), expanded))
    }
}

#[async_trait]
impl Retriever for ContextRetriever {
    #[instrument(skip(self, query, cancel))]
    async fn get_context(
        &self,
        query: &str,
        collection: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Chunk>> {
        let started = Instant::now();
        let result = self.retrieve(query, collection, cancel).await;
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok((hit_count, chunks)) => {
                metrics::record_retrieval(elapsed, hit_count, chunks.len(), true);
                info!(hits = hit_count, context = chunks.len(), "Context retrieved");
                Ok(chunks)
            }
            Err(e) => {
                metrics::record_retrieval(elapsed, 0, 0, false);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use artalk_common::embeddings::MockEmbedder;
    use artalk_common::vectorstore::{InMemoryIndex, PointRecord};
    use serde_json::json;

    async fn seeded(texts: &[&str]) -> Arc<InMemoryIndex> {
        let embedder = MockEmbedder::new(16);
        let index = Arc::new(InMemoryIndex::new());
        index.create_collection("DocA", 16).await.unwrap();
        let mut points = Vec::new();
        for (n, text) in texts.iter().enumerate() {
            points.push(PointRecord {
                id: format!("p{}", n),
                vector: embedder.embed(text).await.unwrap(),
                payload: json!({
                    "page_content": text,
                    "metadata": { "chunk_number": n, "source": "doc.pdf" }
                }),
            });
        }
        index.upsert("DocA", points).await.unwrap();
        index
    }

    #[tokio::test]
    async fn test_single_hit_expands_to_neighbors() {
        let texts = ["zero", "one", "two", "three", "four", "five"];
        let retriever = ContextRetriever::new(
            Arc::new(MockEmbedder::new(16)),
            seeded(&texts).await,
            1,
            2,
        );

        let chunks = retriever
            .get_context("three", "DocA", &CancellationToken::new())
            .await
            .unwrap();

        let numbers: Vec<u64> = chunks.iter().map(|c| c.chunk_number).collect();
        assert_eq!(numbers, vec![2, 3, 4]);
        assert_eq!(chunks[1].text, "three");
    }

    #[tokio::test]
    async fn test_missing_collection_gives_no_context() {
        let retriever = ContextRetriever::new(
            Arc::new(MockEmbedder::new(16)),
            Arc::new(InMemoryIndex::new()),
            6,
            100,
        );
        let chunks = retriever
            .get_context("anything", "Nope", &CancellationToken::new())
            .await
            .unwrap();
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_retrieval() {
        let retriever = ContextRetriever::new(
            Arc::new(MockEmbedder::new(16)),
            seeded(&["a", "b"]).await,
            6,
            1,
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = retriever.get_context("a", "DocA", &cancel).await.unwrap_err();
        assert!(matches!(err, AppError::Cancelled));
    }
}
