//! Similarity search client
//!
//! Embeds the query and asks the vector index for the top-k chunks.

use artalk_common::embeddings::Embedder;
use artalk_common::errors::{AppError, Result};
use artalk_common::models::Chunk;
use artalk_common::vectorstore::VectorIndex;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub struct SimilaritySearch {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl SimilaritySearch {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Top `k` chunks by descending similarity.
    ///
    /// A missing or empty collection yields an empty list.
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn search(&self, query: &str, collection: &str, k: usize) -> Result<Vec<Chunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed(query).await?;
        let scored = match self.index.search(collection, &vector, k).await {
            Ok(points) => points,
            Err(AppError::CollectionNotFound { .. }) => {
                debug!("Collection not found, no hits");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let mut hits = Vec::with_capacity(scored.len());
        for point in scored {
            match Chunk::from_payload(collection, point.id, &point.payload) {
                Ok(chunk) => {
                    debug!(chunk_number = chunk.chunk_number, score = point.score, "Hit");
                    hits.push(chunk);
                }
                // hits without a chunk number cannot be expanded
                Err(e) => warn!(error = %e, "Dropping hit without chunk number"),
            }
        }
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use artalk_common::embeddings::MockEmbedder;
    use artalk_common::vectorstore::{InMemoryIndex, PointRecord};
    use serde_json::json;

    async fn index_with(texts: &[&str], embedder: &MockEmbedder) -> Arc<InMemoryIndex> {
        let index = Arc::new(InMemoryIndex::new());
        index.create_collection("DocA", embedder.dimension()).await.unwrap();
        let mut points = Vec::new();
        for (n, text) in texts.iter().enumerate() {
            points.push(PointRecord {
                id: format!("p{}", n),
                vector: embedder.embed(text).await.unwrap(),
                payload: json!({
                    "page_content": text,
                    "metadata": { "chunk_number": n.to_string(), "source": "doc.pdf" }
                }),
            });
        }
        index.upsert("DocA", points).await.unwrap();
        index
    }

    #[tokio::test]
    async fn test_exact_text_ranks_first() {
        let embedder = MockEmbedder::new(32);
        let texts = ["Les Nymphéas", "La Liberté guidant le peuple", "Le Déjeuner sur l'herbe"];
        let index = index_with(&texts, &embedder).await;
        let search = SimilaritySearch::new(Arc::new(MockEmbedder::new(32)), index);

        let hits = search.search("La Liberté guidant le peuple", "DocA", 2).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_number, 1);
        assert!(hits.iter().all(|h| h.belongs_to("DocA")));
    }

    #[tokio::test]
    async fn test_missing_collection_is_empty() {
        let search = SimilaritySearch::new(
            Arc::new(MockEmbedder::new(8)),
            Arc::new(InMemoryIndex::new()),
        );
        assert!(search.search("query", "Nope", 6).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_k_larger_than_collection() {
        let embedder = MockEmbedder::new(8);
        let index = index_with(&["a", "b"], &embedder).await;
        let search = SimilaritySearch::new(Arc::new(embedder), index);

        assert_eq!(search.search("a", "DocA", 6).await.unwrap().len(), 2);
        assert!(search.search("a", "DocA", 0).await.unwrap().is_empty());
    }
}
