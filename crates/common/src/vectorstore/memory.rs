//! In-process vector index for tests and local runs

use super::{PointRecord, ScoredPoint, ScrollCursor, ScrollPage, StoredPoint, VectorIndex};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct MemoryCollection {
    dimension: usize,
    points: Vec<PointRecord>,
}

/// Vector index kept in memory. Scroll cursors are offsets into insertion order.
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points stored in a collection
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|c| c.points.len())
            .unwrap_or(0)
    }
}

fn not_found(collection: &str) -> AppError {
    AppError::CollectionNotFound {
        name: collection.to_string(),
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        Ok(self.collections.read().await.contains_key(collection))
    }

    async fn create_collection(&self, collection: &str, dimension: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(collection) {
            return Err(AppError::StoreRejected {
                status: 409,
                message: format!("Collection `{}` already exists", collection),
            });
        }
        collections.insert(
            collection.to_string(),
            MemoryCollection {
                dimension,
                points: Vec::new(),
            },
        );
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<PointRecord>) -> Result<()> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| not_found(collection))?;

        for point in points {
            if point.vector.len() != target.dimension {
                return Err(AppError::StoreRejected {
                    status: 400,
                    message: format!(
                        "Vector dimension {} does not match collection dimension {}",
                        point.vector.len(),
                        target.dimension
                    ),
                });
            }
            match target.points.iter_mut().find(|p| p.id == point.id) {
                Some(existing) => *existing = point,
                None => target.points.push(point),
            }
        }
        Ok(())
    }

    async fn search(&self, collection: &str, vector: &[f32], k: usize) -> Result<Vec<ScoredPoint>> {
        let collections = self.collections.read().await;
        let target = collections.get(collection).ok_or_else(|| not_found(collection))?;

        let mut scored: Vec<ScoredPoint> = target
            .points
            .iter()
            .map(|p| ScoredPoint {
                id: p.id.clone(),
                score: cosine(vector, &p.vector),
                payload: p.payload.clone(),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn scroll(
        &self,
        collection: &str,
        cursor: Option<ScrollCursor>,
        limit: usize,
    ) -> Result<ScrollPage> {
        let collections = self.collections.read().await;
        let target = collections.get(collection).ok_or_else(|| not_found(collection))?;

        let start = match cursor {
            None => 0,
            Some(ScrollCursor(Value::Number(n))) => n.as_u64().unwrap_or(0) as usize,
            Some(ScrollCursor(other)) => {
                return Err(AppError::StoreRejected {
                    status: 400,
                    message: format!("Invalid scroll offset: {}", other),
                })
            }
        };
        let end = (start + limit.max(1)).min(target.points.len());

        let points = target
            .points
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .map(|p| StoredPoint {
                id: p.id.clone(),
                payload: p.payload.clone(),
            })
            .collect();

        let next = (end < target.points.len()).then(|| ScrollCursor(Value::from(end as u64)));
        Ok(ScrollPage { points, next })
    }

    async fn delete_collection(&self, collection: &str) -> Result<bool> {
        Ok(self.collections.write().await.remove(collection).is_some())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn point(id: &str, vector: Vec<f32>) -> PointRecord {
        PointRecord {
            id: id.to_string(),
            vector,
            payload: json!({ "page_content": id }),
        }
    }

    #[tokio::test]
    async fn test_scroll_walks_every_point_once() {
        let index = InMemoryIndex::new();
        index.create_collection("DocA", 2).await.unwrap();
        let points = (0..7).map(|i| point(&i.to_string(), vec![1.0, i as f32])).collect();
        index.upsert("DocA", points).await.unwrap();

        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let page = index.scroll("DocA", cursor, 3).await.unwrap();
            seen.extend(page.points.into_iter().map(|p| p.id));
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        assert_eq!(seen, vec!["0", "1", "2", "3", "4", "5", "6"]);
    }

    #[tokio::test]
    async fn test_search_ranks_by_similarity() {
        let index = InMemoryIndex::new();
        index.create_collection("DocA", 2).await.unwrap();
        index
            .upsert(
                "DocA",
                vec![
                    point("far", vec![0.0, 1.0]),
                    point("near", vec![1.0, 0.1]),
                    point("exact", vec![1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let hits = index.search("DocA", &[1.0, 0.0], 2).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["exact", "near"]);
    }

    #[tokio::test]
    async fn test_missing_collection() {
        let index = InMemoryIndex::new();
        let err = index.scroll("nope", None, 10).await.unwrap_err();
        assert!(matches!(err, AppError::CollectionNotFound { .. }));
        assert!(!index.delete_collection("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let index = InMemoryIndex::new();
        index.create_collection("DocA", 1).await.unwrap();
        index.upsert("DocA", vec![point("a", vec![1.0])]).await.unwrap();
        index.upsert("DocA", vec![point("a", vec![0.5])]).await.unwrap();
        assert_eq!(index.len("DocA").await, 1);
    }
}
