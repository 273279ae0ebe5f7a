//! Disk cache for embeddings keyed by content hash

use super::Embedder;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Wraps an embedder and stores each vector under `sha256(model, text)`.
///
/// Vectors are only valid for the model that produced them, so the model name
/// is part of the key.
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    dir: PathBuf,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir).map_err(|e| AppError::Configuration {
            message: format!("Failed to create embedding cache {}: {}", dir.display(), e),
        })?;
        Ok(Self { inner, dir })
    }

    fn path_for(&self, text: &str) -> PathBuf {
        let digest = Sha256::new()
            .chain_update(self.inner.model_name().as_bytes())
            .chain_update([0u8])
            .chain_update(text.as_bytes())
            .finalize();
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }

    async fn load(&self, text: &str) -> Option<Vec<f32>> {
        let bytes = tokio::fs::read(self.path_for(text)).await.ok()?;
        match serde_json::from_slice::<Vec<f32>>(&bytes) {
            Ok(vector) if vector.len() == self.inner.dimension() => Some(vector),
            _ => {
                warn!("Discarding unreadable embedding cache entry");
                None
            }
        }
    }

    async fn store(&self, text: &str, vector: &[f32]) {
        let path = self.path_for(text);
        let result = match serde_json::to_vec(vector) {
            Ok(bytes) => tokio::fs::write(&path, bytes).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "Failed to write embedding cache entry");
        }
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(vector) = self.load(text).await {
            crate::metrics::record_cache(true, "embedding");
            return Ok(vector);
        }
        crate::metrics::record_cache(false, "embedding");

        let vector = self.inner.embed(text).await?;
        self.store(text, &vector).await;
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut slots: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut misses = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            let cached = self.load(text).await;
            if cached.is_none() {
                misses.push(i);
            }
            slots.push(cached);
        }

        debug!(total = texts.len(), misses = misses.len(), "Embedding cache lookup");

        if !misses.is_empty() {
            let pending: Vec<String> = misses.iter().map(|&i| texts[i].clone()).collect();
            let computed = self.inner.embed_batch(&pending).await?;
            if computed.len() != pending.len() {
                return Err(AppError::EmbeddingError {
                    message: format!(
                        "Expected {} embeddings, got {}",
                        pending.len(),
                        computed.len()
                    ),
                });
            }
            for (&i, vector) in misses.iter().zip(computed) {
                self.store(&texts[i], &vector).await;
                slots[i] = Some(vector);
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockEmbedder;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedder {
        inner: MockEmbedder,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(text).await
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(texts.len(), Ordering::SeqCst);
            self.inner.embed_batch(texts).await
        }

        fn model_name(&self) -> &str {
            "counting"
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }
    }

    #[tokio::test]
    async fn test_second_lookup_hits_disk() {
        let dir = tempfile::tempdir().unwrap();
        let counting = Arc::new(CountingEmbedder {
            inner: MockEmbedder::new(8),
            calls: AtomicUsize::new(0),
        });
        let cached = CachedEmbedder::new(counting.clone(), dir.path().to_path_buf()).unwrap();

        let first = cached.embed("Guernica").await.unwrap();
        let second = cached.embed("Guernica").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_batch_only_embeds_misses() {
        let dir = tempfile::tempdir().unwrap();
        let counting = Arc::new(CountingEmbedder {
            inner: MockEmbedder::new(8),
            calls: AtomicUsize::new(0),
        });
        let cached = CachedEmbedder::new(counting.clone(), dir.path().to_path_buf()).unwrap();

        cached.embed("a").await.unwrap();
        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let vectors = cached.embed_batch(&texts).await.unwrap();

        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[1], MockEmbedder::new(8).embed("b").await.unwrap());
        assert_eq!(counting.calls.load(Ordering::SeqCst), 3);
    }
}
