//! On-disk cache of chunker output
//!
//! Partitioning a PDF is the slowest step of ingestion. Results are stored
//! as JSON keyed by the file's content hash and the chunking configuration,
//! so an unchanged file is never partitioned twice.

use crate::chunker::ChunkingConfig;
use crate::errors::IngestionError;
use artalk_common::models::RawChunk;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ChunkCache {
    dir: PathBuf,
}

impl ChunkCache {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, IngestionError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            IngestionError::CacheError(format!("cannot create {}: {}", dir.display(), e))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache key for a source file's bytes under a chunking configuration
    pub fn key(source: &[u8], config: &ChunkingConfig) -> String {
        let digest = Sha256::new()
            .chain_update(source)
            .chain_update([0u8])
            .chain_update(config.fingerprint().as_bytes())
            .finalize();
        hex::encode(digest)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Cached chunks, or `None` on a miss or an unreadable entry
    pub async fn get(&self, key: &str) -> Option<Vec<RawChunk>> {
        let path = self.path_for(key);
        let bytes = tokio::fs::read(&path).await.ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(chunks) => {
                debug!(key, "Chunk cache hit");
                Some(chunks)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Discarding corrupt chunk cache entry");
                None
            }
        }
    }

    pub async fn put(&self, key: &str, chunks: &[RawChunk]) -> Result<(), IngestionError> {
        let bytes = serde_json::to_vec(chunks)
            .map_err(|e| IngestionError::CacheError(e.to_string()))?;
        tokio::fs::write(self.path_for(key), bytes).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn chunk(text: &str) -> RawChunk {
        let mut metadata = Map::new();
        metadata.insert("filename".into(), json!("guide.pdf"));
        RawChunk::new(text, metadata)
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ChunkCache::new(dir.path()).unwrap();
        let key = ChunkCache::key(b"%PDF-1.7", &ChunkingConfig::default());

        assert!(cache.get(&key).await.is_none());
        cache.put(&key, &[chunk("a"), chunk("b")]).await.unwrap();

        let cached = cache.get(&key).await.unwrap();
        assert_eq!(cached, vec![chunk("a"), chunk("b")]);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ChunkCache::new(dir.path()).unwrap();
        tokio::fs::write(dir.path().join("bad.json"), b"{not json")
            .await
            .unwrap();

        assert!(cache.get("bad").await.is_none());
    }

    #[test]
    fn test_key_depends_on_content_and_config() {
        let config = ChunkingConfig::default();
        let other = ChunkingConfig {
            multipage_sections: false,
            ..ChunkingConfig::default()
        };

        let k1 = ChunkCache::key(b"one", &config);
        assert_eq!(k1, ChunkCache::key(b"one", &config));
        assert_ne!(k1, ChunkCache::key(b"two", &config));
        assert_ne!(k1, ChunkCache::key(b"one", &other));
    }
}
