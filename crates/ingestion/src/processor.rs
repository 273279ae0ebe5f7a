//! Ingestion processor
//!
//! Loads PDFs into a collection: partition and chunk each file, number the
//! chunks, embed them, then write them to the vector index.

use crate::cache::ChunkCache;
use crate::chunker::{chunk_by_title, ChunkingConfig};
use crate::errors::IngestionError;
use crate::numbering::ChunkNumberer;
use crate::pdf::{location_metadata, Partitioner, PdfPartitioner};
use artalk_common::config::AppConfig;
use artalk_common::embeddings::{create_embedder, Embedder};
use artalk_common::errors::AppError;
use artalk_common::metrics;
use artalk_common::models::{Chunk, RawChunk};
use artalk_common::vectorstore::{create_index, PointRecord, VectorIndex};
use backoff::{future::retry, ExponentialBackoff};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// How long a failing upsert is retried before giving up
const UPSERT_RETRY_WINDOW: Duration = Duration::from_secs(30);

/// Summary of one ingestion run
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestionReport {
    pub collection: String,
    /// Files that produced chunks, in ingestion order
    pub files: Vec<String>,
    pub failed_files: Vec<String>,
    pub written: usize,
    pub skipped: usize,
    /// The collection was already present and nothing was written
    pub already_existed: bool,
}

/// Ingestion processor
pub struct IngestionProcessor {
    partitioner: Arc<dyn Partitioner>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    cache: Option<ChunkCache>,
    chunking: ChunkingConfig,
    upsert_batch_size: usize,
}

impl IngestionProcessor {
    pub fn new(
        partitioner: Arc<dyn Partitioner>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            partitioner,
            embedder,
            index,
            cache: None,
            chunking,
            upsert_batch_size: 64,
        }
    }

    /// Build the processor wired to the configured backends
    pub fn from_config(config: &AppConfig) -> Result<Self, IngestionError> {
        let partitioner = Arc::new(PdfPartitioner::new(config.ingestion.languages.clone()));
        let embedder = create_embedder(&config.embedding)?;
        let index = create_index(&config.vector_store)?;

        let mut processor = Self::new(
            partitioner,
            embedder,
            index,
            ChunkingConfig::from(&config.ingestion),
        )
        .with_upsert_batch_size(config.ingestion.upsert_batch_size);

        if let Some(ref dir) = config.ingestion.cache_dir {
            processor = processor.with_cache(ChunkCache::new(dir.clone())?);
        }
        Ok(processor)
    }

    pub fn with_cache(mut self, cache: ChunkCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_upsert_batch_size(mut self, size: usize) -> Self {
        self.upsert_batch_size = size.max(1);
        self
    }

    /// Ingest a PDF file, or every PDF of a directory, into `collection`.
    ///
    /// An existing collection is left untouched. Files that fail to
    /// partition are reported and skipped.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn ingest_path(
        &self,
        path: &Path,
        collection: &str,
    ) -> Result<IngestionReport, IngestionError> {
        if self.index.collection_exists(collection).await? {
            info!(collection, "Collection already exists, skipping ingestion");
            return Ok(existing_report(collection));
        }

        let started = Instant::now();
        let files = discover_pdfs(path)?;
        info!(file_count = files.len(), "Ingesting PDFs");

        let mut report = IngestionReport {
            collection: collection.to_string(),
            ..IngestionReport::default()
        };
        let mut numberer = ChunkNumberer::new();
        let mut chunks = Vec::new();

        for file in &files {
            let name = file.display().to_string();
            match self.chunks_for_file(file).await {
                Ok(raw) => {
                    // one numberer for the whole run so numbering continues across files
                    let outcome = numberer.assign(collection, raw);
                    debug!(file = %name, chunks = outcome.chunks.len(), "File numbered");
                    report.skipped += outcome.skipped.len();
                    chunks.extend(outcome.chunks);
                    report.files.push(name);
                }
                Err(e) => {
                    error!(file = %name, error = %e, "Failed to process PDF, skipping");
                    report.failed_files.push(name);
                }
            }
        }

        if chunks.is_empty() {
            return Err(IngestionError::NoDocuments(path.display().to_string()));
        }

        report.written = self.write_chunks(collection, chunks).await?;
        metrics::record_ingestion(
            started.elapsed().as_secs_f64(),
            report.written,
            report.skipped,
            collection,
        );
        info!(
            collection,
            written = report.written,
            skipped = report.skipped,
            failed_files = report.failed_files.len(),
            "Ingestion complete"
        );
        Ok(report)
    }

    /// Ingest chunker output that was produced elsewhere.
    #[instrument(skip(self, raw), fields(count = raw.len()))]
    pub async fn ingest_chunks(
        &self,
        collection: &str,
        raw: Vec<RawChunk>,
    ) -> Result<IngestionReport, IngestionError> {
        if self.index.collection_exists(collection).await? {
            info!(collection, "Collection already exists, skipping ingestion");
            return Ok(existing_report(collection));
        }

        let started = Instant::now();
        let outcome = ChunkNumberer::new().assign(collection, raw);
        let skipped = outcome.skipped.len();
        let written = if outcome.chunks.is_empty() {
            warn!(collection, "No valid chunks to ingest");
            0
        } else {
            self.write_chunks(collection, outcome.chunks).await?
        };

        metrics::record_ingestion(started.elapsed().as_secs_f64(), written, skipped, collection);
        Ok(IngestionReport {
            collection: collection.to_string(),
            written,
            skipped,
            ..IngestionReport::default()
        })
    }

    /// Chunker output for one file, served from the cache when possible
    pub async fn chunks_for_file(&self, path: &Path) -> Result<Vec<RawChunk>, IngestionError> {
        if !path.exists() {
            return Err(IngestionError::FileNotFound(path.display().to_string()));
        }

        let cache_key = match self.cache {
            Some(_) => Some(ChunkCache::key(&tokio::fs::read(path).await?, &self.chunking)),
            None => None,
        };

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Some(mut chunks) = cache.get(key).await {
                metrics::record_cache(true, "chunks");
                // the entry may come from a byte-identical file at another path
                let location = location_metadata(path);
                for chunk in &mut chunks {
                    chunk.metadata.extend(location.clone());
                }
                return Ok(chunks);
            }
            metrics::record_cache(false, "chunks");
        }

        let partitioner = self.partitioner.clone();
        let chunking = self.chunking.clone();
        let owned = path.to_path_buf();
        // partitioning is CPU-bound and synchronous
        let chunks = tokio::task::spawn_blocking(move || {
            partitioner
                .partition(&owned)
                .map(|elements| chunk_by_title(&elements, &chunking))
        })
        .await
        .map_err(|e| IngestionError::ChunkingError(format!("partition task failed: {}", e)))??;

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Err(e) = cache.put(key, &chunks).await {
                warn!(error = %e, "Failed to write chunk cache entry");
            }
        }

        Ok(chunks)
    }

    /// Embed and write numbered chunks into a new collection.
    ///
    /// On failure the partially written collection is dropped so the next
    /// run starts clean instead of hitting the existing-collection guard.
    async fn write_chunks(
        &self,
        collection: &str,
        chunks: Vec<Chunk>,
    ) -> Result<usize, IngestionError> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(AppError::EmbeddingError {
                message: format!("Expected {} embeddings, got {}", chunks.len(), vectors.len()),
            }
            .into());
        }

        let points: Vec<PointRecord> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| PointRecord {
                id: chunk.id.clone(),
                payload: chunk.to_payload(),
                vector,
            })
            .collect();

        self.index
            .create_collection(collection, self.embedder.dimension())
            .await?;

        let total = points.len();
        for batch in points.chunks(self.upsert_batch_size) {
            if let Err(e) = self.upsert_with_retry(collection, batch.to_vec()).await {
                error!(collection, error = %e, "Upsert failed, dropping partial collection");
                if let Err(cleanup) = self.index.delete_collection(collection).await {
                    warn!(collection, error = %cleanup, "Failed to drop partial collection");
                }
                return Err(e.into());
            }
            debug!(collection, batch = batch.len(), "Batch written");
        }

        Ok(total)
    }

    async fn upsert_with_retry(
        &self,
        collection: &str,
        points: Vec<PointRecord>,
    ) -> Result<(), AppError> {
        let policy = ExponentialBackoff {
            max_elapsed_time: Some(UPSERT_RETRY_WINDOW),
            ..ExponentialBackoff::default()
        };

        retry(policy, || {
            let points = points.clone();
            async move {
                self.index.upsert(collection, points).await.map_err(|e| {
                    if e.is_retryable() {
                        warn!(collection, error = %e, "Upsert failed, retrying");
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            }
        })
        .await
    }

    /// Drop a collection so it can be re-ingested
    pub async fn delete_collection(&self, collection: &str) -> Result<bool, IngestionError> {
        let existed = self.index.delete_collection(collection).await?;
        info!(collection, existed, "Collection deleted");
        Ok(existed)
    }

    pub async fn list_collections(&self) -> Result<Vec<String>, IngestionError> {
        Ok(self.index.list_collections().await?)
    }
}

fn existing_report(collection: &str) -> IngestionReport {
    IngestionReport {
        collection: collection.to_string(),
        already_existed: true,
        ..IngestionReport::default()
    }
}

/// PDFs to ingest: the file itself, or a directory's PDFs sorted by name
pub fn discover_pdfs(path: &Path) -> Result<Vec<PathBuf>, IngestionError> {
    if !path.exists() {
        return Err(IngestionError::FileNotFound(path.display().to_string()));
    }
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(path)? {
        let candidate = entry?.path();
        let is_pdf = candidate
            .extension()
            .map(|e| e.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        if candidate.is_file() && is_pdf {
            files.push(candidate);
        }
    }

    if files.is_empty() {
        return Err(IngestionError::NoDocuments(path.display().to_string()));
    }
    // sorted so numbering does not depend on directory iteration order
    files.sort();
    Ok(files)
}
