//! Chunk numbering
//!
//! Turns chunker output into stored chunks with a zero-based, strictly
//! increasing `chunk_number` per collection. Numbering is a pure function of
//! input order, so re-ingesting identical chunker output reproduces the same
//! numbers and ids.

use artalk_common::errors::{AppError, Result};
use artalk_common::models::{normalize_metadata, Chunk, RawChunk};
use artalk_common::CHUNK_NUMBER_KEY;
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

/// A chunk that could not be converted and was left out
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedChunk {
    /// Position in the input batch
    pub position: usize,
    pub reason: String,
}

/// Result of numbering one batch
#[derive(Debug, Default)]
pub struct NumberingOutcome {
    pub chunks: Vec<Chunk>,
    pub skipped: Vec<SkippedChunk>,
}

/// Assigns chunk numbers, continuing per collection across batches.
#[derive(Debug, Default)]
pub struct ChunkNumberer {
    next: HashMap<String, u64>,
}

impl ChunkNumberer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number that the next successfully converted chunk of `collection` receives
    pub fn next_number(&self, collection: &str) -> u64 {
        self.next.get(collection).copied().unwrap_or(0)
    }

    /// Number a batch in input order.
    ///
    /// A chunk that fails conversion is skipped and does not consume a number.
    pub fn assign(&mut self, collection: &str, raw: Vec<RawChunk>) -> NumberingOutcome {
        let mut outcome = NumberingOutcome::default();
        let mut n = self.next_number(collection);

        for (position, item) in raw.into_iter().enumerate() {
            match convert(collection, n, position, item) {
                Ok(chunk) => {
                    outcome.chunks.push(chunk);
                    n += 1;
                }
                Err(e) => {
                    warn!(collection, position, error = %e, "Skipping chunk");
                    outcome.skipped.push(SkippedChunk {
                        position,
                        reason: e.to_string(),
                    });
                }
            }
        }

        self.next.insert(collection.to_string(), n);
        outcome
    }
}

/// Number a single batch starting at zero
pub fn assign_numbers(collection: &str, raw: Vec<RawChunk>) -> NumberingOutcome {
    ChunkNumberer::new().assign(collection, raw)
}

/// Deterministic point id for a chunk position
pub fn chunk_id(collection: &str, chunk_number: u64) -> String {
    let name = format!("{}:{}", collection, chunk_number);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

fn convert(collection: &str, n: u64, position: usize, raw: RawChunk) -> Result<Chunk> {
    if raw.text.trim().is_empty() {
        return Err(AppError::IngestionItem {
            position,
            message: "chunk text is empty".to_string(),
        });
    }

    let filename = raw
        .metadata
        .get("filename")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::IngestionItem {
            position,
            message: "metadata has no filename".to_string(),
        })?;

    let mut metadata = normalize_metadata(&raw.metadata);
    // chunk_number lives on the chunk itself; a stale value from upstream must not leak
    metadata.remove(CHUNK_NUMBER_KEY);
    metadata.insert("source".to_string(), filename.into());

    Ok(Chunk {
        id: chunk_id(collection, n),
        text: raw.text,
        collection_name: collection.to_string(),
        chunk_number: n,
        metadata,
        embedding: None,
    })
}
