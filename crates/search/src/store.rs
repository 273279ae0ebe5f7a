//! Chunk store accessor
//!
//! Enumerates every chunk of a collection by following the index's scroll
//! cursor until it is exhausted.

use artalk_common::errors::{AppError, Result};
use artalk_common::models::Chunk;
use artalk_common::vectorstore::{ScrollCursor, VectorIndex};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

pub struct ChunkStore {
    index: Arc<dyn VectorIndex>,
    page_size: usize,
}

impl ChunkStore {
    pub fn new(index: Arc<dyn VectorIndex>, page_size: usize) -> Self {
        Self {
            index,
            page_size: page_size.max(1),
        }
    }

    /// All chunks of `collection`, ascending by chunk number.
    ///
    /// A missing collection yields an empty list. Cancellation aborts between
    /// and during page requests with `AppError::Cancelled`.
    #[instrument(skip(self, cancel), fields(page_size = self.page_size))]
    pub async fn fetch_all(
        &self,
        collection: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Chunk>> {
        let mut chunks = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut cursor: Option<ScrollCursor> = None;
        let mut visited: HashSet<String> = HashSet::new();
        let mut pages = 0usize;

        loop {
            let page = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(pages, "Scroll cancelled");
                    return Err(AppError::Cancelled);
                }
                page = self.index.scroll(collection, cursor.clone(), self.page_size) => page,
            };

            let page = match page {
                Ok(page) => page,
                Err(AppError::CollectionNotFound { .. }) => {
                    debug!("Collection not found, no chunks");
                    return Ok(Vec::new());
                }
                Err(e) => return Err(e),
            };
            pages += 1;

            for point in page.points {
                if !seen.insert(point.id.clone()) {
                    warn!(id = %point.id, "Duplicate point returned by scroll, ignoring");
                    continue;
                }
                match Chunk::from_payload(collection, point.id, &point.payload) {
                    Ok(chunk) => chunks.push(chunk),
                    Err(e) => warn!(error = %e, "Point is not a numbered chunk, skipping"),
                }
            }

            // a cursor seen before means the store is cycling
            match page.next {
                None => break,
                Some(next) if !visited.insert(next.0.to_string()) => {
                    warn!(pages, cursor = %next.0, "Scroll cursor repeated, stopping");
                    break;
                }
                Some(next) => cursor = Some(next),
            }
        }

        chunks.sort_by_key(|c| c.chunk_number);
        debug!(pages, count = chunks.len(), "Collection enumerated");
        Ok(chunks)
    }
}
