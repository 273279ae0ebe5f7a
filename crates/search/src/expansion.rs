//! Neighbor expansion
//!
//! Widens a set of similarity hits with each hit's predecessor and successor
//! so the generation layer reads whole passages instead of isolated chunks.
//!
//! The output holds each chunk number at most once and is sorted ascending,
//! which is the order context is handed to the prompt.

use artalk_common::errors::{AppError, Result};
use artalk_common::metrics;
use artalk_common::models::Chunk;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

/// Expand `hits` with their sequential neighbors taken from `all`.
///
/// Fails with `CrossCollection` when the inputs mix collections. Neighbors
/// missing from `all` are logged and skipped.
pub fn expand(hits: &[Chunk], all: &[Chunk]) -> Result<Vec<Chunk>> {
    let Some(first) = hits.first() else {
        return Ok(Vec::new());
    };
    let collection = first.collection_name.as_str();

    if let Some(stray) = hits.iter().chain(all).find(|c| !c.belongs_to(collection)) {
        return Err(AppError::CrossCollection {
            expected: collection.to_string(),
            found: stray.collection_name.clone(),
        });
    }

    let mut by_number: HashMap<u64, &Chunk> = HashMap::with_capacity(all.len());
    for chunk in all {
        by_number.entry(chunk.chunk_number).or_insert(chunk);
    }
    let max_chunk_number = all.iter().map(|c| c.chunk_number).max();

    // hits go in first so a hit wins over its copy in `all`
    let mut out: BTreeMap<u64, Chunk> = BTreeMap::new();
    for hit in hits {
        out.entry(hit.chunk_number).or_insert_with(|| hit.clone());
    }

    let mut gaps: HashSet<u64> = HashSet::new();
    for hit in hits {
        let n = hit.chunk_number;
        let previous = n.checked_sub(1);
        let next = max_chunk_number.filter(|&max| n < max).map(|_| n + 1);

        for neighbor in [previous, next].into_iter().flatten() {
            if out.contains_key(&neighbor) {
                continue;
            }
            match by_number.get(&neighbor) {
                Some(chunk) => {
                    out.insert(neighbor, (*chunk).clone());
                }
                None => {
                    if gaps.insert(neighbor) {
                        let gap = AppError::IntegrityGap {
                            collection: collection.to_string(),
                            chunk_number: neighbor,
                        };
                        warn!(error = %gap, hit = n, "Neighbor chunk missing, skipping");
                        metrics::record_integrity_gap(collection);
                    }
                }
            }
        }
    }

    debug!(
        collection,
        hits = hits.len(),
        expanded = out.len(),
        gaps = gaps.len(),
        "Hits expanded"
    );
    Ok(out.into_values().collect())
}
