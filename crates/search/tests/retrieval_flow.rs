//! Ingest a numbered collection, then retrieve expanded context from it

use artalk_common::embeddings::MockEmbedder;
use artalk_common::errors::Result;
use artalk_common::models::{Chunk, RawChunk};
use artalk_common::vectorstore::InMemoryIndex;
use artalk_ingestion::pdf::{Partitioner, RawElement};
use artalk_ingestion::{ChunkingConfig, IngestionError, IngestionProcessor};
use artalk_search::{expand, ChunkStore, ContextRetriever, Retriever, SimilaritySearch};
use serde_json::{json, Map};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const COLLECTION: &str = "DocA";

struct Unused;

impl Partitioner for Unused {
    fn partition(&self, _path: &Path) -> std::result::Result<Vec<RawElement>, IngestionError> {
        Ok(Vec::new())
    }
}

fn passage(n: usize) -> String {
    format!("Passage numéro {} du guide de visite.", n)
}

async fn ingest(count: usize) -> Arc<InMemoryIndex> {
    let index = Arc::new(InMemoryIndex::new());
    let processor = IngestionProcessor::new(
        Arc::new(Unused),
        Arc::new(MockEmbedder::new(24)),
        index.clone(),
        ChunkingConfig::default(),
    );

    let raw = (0..count)
        .map(|n| {
            let mut metadata = Map::new();
            metadata.insert("filename".into(), json!("guide.pdf"));
            RawChunk::new(passage(n), metadata)
        })
        .collect();
    let report = processor.ingest_chunks(COLLECTION, raw).await.unwrap();
    assert_eq!(report.written, count);
    index
}

async fn all_chunks(index: Arc<InMemoryIndex>, page_size: usize) -> Result<Vec<Chunk>> {
    ChunkStore::new(index, page_size)
        .fetch_all(COLLECTION, &CancellationToken::new())
        .await
}

#[tokio::test]
async fn ingested_numbers_are_contiguous_for_any_page_size() {
    let index = ingest(10).await;
    for page_size in [1, 3, 7, 10] {
        let numbers: Vec<u64> = all_chunks(index.clone(), page_size)
            .await
            .unwrap()
            .iter()
            .map(|c| c.chunk_number)
            .collect();
        assert_eq!(numbers, (0..10).collect::<Vec<u64>>());
    }
}

#[tokio::test]
async fn search_hits_expand_in_document_order() {
    let index = ingest(10).await;
    let search = SimilaritySearch::new(Arc::new(MockEmbedder::new(24)), index.clone());
    let all = all_chunks(index.clone(), 4).await.unwrap();

    let mut hits = search.search(&passage(7), COLLECTION, 1).await.unwrap();
    hits.extend(search.search(&passage(3), COLLECTION, 1).await.unwrap());

    let expanded = expand(&hits, &all).unwrap();
    let numbers: Vec<u64> = expanded.iter().map(|c| c.chunk_number).collect();
    assert_eq!(numbers, vec![2, 3, 4, 6, 7, 8]);
    assert_eq!(expanded[0].text, passage(2));
}

#[tokio::test]
async fn retriever_returns_edge_context() {
    let index = ingest(10).await;
    let retriever = ContextRetriever::new(Arc::new(MockEmbedder::new(24)), index, 1, 3);
    let cancel = CancellationToken::new();

    let first = retriever.get_context(&passage(0), COLLECTION, &cancel).await.unwrap();
    let last = retriever.get_context(&passage(9), COLLECTION, &cancel).await.unwrap();

    let nums = |chunks: &[Chunk]| chunks.iter().map(|c| c.chunk_number).collect::<Vec<_>>();
    assert_eq!(nums(&first), vec![0, 1]);
    assert_eq!(nums(&last), vec![8, 9]);
    assert!(last.iter().all(|c| c.source() == Some("guide.pdf")));
}
