//! End-to-end ingestion into the in-memory index

use artalk_common::embeddings::MockEmbedder;
use artalk_common::models::{Chunk, RawChunk};
use artalk_common::vectorstore::{InMemoryIndex, VectorIndex};
use artalk_ingestion::pdf::{ElementCategory, Partitioner, RawElement};
use artalk_ingestion::{ChunkingConfig, IngestionError, IngestionProcessor};
use serde_json::{json, Map};
use std::path::Path;
use std::sync::Arc;

struct NeverCalled;

impl Partitioner for NeverCalled {
    fn partition(&self, path: &Path) -> Result<Vec<RawElement>, IngestionError> {
        panic!("unexpected partition of {}", path.display());
    }
}

fn raw(text: &str, file: &str) -> RawChunk {
    let mut metadata = Map::new();
    metadata.insert("filename".into(), json!(file));
    metadata.insert("category".into(), json!("CompositeElement"));
    RawChunk::new(text, metadata)
}

async fn stored_chunks(index: &InMemoryIndex, collection: &str) -> Vec<Chunk> {
    let page = index.scroll(collection, None, 1000).await.unwrap();
    let mut chunks: Vec<Chunk> = page
        .points
        .into_iter()
        .map(|p| Chunk::from_payload(collection, p.id, &p.payload).unwrap())
        .collect();
    chunks.sort_by_key(|c| c.chunk_number);
    chunks
}

#[tokio::test]
async fn stored_payloads_carry_contiguous_numbers() {
    let index = Arc::new(InMemoryIndex::new());
    let processor = IngestionProcessor::new(
        Arc::new(NeverCalled),
        Arc::new(MockEmbedder::new(16)),
        index.clone(),
        ChunkingConfig::default(),
    );

    let batch = vec![
        raw("Introduction", "guide.pdf"),
        raw("", "guide.pdf"),
        raw("Salle 1", "guide.pdf"),
        raw("Salle 2", "annexe.pdf"),
    ];
    let report = processor.ingest_chunks("Guernica, Pablo Picasso", batch).await.unwrap();
    assert_eq!(report.written, 3);
    assert_eq!(report.skipped, 1);

    let chunks = stored_chunks(&index, "Guernica, Pablo Picasso").await;
    let numbers: Vec<u64> = chunks.iter().map(|c| c.chunk_number).collect();
    assert_eq!(numbers, vec![0, 1, 2]);
    assert_eq!(chunks[1].text, "Salle 1");
    assert_eq!(chunks[2].source(), Some("annexe.pdf"));
    assert!(chunks.iter().all(|c| c.belongs_to("Guernica, Pablo Picasso")));
}

#[tokio::test]
async fn partitioned_elements_flow_through_title_chunking() {
    struct TwoSections;

    impl Partitioner for TwoSections {
        fn partition(&self, _path: &Path) -> Result<Vec<RawElement>, IngestionError> {
            let meta = |page: u64| {
                let mut m = Map::new();
                m.insert("filename".into(), json!("catalogue.pdf"));
                m.insert("page_number".into(), json!(page));
                m
            };
            let body = "Texte descriptif de l'oeuvre. ".repeat(30);
            Ok(vec![
                RawElement {
                    text: "Histoire".into(),
                    category: ElementCategory::Title,
                    metadata: meta(1),
                },
                RawElement {
                    text: body.clone(),
                    category: ElementCategory::NarrativeText,
                    metadata: meta(1),
                },
                RawElement {
                    text: "Restauration".into(),
                    category: ElementCategory::Title,
                    metadata: meta(2),
                },
                RawElement {
                    text: body,
                    category: ElementCategory::NarrativeText,
                    metadata: meta(2),
                },
            ])
        }
    }

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("catalogue.pdf"), b"%PDF-1.7").unwrap();
    let index = Arc::new(InMemoryIndex::new());
    let processor = IngestionProcessor::new(
        Arc::new(TwoSections),
        Arc::new(MockEmbedder::new(16)),
        index.clone(),
        ChunkingConfig::default(),
    );

    let report = processor.ingest_path(dir.path(), "Catalogue").await.unwrap();
    assert_eq!(report.written, 2);

    let chunks = stored_chunks(&index, "Catalogue").await;
    assert!(chunks[0].text.starts_with("Histoire"));
    assert!(chunks[1].text.starts_with("Restauration"));
    assert_eq!(chunks[1].metadata["page_number"].as_i64(), Some(2));
}
