//! Answer a visitor question from an indexed artwork collection

use artalk_common::embeddings::{Embedder, MockEmbedder};
use artalk_common::vectorstore::{InMemoryIndex, PointRecord, VectorIndex};
use artalk_context::artwork::{Artist, Museum};
use artalk_context::{Artwork, InMemoryCatalog, MockGenerator, RagService};
use artalk_search::ContextRetriever;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const PASSAGES: [&str; 6] = [
    "Guernica est une peinture de Pablo Picasso.",
    "Elle a été réalisée en 1937 à Paris.",
    "Le tableau évoque le bombardement de la ville basque.",
    "La toile mesure près de huit mètres de long.",
    "Elle est exposée au musée Reina Sofía.",
    "Elle a voyagé dans le monde entier avant 1981.",
];

fn guernica() -> Artwork {
    Artwork {
        id: "guernica".into(),
        title: "Guernica".into(),
        artist: Artist {
            name: "Picasso".into(),
            artist_biography: "Peintre et sculpteur espagnol.".into(),
            ..Artist::default()
        },
        museum: Museum {
            name: "Reina Sofía".into(),
            museum_context: "Musée national d'art moderne à Madrid.".into(),
            ..Museum::default()
        },
        description: "Huile sur toile en noir et blanc.".into(),
        ..Artwork::default()
    }
}

async fn indexed(collection: &str) -> Arc<InMemoryIndex> {
    let embedder = MockEmbedder::new(32);
    let index = Arc::new(InMemoryIndex::new());
    index.create_collection(collection, 32).await.unwrap();

    let mut points = Vec::new();
    for (n, text) in PASSAGES.iter().enumerate() {
        points.push(PointRecord {
            id: format!("p{}", n),
            vector: embedder.embed(text).await.unwrap(),
            payload: json!({
                "page_content": text,
                "metadata": { "chunk_number": n, "source": "guernica.pdf" }
            }),
        });
    }
    index.upsert(collection, points).await.unwrap();
    index
}

#[tokio::test]
async fn grounded_prompt_reads_in_document_order() {
    let artwork = guernica();
    let collection = artwork.collection_name();

    let catalog = InMemoryCatalog::new();
    catalog.insert(artwork.clone()).await;

    let retriever = ContextRetriever::new(
        Arc::new(MockEmbedder::new(32)),
        indexed(&collection).await,
        1,
        2,
    );
    let generator = Arc::new(MockGenerator::new());
    let service = RagService::new(Arc::new(retriever), Arc::new(catalog), generator.clone());

    let answer = service
        .answer(PASSAGES[3], Some(&collection), Some("art_guide"), &CancellationToken::new())
        .await
        .unwrap();
    assert!(!answer.is_empty());

    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 1);
    let prompt = &prompts[0];

    assert!(prompt.contains(&artwork.global_context()));
    let positions: Vec<usize> = [2, 3, 4]
        .iter()
        .map(|&n| prompt.find(PASSAGES[n]).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
    assert!(!prompt.contains(PASSAGES[0]));
    assert!(prompt.contains("[chunk_number 3 | guernica.pdf]"));
}

#[tokio::test]
async fn unknown_collection_still_answers() {
    let retriever = ContextRetriever::new(
        Arc::new(MockEmbedder::new(32)),
        Arc::new(InMemoryIndex::new()),
        6,
        100,
    );
    let generator = Arc::new(MockGenerator::new());
    let service = RagService::new(
        Arc::new(retriever),
        Arc::new(InMemoryCatalog::new()),
        generator.clone(),
    );

    service
        .answer("Qui est l'artiste ?", Some("Inconnue, X"), None, &CancellationToken::new())
        .await
        .unwrap();

    let prompt = &generator.prompts()[0];
    assert!(prompt.contains("Artwork collection 'Inconnue, X' not found"));
    assert!(prompt.ends_with("Question : Qui est l'artiste ?"));
}
