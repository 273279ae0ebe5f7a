//! Grounded answer service
//!
//! Assembles the prompt from artwork context and expanded chunks, then hands
//! it to the generator.

use crate::artwork::{global_context_for_collection, ArtworkCatalog};
use crate::generator::{Generator, TextStream};
use crate::prompt::{render_context, PromptLibrary, NO_CONTEXT_PROMPT};
use artalk_common::errors::{AppError, Result};
use artalk_search::Retriever;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

pub struct RagService {
    retriever: Arc<dyn Retriever>,
    catalog: Arc<dyn ArtworkCatalog>,
    generator: Arc<dyn Generator>,
    prompts: PromptLibrary,
}

impl RagService {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        catalog: Arc<dyn ArtworkCatalog>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            retriever,
            catalog,
            generator,
            prompts: PromptLibrary::default(),
        }
    }

    pub fn with_prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn list_templates(&self) -> Vec<&str> {
        self.prompts.names()
    }

    /// Context block for `query`: the artwork preamble followed by the
    /// expanded chunks in document order.
    ///
    /// Retrieval failures degrade to the no-context prompt. Cancellation is
    /// the one error passed through.
    pub async fn context_for(
        &self,
        query: &str,
        collection: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let Some(collection) = collection else {
            return Ok(NO_CONTEXT_PROMPT.to_string());
        };

        let (artwork, chunks) = tokio::join!(
            global_context_for_collection(self.catalog.as_ref(), collection),
            self.retriever.get_context(query, collection, cancel)
        );

        let chunks = match chunks {
            Ok(chunks) => chunks,
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(e) => {
                warn!(collection, error = %e, "Retrieval failed, answering without context");
                return Ok(NO_CONTEXT_PROMPT.to_string());
            }
        };

        debug!(collection, chunks = chunks.len(), "Context assembled");
        Ok(render_context(Some(artwork.as_str()), &chunks))
    }

    pub async fn build_prompt(
        &self,
        query: &str,
        collection: Option<&str>,
        template: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let context = self.context_for(query, collection, cancel).await?;
        Ok(self.prompts.render(template, &context, query))
    }

    #[instrument(skip(self, query, cancel))]
    pub async fn answer(
        &self,
        query: &str,
        collection: Option<&str>,
        template: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let prompt = self.build_prompt(query, collection, template, cancel).await?;
        let answer = self.generator.generate(&prompt).await?;
        info!(
            model = self.generator.model_name(),
            prompt_chars = prompt.len(),
            answer_chars = answer.len(),
            "Answer generated"
        );
        Ok(answer)
    }

    #[instrument(skip(self, query, cancel))]
    pub async fn answer_stream(
        &self,
        query: &str,
        collection: Option<&str>,
        template: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<TextStream> {
        let prompt = self.build_prompt(query, collection, template, cancel).await?;
        self.generator.generate_stream(&prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artwork::{Artist, Artwork, InMemoryCatalog};
    use crate::generator::MockGenerator;
    use artalk_common::models::{Chunk, Metadata};
    use async_trait::async_trait;
    use futures::StreamExt;

    struct FixedRetriever(Vec<Chunk>);

    #[async_trait]
    impl Retriever for FixedRetriever {
        async fn get_context(
            &self,
            _query: &str,
            _collection: &str,
            _cancel: &CancellationToken,
        ) -> Result<Vec<Chunk>> {
            Ok(self.0.clone())
        }
    }

    struct FailingRetriever(fn() -> AppError);

    #[async_trait]
    impl Retriever for FailingRetriever {
        async fn get_context(
            &self,
            _query: &str,
            _collection: &str,
            _cancel: &CancellationToken,
        ) -> Result<Vec<Chunk>> {
            Err((self.0)())
        }
    }

    fn chunk(n: u64, text: &str) -> Chunk {
        Chunk {
            id: n.to_string(),
            text: text.to_string(),
            collection_name: "Guernica, Picasso".into(),
            chunk_number: n,
            metadata: Metadata::new(),
            embedding: None,
        }
    }

    async fn catalog() -> Arc<InMemoryCatalog> {
        let catalog = InMemoryCatalog::new();
        catalog
            .insert(Artwork {
                id: "a1".into(),
                title: "Guernica".into(),
                artist: Artist {
                    name: "Picasso".into(),
                    ..Artist::default()
                },
                description: "Huile sur toile".into(),
                ..Artwork::default()
            })
            .await;
        Arc::new(catalog)
    }

    async fn service(retriever: impl Retriever + 'static) -> (RagService, Arc<MockGenerator>) {
        let generator = Arc::new(MockGenerator::new());
        let service = RagService::new(Arc::new(retriever), catalog().await, generator.clone());
        (service, generator)
    }

    #[tokio::test]
    async fn test_prompt_carries_artwork_and_chunks() {
        let (service, _) =
            service(FixedRetriever(vec![chunk(4, "quatre"), chunk(5, "cinq")])).await;

        let prompt = service
            .build_prompt("Quand ?", Some("Guernica, Picasso"), None, &CancellationToken::new())
            .await
            .unwrap();

        let description = prompt.find("Huile sur toile").unwrap();
        let four = prompt.find("quatre").unwrap();
        let five = prompt.find("cinq").unwrap();
        assert!(description < four && four < five);
        assert!(prompt.ends_with("Question : Quand ?"));
    }

    #[tokio::test]
    async fn test_no_collection_means_no_context() {
        let (service, _) = service(FixedRetriever(vec![chunk(0, "zero")])).await;
        let prompt = service
            .build_prompt("Bonjour", None, None, &CancellationToken::new())
            .await
            .unwrap();
        assert!(prompt.contains(NO_CONTEXT_PROMPT));
        assert!(!prompt.contains("zero"));
    }

    #[tokio::test]
    async fn test_retrieval_failure_degrades() {
        let (service, generator) = service(FailingRetriever(|| AppError::StoreUnavailable {
            message: "down".into(),
        }))
        .await;

        let answer = service
            .answer("Q", Some("Guernica, Picasso"), None, &CancellationToken::new())
            .await;
        tokio_test::assert_ok!(answer);
        assert!(generator.prompts()[0].contains(NO_CONTEXT_PROMPT));
    }

    #[tokio::test]
    async fn test_cancellation_is_not_swallowed() {
        let (service, generator) = service(FailingRetriever(|| AppError::Cancelled)).await;
        let err = service
            .answer("Q", Some("Guernica, Picasso"), None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Cancelled));
        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_collection_uses_lookup_error_as_context() {
        let (service, _) = service(FixedRetriever(Vec::new())).await;
        let prompt = service
            .build_prompt("Q", Some("Joconde, Vinci"), None, &CancellationToken::new())
            .await
            .unwrap();
        assert!(prompt.contains("Artwork collection 'Joconde, Vinci' not found"));
    }

    #[tokio::test]
    async fn test_stream_matches_answer() {
        let (service, _) = service(FixedRetriever(vec![chunk(0, "zero")])).await;
        let cancel = CancellationToken::new();
        let full = service
            .answer("Q", Some("Guernica, Picasso"), Some("art_guide"), &cancel)
            .await
            .unwrap();
        let parts: Vec<String> = service
            .answer_stream("Q", Some("Guernica, Picasso"), Some("art_guide"), &cancel)
            .await
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(parts.concat(), full);
    }

    #[tokio::test]
    async fn test_list_templates() {
        let (service, _) = service(FixedRetriever(Vec::new())).await;
        assert_eq!(
            service.list_templates(),
            vec!["art_guide", "default", "technical_spec"]
        );
    }
}
