//! Artalk Context
//!
//! Generation layer on top of the retrieval core:
//! - Prompt templates and context rendering
//! - Artwork metadata catalog
//! - Generative model clients (Gemini REST, mock)
//! - RAG service assembling grounded prompts

pub mod artwork;
pub mod generator;
pub mod prompt;
pub mod rag;

pub use artwork::{global_context_for_collection, Artwork, ArtworkCatalog, InMemoryCatalog};
pub use generator::{create_generator, Generator, MockGenerator, TextStream};
pub use prompt::{render_context, PromptLibrary, NO_CONTEXT_PROMPT};
pub use rag::RagService;
