//! Artalk Ingestion
//!
//! Turns PDFs into numbered chunks in the vector index:
//! partition, chunk by title, number, embed, upsert.

pub mod cache;
pub mod chunker;
pub mod errors;
pub mod numbering;
pub mod pdf;
pub mod processor;

pub use chunker::{chunk_by_title, ChunkingConfig};
pub use errors::IngestionError;
pub use numbering::{assign_numbers, ChunkNumberer, NumberingOutcome};
pub use pdf::{PdfPartitioner, Partitioner, RawElement};
pub use processor::{IngestionProcessor, IngestionReport};
