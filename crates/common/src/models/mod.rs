//! Core data model shared by ingestion and retrieval
//!
//! - `Chunk`: a numbered, stored segment of a source document
//! - `RawChunk`: chunker output before numbering
//! - `Metadata`: flat primitive map accepted by the vector index

mod chunk;
mod metadata;

pub use chunk::{Chunk, RawChunk, PAGE_CONTENT_KEY, PAYLOAD_METADATA_KEY};
pub use metadata::{normalize_metadata, parse_chunk_number, Metadata, MetadataValue};
