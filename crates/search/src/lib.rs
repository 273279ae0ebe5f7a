//! Artalk Search
//!
//! Query-time retrieval core:
//! - Chunk store accessor (complete, cursor-paginated collection scan)
//! - Similarity search over the vector index
//! - Neighbor expansion of hits into ordered context

pub mod context;
pub mod expansion;
pub mod similarity;
pub mod store;

pub use context::{ContextRetriever, Retriever};
pub use expansion::expand;
pub use similarity::SimilaritySearch;
pub use store::ChunkStore;
