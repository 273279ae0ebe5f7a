//! Ingestion error types

use artalk_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("PDF parse error for {path}: {message}")]
    PdfParseError { path: String, message: String },

    #[error("Chunking error: {0}")]
    ChunkingError(String),

    #[error("No PDF documents found at {0}")]
    NoDocuments(String),

    #[error("Chunk cache error: {0}")]
    CacheError(String),

    #[error(transparent)]
    Core(#[from] AppError),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl IngestionError {
    /// Whether retrying the same ingestion could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            IngestionError::Core(e) => e.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_follows_core_error() {
        let transient = IngestionError::from(AppError::StoreUnavailable {
            message: "connection refused".into(),
        });
        let rejected = IngestionError::from(AppError::StoreRejected {
            status: 400,
            message: "bad vector size".into(),
        });

        assert!(transient.is_retryable());
        assert!(!rejected.is_retryable());
        assert!(!IngestionError::NoDocuments("/tmp".into()).is_retryable());
    }
}
