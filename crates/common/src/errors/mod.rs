//! Error types for Artalk services
//!
//! Provides a single error enum shared by the retrieval core with:
//! - Distinct variants for soft failures (empty result) and hard failures
//! - Retryability classification for transport errors
//! - Error codes for machine-readable identification

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    MissingField,

    // Metadata record errors (2xxx)
    RecordNotFound,

    // Retrieval errors (4xxx)
    CollectionNotFound,
    CrossCollection,
    IntegrityGap,

    // Ingestion errors (5xxx)
    IngestionItem,

    // External service errors (8xxx)
    StoreUnavailable,
    StoreRejected,
    EmbeddingError,
    GenerationError,

    // Internal errors (9xxx)
    Cancelled,
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::MissingField => 1002,

            ErrorCode::RecordNotFound => 2001,

            ErrorCode::CollectionNotFound => 4001,
            ErrorCode::CrossCollection => 4002,
            ErrorCode::IntegrityGap => 4003,

            ErrorCode::IngestionItem => 5001,

            ErrorCode::StoreUnavailable => 8001,
            ErrorCode::StoreRejected => 8002,
            ErrorCode::EmbeddingError => 8003,
            ErrorCode::GenerationError => 8004,

            ErrorCode::Cancelled => 9000,
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Required field missing: {field}")]
    MissingField { field: String },

    // Metadata record errors
    #[error("{kind} '{key}' not found")]
    RecordNotFound { kind: String, key: String },

    // Retrieval errors
    #[error("Collection not found: {name}")]
    CollectionNotFound { name: String },

    #[error("Chunk from collection '{found}' passed to expansion of collection '{expected}'")]
    CrossCollection { expected: String, found: String },

    #[error("Collection '{collection}' has no chunk number {chunk_number}")]
    IntegrityGap { collection: String, chunk_number: u64 },

    // Ingestion errors
    #[error("Chunk {position} could not be converted: {message}")]
    IngestionItem { position: usize, message: String },

    // External service errors
    #[error("Vector store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("Vector store rejected request ({status}): {message}")]
    StoreRejected { status: u16, message: String },

    #[error("Embedding service error: {message}")]
    EmbeddingError { message: String },

    #[error("Generation service error: {message}")]
    GenerationError { message: String },

    // Internal errors
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::MissingField { .. } => ErrorCode::MissingField,
            AppError::RecordNotFound { .. } => ErrorCode::RecordNotFound,
            AppError::CollectionNotFound { .. } => ErrorCode::CollectionNotFound,
            AppError::CrossCollection { .. } => ErrorCode::CrossCollection,
            AppError::IntegrityGap { .. } => ErrorCode::IntegrityGap,
            AppError::IngestionItem { .. } => ErrorCode::IngestionItem,
            AppError::StoreUnavailable { .. } => ErrorCode::StoreUnavailable,
            AppError::StoreRejected { .. } => ErrorCode::StoreRejected,
            AppError::EmbeddingError { .. } => ErrorCode::EmbeddingError,
            AppError::GenerationError { .. } => ErrorCode::GenerationError,
            AppError::Cancelled => ErrorCode::Cancelled,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Transport-level failures the caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::StoreUnavailable { .. } | AppError::EmbeddingError { .. }
        )
    }

    /// Failures that are recovered locally and never fail a request.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            AppError::CollectionNotFound { .. }
                | AppError::IntegrityGap { .. }
                | AppError::IngestionItem { .. }
        )
    }

    /// Precondition violations caused by the caller, not by data or transport.
    pub fn is_programmer_error(&self) -> bool {
        matches!(self, AppError::CrossCollection { .. })
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AppError::Internal {
                message: format!("Malformed response body: {}", err),
            }
        } else {
            AppError::StoreUnavailable {
                message: err.to_string(),
            }
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}
