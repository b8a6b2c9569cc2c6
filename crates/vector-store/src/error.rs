use crate::metric::DistanceMetric;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, VectorStoreError>;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("Embedding provider timed out after {0:?}")]
    EmbeddingTimeout(Duration),

    #[error("Vector index is not ready")]
    IndexNotReady,

    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Duplicate vector for entry {0}")]
    DuplicateEntry(usize),

    #[error("Distance metric mismatch: index uses {found}, expected {expected}")]
    MetricMismatch {
        expected: DistanceMetric,
        found: DistanceMetric,
    },

    #[error("Stale vector index: {0}")]
    StaleIndex(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl VectorStoreError {
    /// Failure of the external embedding provider (unreachable, bad
    /// response or timeout), as opposed to a problem with the index itself
    #[must_use]
    pub const fn is_provider_failure(&self) -> bool {
        matches!(self, Self::EmbeddingError(_) | Self::EmbeddingTimeout(_))
    }
}
