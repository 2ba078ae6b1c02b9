use docuchain_core::{DocuchainError, EmbeddingError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("invalid document id: {0}")]
    InvalidId(String),
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("lookup failed for '{key}': {reason}")]
    Lookup { key: String, reason: String },
    #[error("relevance grading failed: {0}")]
    Grader(#[source] DocuchainError),
    #[error("invalid retriever config: {0}")]
    Config(String),
    #[error("{0}")]
    Other(String),
}

pub type RetrievalResult<T> = Result<T, RetrievalError>;
