//! Typed errors for the ingestion-to-scoring pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Extraction produced empty or whitespace-only text.
    #[error("could not extract text from file")]
    NoText,

    /// A store read or write failed. Already-written records are not rolled
    /// back unless the backend itself is transactional.
    #[error("processing failed: {0}")]
    Persistence(#[source] anyhow::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A background job failed to complete (worker panic or shutdown).
    #[error("internal error: {0}")]
    Internal(#[source] anyhow::Error),
}

impl Error {
    pub fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidInput(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
