//! Error types for the recommendation engine.
//!
//! Build-time failures (`EmbeddingProvider`, `MalformedInput`) are fatal and
//! reach the caller. Query-time failures on the mandatory path (`NotReady`,
//! `NotFound`) are reported. `Rerank` is produced only inside the reranker
//! and is always absorbed there.

use thiserror::Error;

use crate::models::AuthorId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Engine not ready: no snapshot has been built yet")]
    NotReady,

    #[error("Author not found: {0}")]
    NotFound(AuthorId),

    #[error("Embedding provider error: {0}")]
    EmbeddingProvider(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Rerank failed: {0}")]
    Rerank(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn embedding(err: impl std::fmt::Display) -> Self {
        Error::EmbeddingProvider(err.to_string())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedInput(msg.into())
    }

    pub fn rerank(msg: impl Into<String>) -> Self {
        Error::Rerank(msg.into())
    }
}
