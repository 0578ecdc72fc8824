//! Error types for aurelia-index.

use std::path::PathBuf;

use crate::embedder::EncodingError;
use crate::snapshot::SnapshotError;
use crate::vector::IndexError;

/// Errors surfaced by the build and query operations.
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    /// A query or answer was requested before any successful build.
    #[error("no corpus has been indexed yet")]
    NotIndexed,

    /// The corpus root does not exist or is not a directory.
    #[error("corpus root not found: {}", .0.display())]
    RootNotFound(PathBuf),

    /// The embedding model rejected a document or query.
    #[error("encoding failed: {0}")]
    Encoding(#[from] EncodingError),

    #[error("vector index error: {0}")]
    Index(#[from] IndexError),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// The generation service failed. Never retried.
    #[error("generation failed: {0}")]
    Generation(#[from] aurelia_llm::LlmError),

    #[error("top_k must be at least 1")]
    InvalidTopK,

    /// A blocking worker panicked or was cancelled.
    #[error("background task failed: {0}")]
    Worker(String),
}

/// Result type alias using `RagError`.
pub type Result<T> = std::result::Result<T, RagError>;
