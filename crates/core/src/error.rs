use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChunkingError {
    #[error("invalid chunking config: {0}")]
    InvalidConfig(String),

    #[error("chunking exceeded its step bound ({steps} steps, bound {bound})")]
    Overrun { steps: usize, bound: usize },
}

#[derive(Debug, Error, PartialEq)]
pub enum IndexError {
    #[error("vector dimension {actual} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("position {position} is out of range for store of size {size}")]
    OutOfRange { position: usize, size: usize },

    #[error("batch has {vectors} vectors but {chunks} chunks")]
    BatchMismatch { vectors: usize, chunks: usize },
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding backend failed: {0}")]
    Backend(String),

    #[error("embedding task aborted: {0}")]
    Aborted(String),
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("{backend} returned an empty answer")]
    EmptyAnswer { backend: String },

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("snapshot dimension {found} is incompatible with configured dimension {expected}")]
    Incompatible { expected: usize, found: usize },

    #[error("snapshot artifacts disagree: {0}")]
    Inconsistent(String),

    #[error("unsupported snapshot format version {0}")]
    UnsupportedVersion(u32),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Chunking(#[from] ChunkingError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("search request failed: {0}")]
    Request(String),
}
