pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod generators;
pub mod index;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod retriever;
pub mod snapshot;
pub mod store;
pub mod synthesis;
pub mod traits;

pub use chunking::{chunk, chunk_text, ChunkingConfig, TextChunk, SENTENCE_DELIMITERS};
pub use embeddings::{Embedder, HashingEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{
    ChunkingError, EmbeddingError, GenerationError, IndexError, IngestError, SearchError,
    SnapshotError,
};
pub use generators::{HuggingFaceGenerator, OpenAiGenerator};
pub use index::{FlatL2Index, Neighbor};
pub use ingest::{prepare_document, DocumentInput, PreparedDocument};
pub use models::{
    Answer, Chunk, GenerationParams, IngestionReport, RagOptions, ScoredChunk, SourceReference,
};
pub use pipeline::KnowledgeBase;
pub use retriever::retrieve;
pub use snapshot::SnapshotInfo;
pub use store::KnowledgeStore;
pub use synthesis::{AnswerSynthesizer, GenerationBackend, NO_INFORMATION_MESSAGE};
pub use traits::Generator;
