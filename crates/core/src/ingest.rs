use crate::chunking::{chunk_text, ChunkingConfig};
use crate::embeddings::Embedder;
use crate::error::{EmbeddingError, IndexError, IngestError};
use crate::models::Chunk;
use std::sync::Arc;

/// Raw text already extracted from one uploaded document.
#[derive(Debug, Clone)]
pub struct DocumentInput {
    pub source: String,
    pub text: String,
}

impl DocumentInput {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }
}

/// Chunks and their embeddings, same length and order, ready for one locked insert.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub source: String,
    pub chunks: Vec<Chunk>,
    pub embeddings: Vec<Vec<f32>>,
}

pub fn split_document(
    source: &str,
    text: &str,
    config: &ChunkingConfig,
) -> Result<Vec<Chunk>, IngestError> {
    if source.trim().is_empty() {
        return Err(IngestError::InvalidArgument(
            "document source name is empty".to_string(),
        ));
    }

    let chunks = chunk_text(text, config)?
        .into_iter()
        .enumerate()
        .map(|(sequence_index, piece)| Chunk {
            text: piece.text,
            source: source.to_string(),
            sequence_index: sequence_index as u64,
        })
        .collect();
    Ok(chunks)
}

/// Embeds chunk texts on the blocking pool; model inference must not stall the runtime.
pub async fn embed_chunks(
    embedder: Arc<dyn Embedder>,
    chunks: &[Chunk],
) -> Result<Vec<Vec<f32>>, IngestError> {
    let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
    let expected = texts.len();

    let embeddings = tokio::task::spawn_blocking(move || embedder.embed_many(&texts))
        .await
        .map_err(|error| EmbeddingError::Aborted(error.to_string()))??;

    if embeddings.len() != expected {
        return Err(IndexError::BatchMismatch {
            vectors: embeddings.len(),
            chunks: expected,
        }
        .into());
    }
    Ok(embeddings)
}

pub async fn prepare_document(
    document: &DocumentInput,
    config: &ChunkingConfig,
    embedder: Arc<dyn Embedder>,
) -> Result<PreparedDocument, IngestError> {
    let chunks = split_document(&document.source, &document.text, config)?;
    let embeddings = if chunks.is_empty() {
        Vec::new()
    } else {
        embed_chunks(embedder, &chunks).await?
    };

    Ok(PreparedDocument {
        source: document.source.clone(),
        chunks,
        embeddings,
    })
}
