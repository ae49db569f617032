use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A contiguous slice of one document's text, the unit of embedding and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub source: String,
    pub sequence_index: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Squared Euclidean distance to the query embedding.
    pub distance: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceReference {
    pub source: String,
    pub sequence_index: u64,
    pub distance: f32,
    pub preview: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub query: String,
    pub answer: String,
    pub sources: Vec<SourceReference>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestionReport {
    pub source: String,
    pub chunks_added: usize,
    pub failed: bool,
    pub error: Option<String>,
}

impl IngestionReport {
    pub fn succeeded(source: impl Into<String>, chunks_added: usize) -> Self {
        Self {
            source: source.into(),
            chunks_added,
            failed: false,
            error: None,
        }
    }

    pub fn failed(source: impl Into<String>, error: impl ToString) -> Self {
        Self {
            source: source.into(),
            chunks_added: 0,
            failed: true,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 500,
            temperature: 0.3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RagOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub default_top_k: usize,
    pub generation: GenerationParams,
    pub generation_timeout: Duration,
    pub fallback_preview_chars: usize,
    pub source_preview_chars: usize,
}

impl Default for RagOptions {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            default_top_k: 3,
            generation: GenerationParams::default(),
            generation_timeout: Duration::from_secs(30),
            fallback_preview_chars: 300,
            source_preview_chars: 200,
        }
    }
}

/// First `limit` characters of `text`, with `...` appended only when something was cut.
pub fn preview(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_offset, _)) => format!("{}...", &text[..byte_offset]),
        None => text.to_string(),
    }
}
