use crate::error::IndexError;
use crate::models::Chunk;
use std::collections::BTreeSet;

/// Append-only chunk records, positionally parallel to the vector index.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeStore {
    chunks: Vec<Chunk>,
}

impl KnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_chunks(chunks: Vec<Chunk>) -> Self {
        Self { chunks }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn append(&mut self, chunks: Vec<Chunk>) {
        self.chunks.extend(chunks);
    }

    pub fn get(&self, position: usize) -> Result<&Chunk, IndexError> {
        self.chunks.get(position).ok_or(IndexError::OutOfRange {
            position,
            size: self.chunks.len(),
        })
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
    }

    /// Distinct source names across all chunks.
    pub fn sources(&self) -> BTreeSet<String> {
        self.chunks.iter().map(|chunk| chunk.source.clone()).collect()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }
}
