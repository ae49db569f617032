use crate::error::EmbeddingError;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Text to fixed-length vector. The output dimension never changes for a given embedder.
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Deterministic local embedder: hashes lowercase character n-grams into buckets and
/// L2-normalises the result.
#[derive(Debug, Clone, Copy)]
pub struct HashingEmbedder {
    pub dimensions: usize,
    pub ngram: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            ngram: 3,
        }
    }
}

impl HashingEmbedder {
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions,
            ..Self::default()
        }
    }

    fn bucket(&self, gram: &[char]) -> usize {
        let mut hash = FNV_OFFSET;
        let mut buffer = [0u8; 4];
        for ch in gram {
            for byte in ch.encode_utf8(&mut buffer).bytes() {
                hash ^= u64::from(byte);
                hash = hash.wrapping_mul(FNV_PRIME);
            }
        }
        (hash % self.dimensions as u64) as usize
    }
}

impl Embedder for HashingEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if self.dimensions == 0 {
            return Err(EmbeddingError::Backend(
                "embedder configured with zero dimensions".to_string(),
            ));
        }

        let mut vector = vec![0f32; self.dimensions];
        let chars: Vec<char> = text.to_lowercase().chars().collect();
        if chars.is_empty() {
            return Ok(vector);
        }

        let width = self.ngram.clamp(1, chars.len());
        for gram in chars.windows(width) {
            vector[self.bucket(gram)] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::{Embedder, HashingEmbedder};

    #[test]
    fn embedder_is_deterministic() {
        let embedder = HashingEmbedder::default();
        let first = embedder.embed("Hydraulic pressure and flow").unwrap();
        let second = embedder.embed("Hydraulic pressure and flow").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn embedder_outputs_configured_length() {
        let embedder = HashingEmbedder::with_dimensions(32);
        assert_eq!(embedder.embed("abc").unwrap().len(), 32);
        assert_eq!(embedder.embed("").unwrap().len(), 32);
        assert_eq!(embedder.embed("a").unwrap().len(), 32);
    }

    #[test]
    fn embed_many_preserves_order() {
        let embedder = HashingEmbedder::with_dimensions(64);
        let texts = vec!["pump".to_string(), "valve".to_string()];
        let vectors = embedder.embed_many(&texts).unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], embedder.embed("pump").unwrap());
        assert_eq!(vectors[1], embedder.embed("valve").unwrap());
    }

    #[test]
    fn zero_dimensions_is_an_error() {
        let embedder = HashingEmbedder::with_dimensions(0);
        assert!(embedder.embed("abc").is_err());
    }
}
