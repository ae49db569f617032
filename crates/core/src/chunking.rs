use crate::error::ChunkingError;
use crate::models::RagOptions;

/// Sentence terminators, checked in priority order. The first one found in the window wins.
pub const SENTENCE_DELIMITERS: [&str; 6] = [". ", ".\n", "! ", "!\n", "? ", "?\n"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub target_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_size: 500,
            overlap: 50,
        }
    }
}

impl From<&RagOptions> for ChunkingConfig {
    fn from(value: &RagOptions) -> Self {
        Self {
            target_size: value.chunk_size,
            overlap: value.chunk_overlap,
        }
    }
}

impl ChunkingConfig {
    pub fn new(target_size: usize, overlap: usize) -> Result<Self, ChunkingError> {
        let config = Self {
            target_size,
            overlap,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ChunkingError> {
        if self.target_size == 0 {
            return Err(ChunkingError::InvalidConfig(
                "target size must be greater than zero".to_string(),
            ));
        }
        if self.overlap >= self.target_size {
            return Err(ChunkingError::InvalidConfig(format!(
                "overlap {} must be smaller than target size {}",
                self.overlap, self.target_size
            )));
        }
        Ok(())
    }

    /// Upper bound on loop iterations for a text of `len` characters.
    ///
    /// Within any three consecutive steps the cursor moves forward by at least
    /// `target_size - overlap`, so hitting this bound means the loop itself is broken.
    fn step_bound(&self, len: usize) -> usize {
        let stride = self.target_size.saturating_sub(self.overlap).max(1);
        3 * (len.div_ceil(stride) + 1)
    }
}

/// One emitted chunk. `start..end` is the untrimmed character window it was cut from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Splits `text` into overlapping, sentence-aware chunks.
///
/// Offsets are counted in characters. Whitespace-only windows are dropped.
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Result<Vec<TextChunk>, ChunkingError> {
    config.validate()?;
    if text.is_empty() {
        return Ok(Vec::new());
    }

    // Byte offset of every character boundary, including the end of the text.
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = offsets.len() - 1;
    let bound = config.step_bound(total);

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut steps = 0usize;

    while start < total {
        steps += 1;
        if steps > bound {
            return Err(ChunkingError::Overrun { steps, bound });
        }

        let mut end = start + config.target_size;
        if end < total {
            let window = &text[offsets[start]..offsets[end]];
            if let Some(cut) = find_boundary(window) {
                end = start + window[..cut].chars().count();
            }
        } else {
            end = total;
        }

        let piece = text[offsets[start]..offsets[end]].trim();
        if !piece.is_empty() {
            chunks.push(TextChunk {
                text: piece.to_string(),
                start,
                end,
            });
        }

        if end >= total {
            break;
        }

        let next = end.saturating_sub(config.overlap);
        // A boundary close to `start` would move the cursor backwards; drop the overlap instead.
        start = if next > start { next } else { end };
    }

    Ok(chunks)
}

/// Plain-text form of [`chunk_text`].
pub fn chunk(text: &str, target_size: usize, overlap: usize) -> Result<Vec<String>, ChunkingError> {
    let config = ChunkingConfig::new(target_size, overlap)?;
    Ok(chunk_text(text, &config)?
        .into_iter()
        .map(|piece| piece.text)
        .collect())
}

/// Byte offset just past the last sentence terminator in `window`, else just past the last space.
fn find_boundary(window: &str) -> Option<usize> {
    SENTENCE_DELIMITERS
        .iter()
        .find_map(|delimiter| {
            window
                .rfind(delimiter)
                .map(|position| position + delimiter.len())
        })
        .or_else(|| window.rfind(' ').map(|position| position + 1))
}
