//! Grounded answer composition with an extractive fallback.
//!
//! The backend is picked once when the synthesizer is built. Generation failures never reach
//! the caller: they are logged and replaced by a deterministic quote of the retrieved chunks.

use crate::error::GenerationError;
use crate::models::{preview, GenerationParams, RagOptions, ScoredChunk};
use crate::traits::Generator;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const NO_INFORMATION_MESSAGE: &str =
    "I couldn't find any relevant information in the knowledge base to answer your question.";

const FALLBACK_INTRO: &str = "Based on the available documents:\n\n";

#[derive(Clone)]
pub enum GenerationBackend {
    NoBackend,
    Configured(Arc<dyn Generator>),
}

impl GenerationBackend {
    pub fn configured(generator: impl Generator + 'static) -> Self {
        Self::Configured(Arc::new(generator))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::NoBackend => "none",
            Self::Configured(generator) => generator.name(),
        }
    }
}

impl fmt::Debug for GenerationBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GenerationBackend").field(&self.name()).finish()
    }
}

#[derive(Debug, Clone)]
pub struct AnswerSynthesizer {
    backend: GenerationBackend,
    params: GenerationParams,
    timeout: Duration,
    fallback_preview_chars: usize,
}

impl AnswerSynthesizer {
    pub fn new(backend: GenerationBackend, options: &RagOptions) -> Self {
        Self {
            backend,
            params: options.generation,
            timeout: options.generation_timeout,
            fallback_preview_chars: options.fallback_preview_chars,
        }
    }

    pub fn backend(&self) -> &GenerationBackend {
        &self.backend
    }

    /// Always produces an answer; see the module docs for the degradation rules.
    pub async fn compose(&self, query: &str, context: &[ScoredChunk]) -> String {
        if context.is_empty() {
            return NO_INFORMATION_MESSAGE.to_string();
        }

        let generator = match &self.backend {
            GenerationBackend::NoBackend => return self.fallback(context),
            GenerationBackend::Configured(generator) => generator,
        };

        let prompt = build_prompt(query, context);
        match self.generate_bounded(generator.as_ref(), &prompt).await {
            Ok(answer) => {
                info!(backend = generator.name(), "generated grounded answer");
                answer
            }
            Err(error) => {
                warn!(
                    backend = generator.name(),
                    %error,
                    "generation failed, using extractive fallback"
                );
                self.fallback(context)
            }
        }
    }

    /// Extractive answer quoting each chunk in ranked order.
    pub fn fallback(&self, context: &[ScoredChunk]) -> String {
        let mut answer = String::from(FALLBACK_INTRO);
        for (number, item) in context.iter().enumerate() {
            answer.push_str(&format!(
                "{}. From {}:\n{}\n\n",
                number + 1,
                item.chunk.source,
                preview(&item.chunk.text, self.fallback_preview_chars)
            ));
        }
        answer
    }

    async fn generate_bounded(
        &self,
        generator: &dyn Generator,
        prompt: &str,
    ) -> Result<String, GenerationError> {
        let answer = tokio::time::timeout(self.timeout, generator.generate(prompt, &self.params))
            .await
            .map_err(|_| GenerationError::Timeout(self.timeout))??;

        if answer.trim().is_empty() {
            return Err(GenerationError::EmptyAnswer {
                backend: generator.name().to_string(),
            });
        }
        Ok(answer)
    }
}

pub fn build_prompt(query: &str, context: &[ScoredChunk]) -> String {
    let blocks = context
        .iter()
        .map(|item| {
            format!(
                "[Source: {}, Chunk {}]\n{}",
                item.chunk.source, item.chunk.sequence_index, item.chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Using the following documents from the knowledge base, answer the user's question succinctly and accurately.\n\n\
Context from documents:\n{blocks}\n\n\
User's question: {query}\n\n\
Instructions:\n\
- Provide a clear, concise answer based on the context\n\
- If the context doesn't contain enough information, say so\n\
- Cite sources by name (e.g., \"According to [source]...\")\n\
- Be factual and don't make up information\n\n\
Answer:"
    )
}
