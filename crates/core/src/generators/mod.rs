pub mod huggingface;
pub mod openai;

pub use huggingface::HuggingFaceGenerator;
pub use openai::OpenAiGenerator;

use crate::error::GenerationError;

fn non_empty_answer(backend: &str, text: Option<String>) -> Result<String, GenerationError> {
    match text.map(|value| value.trim().to_string()) {
        Some(answer) if !answer.is_empty() => Ok(answer),
        _ => Err(GenerationError::EmptyAnswer {
            backend: backend.to_string(),
        }),
    }
}
