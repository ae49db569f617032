use crate::error::GenerationError;
use crate::models::GenerationParams;
use async_trait::async_trait;

/// Prompt to text. Implementations may fail; callers decide how to degrade.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Short backend label used in logs and errors.
    fn name(&self) -> &str;

    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, GenerationError>;
}
