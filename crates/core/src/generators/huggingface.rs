use super::non_empty_answer;
use crate::error::GenerationError;
use crate::models::GenerationParams;
use crate::traits::Generator;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_HUGGINGFACE_ENDPOINT: &str = "https://api-inference.huggingface.co/";
pub const DEFAULT_HUGGINGFACE_MODEL: &str = "mistralai/Mistral-7B-Instruct-v0.2";

#[derive(Debug, Serialize)]
struct TextGenerationRequest<'a> {
    inputs: &'a str,
    parameters: TextGenerationParameters,
}

#[derive(Debug, Serialize)]
struct TextGenerationParameters {
    max_new_tokens: u32,
    temperature: f32,
    return_full_text: bool,
}

/// The inference API answers with a list of generations, a single object, or an error object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TextGenerationResponse {
    Many(Vec<Generated>),
    Failure { error: String },
    One(Generated),
}

#[derive(Debug, Deserialize)]
struct Generated {
    generated_text: Option<String>,
}

pub struct HuggingFaceGenerator {
    client: Client,
    model_url: Url,
    api_key: String,
}

impl HuggingFaceGenerator {
    pub fn new(api_key: impl Into<String>, model: &str) -> Result<Self, GenerationError> {
        Self::with_endpoint(DEFAULT_HUGGINGFACE_ENDPOINT, api_key, model)
    }

    pub fn with_endpoint(
        endpoint: &str,
        api_key: impl Into<String>,
        model: &str,
    ) -> Result<Self, GenerationError> {
        let model_url = Url::parse(endpoint)?.join(&format!("models/{model}"))?;
        Ok(Self {
            client: Client::new(),
            model_url,
            api_key: api_key.into(),
        })
    }

    pub fn model_url(&self) -> &Url {
        &self.model_url
    }
}

#[async_trait]
impl Generator for HuggingFaceGenerator {
    fn name(&self) -> &str {
        "huggingface"
    }

    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, GenerationError> {
        let request = TextGenerationRequest {
            inputs: prompt,
            parameters: TextGenerationParameters {
                max_new_tokens: params.max_tokens,
                temperature: params.temperature,
                return_full_text: false,
            },
        };

        let response = self
            .client
            .post(self.model_url.clone())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GenerationError::BackendResponse {
                backend: self.name().to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: TextGenerationResponse = response.json().await?;
        answer_from_generation(parsed)
    }
}

fn answer_from_generation(response: TextGenerationResponse) -> Result<String, GenerationError> {
    let text = match response {
        TextGenerationResponse::Many(items) => {
            items.into_iter().next().and_then(|item| item.generated_text)
        }
        TextGenerationResponse::One(item) => item.generated_text,
        TextGenerationResponse::Failure { error } => {
            return Err(GenerationError::BackendResponse {
                backend: "huggingface".to_string(),
                details: error,
            })
        }
    };
    non_empty_answer("huggingface", text)
}
