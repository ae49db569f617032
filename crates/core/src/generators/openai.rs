use super::non_empty_answer;
use crate::error::GenerationError;
use crate::models::GenerationParams;
use crate::traits::Generator;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";

const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions based on provided documents. Be concise and accurate.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client.
pub struct OpenAiGenerator {
    client: Client,
    completions_url: Url,
    api_key: String,
    model: String,
}

impl OpenAiGenerator {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, GenerationError> {
        Self::with_endpoint(DEFAULT_OPENAI_ENDPOINT, api_key, model)
    }

    pub fn with_endpoint(
        endpoint: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, GenerationError> {
        let completions_url = Url::parse(endpoint)?.join("v1/chat/completions")?;
        Ok(Self {
            client: Client::new(),
            completions_url,
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    pub fn completions_url(&self) -> &Url {
        &self.completions_url
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, GenerationError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        let response = self
            .client
            .post(self.completions_url.clone())
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

        let parsed: ChatResponse = response.json().await?;
        answer_from_chat(parsed)
    }
}

fn answer_from_chat(response: ChatResponse) -> Result<String, GenerationError> {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content);
    non_empty_answer("openai", content)
}
