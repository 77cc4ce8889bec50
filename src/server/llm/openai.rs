//! OpenAI chat-completions backend.

use super::{CompletionBackend, CompletionError};
use crate::config::CompletionSettings;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// OpenAI backend for the chat-completions API.
pub struct OpenAIBackend {
    model: String,
    temperature: f32,
    max_tokens: u32,
    api_url: String,
    api_key: String,
    client: Client,
}

impl OpenAIBackend {
    /// Create a backend that authenticates every request with `api_key`.
    pub fn new(api_key: String, settings: &CompletionSettings) -> Result<Self, CompletionError> {
        let client = Client::builder().build()?;

        Ok(Self {
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            api_url: settings.api_url.clone(),
            api_key,
            client,
        })
    }

    fn build_request(&self, system_prompt: &str, user_message: &str) -> Result<reqwest::Request, CompletionError> {
        let body = OpenAIRequest {
            model: &self.model,
            messages: [
                OpenAIMessage {
                    role: "system",
                    content: system_prompt,
                },
                OpenAIMessage {
                    role: "user",
                    content: user_message,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let request = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .build()?;
        Ok(request)
    }
}

#[async_trait]
impl CompletionBackend for OpenAIBackend {
    async fn complete(&self, system_prompt: &str, user_message: &str) -> Result<String, CompletionError> {
        let request = self.build_request(system_prompt, user_message)?;
        let response = self.client.execute(request).await?;

        if !response.status().is_success() {
            let status = response.status();
            let body: Result<OpenAIError, _> = response.json().await;
            let message = body
                .map(|e| e.error.message)
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CompletionError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Decode(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .ok_or(CompletionError::EmptyResponse)
    }

    fn name(&self) -> &'static str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: [OpenAIMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessageResponse,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessageResponse {
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    error: OpenAIErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorDetail {
    message: String,
}
