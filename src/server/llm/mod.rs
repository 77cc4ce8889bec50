//! Completion API backends.
//!
//! The relay talks to the completion service through the
//! [`CompletionBackend`] trait so the HTTP client can be swapped for a fake
//! in tests.

pub mod openai;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use openai::OpenAIBackend;

/// Ways a completion call can fail.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// The call did not finish before its deadline.
    #[error("completion timed out after {0:?}")]
    Timeout(Duration),
    /// The request never produced an HTTP response.
    #[error("failed to reach the completion API: {0}")]
    Http(#[from] reqwest::Error),
    /// The API answered with a non-success status.
    #[error("completion API request failed with status {status}: {message}")]
    Status { status: u16, message: String },
    /// The response body could not be decoded.
    #[error("failed to parse completion response: {0}")]
    Decode(String),
    /// The API returned no choices.
    #[error("empty response from completion API")]
    EmptyResponse,
}

impl CompletionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, CompletionError::Timeout(_))
    }
}

/// A chat-completion service.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Run one completion with a system instruction and a user turn.
    async fn complete(&self, system_prompt: &str, user_message: &str) -> Result<String, CompletionError>;

    /// Backend name, for logs.
    fn name(&self) -> &'static str;

    /// Model identifier sent with every request.
    fn model(&self) -> &str;
}
