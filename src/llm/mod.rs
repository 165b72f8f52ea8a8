mod anthropic;
mod retry;

pub use anthropic::AnthropicProvider;
pub use retry::{complete_with_retry, RetryPolicy};

use async_trait::async_trait;
use thiserror::Error;

/// Errors reported by a single LLM request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("API key not configured")]
    MissingApiKey,

    /// The service is temporarily overloaded; the only retry-worthy class
    #[error("API overloaded (status {status})")]
    Overloaded { status: u16 },

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::Overloaded { .. })
    }
}

/// Unified trait for LLM text completion
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name (e.g., "anthropic")
    fn provider_name(&self) -> &str;

    /// Send one non-streaming prompt and return the text of the answer
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}
