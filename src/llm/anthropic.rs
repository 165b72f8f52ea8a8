use crate::config::ImportConfig;
use crate::llm::{LlmError, LlmProvider};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::{json, Value};

/// Status code Anthropic uses for "overloaded_error"
const OVERLOADED_STATUS: u16 = 529;

pub struct AnthropicProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    version: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider from configuration
    ///
    /// A missing API key is not an error here; it is reported by
    /// [`LlmProvider::complete`] so the extraction stage can surface it.
    pub fn new(config: &ImportConfig) -> Self {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        AnthropicProvider {
            client: builder.build().unwrap_or_else(|_| Client::new()),
            api_key: config.anthropic_api_key(),
            base_url: config.anthropic.base_url.trim_end_matches('/').to_string(),
            version: config.anthropic.version.clone(),
            model: config.anthropic.model.clone(),
            max_tokens: config.anthropic.max_tokens,
        }
    }

    #[doc(hidden)]
    pub fn with_base_url(api_key: Option<String>, base_url: String, model: String) -> Self {
        AnthropicProvider {
            client: Client::new(),
            api_key,
            base_url,
            version: "2023-06-01".to_string(),
            model,
            max_tokens: 4000,
        }
    }

    /// Send a tiny request to verify the key and model are accepted
    pub async fn check_connection(&self) -> Result<(), LlmError> {
        self.send("Test connection. Respond with 'ok'.", 10)
            .await
            .map(|_| ())
    }

    async fn send(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", &self.version)
            .json(&json!({
                "model": self.model,
                "max_tokens": max_tokens,
                "messages": [
                    {
                        "role": "user",
                        "content": prompt
                    }
                ]
            }))
            .send()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let status = response.status();
        debug!("Claude API response status: {}", status);

        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        if status.as_u16() == OVERLOADED_STATUS {
            debug!("Claude API overloaded: {}", body);
            return Err(LlmError::Overloaded {
                status: OVERLOADED_STATUS,
            });
        }

        if !status.is_success() {
            return Err(classify_error(status.as_u16(), &body));
        }

        let response_body: Value =
            serde_json::from_str(&body).map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        extract_text(&response_body)
    }
}

/// Map a non-success body to an error; an "overloaded_error" type is
/// treated as overloaded whatever the status code
fn classify_error(status: u16, body: &str) -> LlmError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));

    let error_type = error.and_then(|e| e["type"].as_str()).unwrap_or("");
    if error_type == "overloaded_error" {
        return LlmError::Overloaded { status };
    }

    let message = error
        .and_then(|e| e["message"].as_str())
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string());

    LlmError::Api { status, message }
}

fn extract_text(response_body: &Value) -> Result<String, LlmError> {
    response_body["content"]
        .as_array()
        .and_then(|blocks| blocks.iter().find_map(|block| block["text"].as_str()))
        .map(str::to_string)
        .ok_or_else(|| LlmError::InvalidResponse("Invalid response from Claude API".to_string()))
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn provider_name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.send(prompt, self.max_tokens).await
    }
}
