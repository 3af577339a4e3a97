//! LLM client trait and request/response types.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;

use crate::metrics;

/// Error type for LLM operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Model returned no content")]
    EmptyResponse,

    #[error("Not configured: {0}")]
    NotConfigured(String),
}

impl LlmError {
    /// Map a transport error, keeping timeouts distinguishable.
    pub(crate) fn from_reqwest(error: reqwest::Error, timeout: Duration) -> Self {
        if error.is_timeout() {
            LlmError::Timeout(timeout)
        } else {
            LlmError::Http(error.to_string())
        }
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// An inline image sent alongside the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub mime_type: String,
    /// Base64 payload without the data URI header.
    pub data: String,
}

impl ImageAttachment {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }
}

/// Request for a completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System prompt (instructions for the model)
    pub system: Option<String>,
    /// User message
    pub prompt: String,
    /// Images attached to the user message
    pub images: Vec<ImageAttachment>,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Temperature (0.0 = deterministic, 1.0 = creative)
    pub temperature: f32,
    /// Ask the provider for a JSON-only response where supported
    pub json_output: bool,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            images: Vec::new(),
            max_tokens: 1024,
            temperature: 0.0,
            json_output: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_image(mut self, image: ImageAttachment) -> Self {
        self.images.push(image);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_json_output(mut self) -> Self {
        self.json_output = true;
        self
    }
}

/// Response from a completion.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// The generated text
    pub text: String,
    /// Token usage
    pub usage: LlmUsage,
    /// Model used
    pub model: String,
}

/// Trait for LLM clients.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Provider name (e.g., "gemini", "anthropic", "ollama")
    fn provider(&self) -> &str;

    /// Model name (e.g., "gemini-1.5-flash-latest")
    fn model(&self) -> &str;

    /// Send a completion request and get a text response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Send a completion request and parse the response as JSON.
    ///
    /// Tolerates markdown fences and prose around the JSON value.
    async fn complete_json<T: DeserializeOwned>(
        &self,
        request: CompletionRequest,
    ) -> Result<(T, LlmUsage), LlmError> {
        let response = self.complete(request).await?;
        let json_str = extract_json(&response.text).ok_or(LlmError::EmptyResponse)?;
        let parsed: T = serde_json::from_str(json_str)
            .map_err(|e| LlmError::Json(format!("{}: {}", e, response.text)))?;
        Ok((parsed, response.usage))
    }
}

/// Locate the JSON value inside a model response.
///
/// Returns the span from the first `{` or `[` to the matching last closer,
/// or the trimmed text itself for bare scalars such as `null`.
/// Returns `None` for blank responses.
pub fn extract_json(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let start = match trimmed.find(['{', '[']) {
        Some(start) => start,
        None => return Some(trimmed),
    };
    let closer = if trimmed[start..].starts_with('{') { '}' } else { ']' };

    match trimmed.rfind(closer) {
        Some(end) if end > start => Some(&trimmed[start..=end]),
        _ => Some(trimmed),
    }
}

/// Record request and token metrics for a finished completion.
pub(crate) fn observe(
    provider: &str,
    result: Result<CompletionResponse, LlmError>,
) -> Result<CompletionResponse, LlmError> {
    match &result {
        Ok(response) => {
            metrics::LLM_REQUESTS
                .with_label_values(&[provider, "success"])
                .inc();
            metrics::record_llm_usage(
                provider,
                response.usage.input_tokens,
                response.usage.output_tokens,
            );
        }
        Err(e) => {
            metrics::LLM_REQUESTS
                .with_label_values(&[provider, "error"])
                .inc();
            tracing::warn!(provider, error = %e, "LLM request failed");
        }
    }
    result
}
