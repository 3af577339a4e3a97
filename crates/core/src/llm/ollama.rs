//! Ollama API client for local multimodal models (e.g. llava).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::client::{
    observe, CompletionRequest, CompletionResponse, LlmClient, LlmError, LlmUsage,
};

/// Ollama API client for local LLM inference.
///
/// Connects to a local Ollama server (default: http://localhost:11434).
/// No API key required.
pub struct OllamaClient {
    client: reqwest::Client,
    model: String,
    api_base: String,
    timeout: Duration,
}

impl OllamaClient {
    /// Create a new Ollama client with the specified model.
    ///
    /// The model must accept images for identification to work
    /// (e.g., "llava", "llama3.2-vision").
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            model: model.into(),
            api_base: "http://localhost:11434".to_string(),
            timeout: Duration::from_secs(45),
        }
    }

    /// Set a custom API base URL.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_request(&self, request: CompletionRequest) -> OllamaRequest {
        OllamaRequest {
            model: self.model.clone(),
            prompt: request.prompt,
            system: request.system,
            images: request.images.into_iter().map(|i| i.data).collect(),
            format: request.json_output.then(|| "json".to_string()),
            stream: false,
            options: Some(OllamaOptions {
                // Ollama needs an explicit 0 for deterministic output
                temperature: Some(request.temperature),
                num_predict: Some(request.max_tokens),
            }),
        }
    }

    async fn send(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let ollama_request = self.build_request(request);

        let response = self
            .client
            .post(format!("{}/api/generate", self.api_base))
            .header("content-type", "application/json")
            .timeout(self.timeout)
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(e, self.timeout))?;

        let status = response.status().as_u16();

        if status != 200 {
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<OllamaErrorResponse>(&error_text)
                .map(|e| e.error)
                .unwrap_or(error_text);
            return Err(LlmError::Api { status, message });
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Json(e.to_string()))?;

        if ollama_response.response.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        Ok(CompletionResponse {
            text: ollama_response.response,
            usage: LlmUsage {
                input_tokens: ollama_response.prompt_eval_count,
                output_tokens: ollama_response.eval_count,
            },
            model: ollama_response.model,
        })
    }
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    model: String,
    response: String,
    /// Number of tokens in the response
    #[serde(default)]
    eval_count: u32,
    /// Number of tokens in the prompt
    #[serde(default)]
    prompt_eval_count: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaErrorResponse {
    error: String,
}

#[async_trait]
impl LlmClient for OllamaClient {
    fn provider(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        observe(self.provider(), self.send(request).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ImageAttachment;

    #[test]
    fn test_ollama_client_creation() {
        let client = OllamaClient::new("llava");
        assert_eq!(client.provider(), "ollama");
        assert_eq!(client.model(), "llava");
    }

    #[test]
    fn test_ollama_client_custom_base() {
        let client = OllamaClient::new("llava").with_api_base("http://gpu-box:11434");
        assert_eq!(client.api_base, "http://gpu-box:11434");
    }

    #[test]
    fn test_ollama_request_serialization() {
        let client = OllamaClient::new("llava");
        let request = CompletionRequest::new("Identify")
            .with_system("Be precise")
            .with_image(ImageAttachment::new("image/jpeg", "/9j/4AAQ"))
            .with_json_output();

        let json = serde_json::to_string(&client.build_request(request)).unwrap();
        assert!(json.contains("\"model\":\"llava\""));
        assert!(json.contains("\"stream\":false"));
        assert!(json.contains("\"images\":[\"/9j/4AAQ\"]"));
        assert!(json.contains("\"format\":\"json\""));
        assert!(json.contains("\"temperature\":0.0"));
    }

    #[test]
    fn test_ollama_text_request_omits_images() {
        let client = OllamaClient::new("llava");
        let json = serde_json::to_string(&client.build_request(CompletionRequest::new("hi"))).unwrap();
        assert!(!json.contains("images"));
        assert!(!json.contains("format"));
    }
}
