//! Multimodal LLM clients.
//!
//! [`LlmClient`] is the seam the card capabilities are written against.
//! Three backends are provided:
//!
//! - [`GeminiClient`]: Google Generative Language API (default)
//! - [`AnthropicClient`]: Anthropic Messages API
//! - [`OllamaClient`]: local Ollama server, no API key

mod anthropic;
mod client;
mod config;
mod gemini;
mod ollama;

pub use anthropic::AnthropicClient;
pub use client::{
    extract_json, CompletionRequest, CompletionResponse, ImageAttachment, LlmClient, LlmError,
    LlmUsage,
};
pub use config::{LlmConfig, LlmProvider};
pub use gemini::GeminiClient;
pub use ollama::OllamaClient;
