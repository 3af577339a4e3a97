//! Build capabilities from LLM configuration.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::identifier::LlmCardIdentifier;
use super::traits::{CardIdentifier, CardValuer};
use super::valuer::LlmCardValuer;
use super::LlmCapabilityConfig;
use crate::llm::{
    AnthropicClient, GeminiClient, LlmClient, LlmConfig, LlmError, LlmProvider, OllamaClient,
};

/// The identification and valuation pair the lifecycle manager drives.
#[derive(Clone)]
pub struct CardCapabilities {
    pub identifier: Arc<dyn CardIdentifier>,
    pub valuer: Arc<dyn CardValuer>,
}

impl CardCapabilities {
    pub fn new(identifier: Arc<dyn CardIdentifier>, valuer: Arc<dyn CardValuer>) -> Self {
        Self { identifier, valuer }
    }

    /// Both capabilities backed by one shared client.
    pub fn from_llm_client<C: LlmClient + 'static>(
        client: Arc<C>,
        config: LlmCapabilityConfig,
    ) -> Self {
        Self {
            identifier: Arc::new(LlmCardIdentifier::with_config(client.clone(), config.clone())),
            valuer: Arc::new(LlmCardValuer::with_config(client, config)),
        }
    }
}

/// Create the configured provider's client and wrap it in both capabilities.
pub fn build_capabilities(config: &LlmConfig) -> Result<CardCapabilities, LlmError> {
    let timeout = Duration::from_secs(u64::from(config.timeout_secs));
    let capability_config = LlmCapabilityConfig {
        max_tokens: config.max_tokens,
        ..Default::default()
    };

    let capabilities = match config.provider {
        LlmProvider::Gemini => {
            let api_key = require_api_key(config)?;
            let mut client = GeminiClient::new(api_key, config.model.clone()).with_timeout(timeout);
            if let Some(ref api_base) = config.api_base {
                client = client.with_api_base(api_base.clone());
            }
            CardCapabilities::from_llm_client(Arc::new(client), capability_config)
        }
        LlmProvider::Anthropic => {
            let api_key = require_api_key(config)?;
            let mut client =
                AnthropicClient::new(api_key, config.model.clone()).with_timeout(timeout);
            if let Some(ref api_base) = config.api_base {
                client = client.with_api_base(api_base.clone());
            }
            CardCapabilities::from_llm_client(Arc::new(client), capability_config)
        }
        LlmProvider::Ollama => {
            let mut client = OllamaClient::new(config.model.clone()).with_timeout(timeout);
            if let Some(ref api_base) = config.api_base {
                client = client.with_api_base(api_base.clone());
            }
            CardCapabilities::from_llm_client(Arc::new(client), capability_config)
        }
    };

    info!(
        provider = config.provider.as_str(),
        model = %config.model,
        "LLM capabilities configured"
    );

    Ok(capabilities)
}

fn require_api_key(config: &LlmConfig) -> Result<String, LlmError> {
    config
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            LlmError::NotConfigured(format!(
                "provider {} requires an API key",
                config.provider.as_str()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_ollama_without_key() {
        let config = LlmConfig::new(LlmProvider::Ollama, "llava");
        let capabilities = build_capabilities(&config).unwrap();
        assert_eq!(capabilities.identifier.name(), "ollama");
        assert_eq!(capabilities.valuer.name(), "ollama");
    }

    #[test]
    fn test_build_gemini_requires_key() {
        let config = LlmConfig::new(LlmProvider::Gemini, "gemini-1.5-flash-latest");
        assert!(matches!(
            build_capabilities(&config),
            Err(LlmError::NotConfigured(_))
        ));

        let capabilities = build_capabilities(&config.with_api_key("key")).unwrap();
        assert_eq!(capabilities.identifier.name(), "gemini");
    }

    #[test]
    fn test_build_anthropic() {
        let config = LlmConfig::new(LlmProvider::Anthropic, "claude-3-5-haiku-latest")
            .with_api_key("key");
        let capabilities = build_capabilities(&config).unwrap();
        assert_eq!(capabilities.valuer.name(), "anthropic");
    }
}
