use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::lifecycle::LifecycleConfig;
use crate::llm::LlmConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub llm: LlmConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub submissions: SubmissionsConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Which submission store to use.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    /// Process-local map; contents are lost on restart.
    Memory,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("pokevalue.db")
}

/// Limits on incoming submissions and how long finished ones are kept.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubmissionsConfig {
    /// Maximum length of the image data URI in bytes.
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
    #[serde(default = "default_accepted_mime_types")]
    pub accepted_mime_types: Vec<String>,
    /// Finished submissions older than this are purged. Unset keeps them forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_hours: Option<u64>,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for SubmissionsConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: default_max_image_bytes(),
            accepted_mime_types: default_accepted_mime_types(),
            retention_hours: None,
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_max_image_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_accepted_mime_types() -> Vec<String> {
    [
        "image/jpeg",
        "image/png",
        "image/webp",
        "image/gif",
        "image/heic",
        "image/heif",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_sweep_interval_secs() -> u64 {
    3600
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub llm: SanitizedLlmConfig,
    pub submissions: SubmissionsConfig,
    pub lifecycle: LifecycleConfig,
}

/// Sanitized LLM config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedLlmConfig {
    pub provider: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    pub api_key_configured: bool,
    pub timeout_secs: u32,
    pub max_tokens: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            llm: SanitizedLlmConfig {
                provider: config.llm.provider.as_str().to_string(),
                model: config.llm.model.clone(),
                api_base: config.llm.api_base.clone(),
                api_key_configured: config.llm.api_key.is_some(),
                timeout_secs: config.llm.timeout_secs,
                max_tokens: config.llm.max_tokens,
            },
            submissions: config.submissions.clone(),
            lifecycle: config.lifecycle.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    #[test]
    fn test_defaults_applied() {
        let config = load_config_from_str(
            r#"
[llm]
provider = "ollama"
model = "llava"
"#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.backend, StoreBackend::Sqlite);
        assert_eq!(config.database.path, PathBuf::from("pokevalue.db"));
        assert_eq!(config.submissions.max_image_bytes, 10 * 1024 * 1024);
        assert!(config
            .submissions
            .accepted_mime_types
            .contains(&"image/heic".to_string()));
        assert!(config.submissions.retention_hours.is_none());
        assert_eq!(config.lifecycle.identification_timeout_secs, 60);
        assert_eq!(config.lifecycle.valuation_timeout_secs, 90);
    }

    #[test]
    fn test_memory_backend() {
        let config = load_config_from_str(
            r#"
[llm]
provider = "ollama"
model = "llava"

[database]
backend = "memory"
"#,
        )
        .unwrap();
        assert_eq!(config.database.backend, StoreBackend::Memory);
    }

    #[test]
    fn test_sanitized_config_hides_api_key() {
        let config = load_config_from_str(
            r#"
[llm]
provider = "gemini"
model = "gemini-1.5-flash-latest"
api_key = "super-secret"
"#,
        )
        .unwrap();

        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.llm.api_key_configured);
        assert_eq!(sanitized.llm.provider, "gemini");

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("super-secret"));
    }
}
