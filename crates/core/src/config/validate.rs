use super::{types::Config, ConfigError};

/// Upper bound for `submissions.retention_hours` (100 years).
pub const MAX_RETENTION_HOURS: u64 = 100 * 365 * 24;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Image size limit is positive and the MIME list is non-empty image types
/// - Collaborator and LLM request timeouts are positive
/// - Retention hours and sweep interval are in range when retention is on
/// - Hosted LLM providers have an API key
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.submissions.max_image_bytes == 0 {
        return Err(ConfigError::ValidationError(
            "submissions.max_image_bytes cannot be 0".to_string(),
        ));
    }

    if config.submissions.accepted_mime_types.is_empty() {
        return Err(ConfigError::ValidationError(
            "submissions.accepted_mime_types cannot be empty".to_string(),
        ));
    }

    if let Some(bad) = config
        .submissions
        .accepted_mime_types
        .iter()
        .find(|m| !m.to_ascii_lowercase().starts_with("image/"))
    {
        return Err(ConfigError::ValidationError(format!(
            "submissions.accepted_mime_types contains non-image type: {}",
            bad
        )));
    }

    if config.lifecycle.identification_timeout_secs == 0
        || config.lifecycle.valuation_timeout_secs == 0
    {
        return Err(ConfigError::ValidationError(
            "lifecycle timeouts must be greater than 0".to_string(),
        ));
    }

    if config.llm.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "llm.timeout_secs must be greater than 0".to_string(),
        ));
    }

    if let Some(hours) = config.submissions.retention_hours {
        if hours == 0 {
            return Err(ConfigError::ValidationError(
                "submissions.retention_hours must be greater than 0 when set".to_string(),
            ));
        }
        if hours > MAX_RETENTION_HOURS {
            return Err(ConfigError::ValidationError(format!(
                "submissions.retention_hours cannot exceed {}",
                MAX_RETENTION_HOURS
            )));
        }
        if config.submissions.sweep_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "submissions.sweep_interval_secs must be greater than 0 when retention is enabled"
                    .to_string(),
            ));
        }
    }

    if config.llm.model.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "llm.model cannot be empty".to_string(),
        ));
    }

    if config.llm.provider.requires_api_key()
        && config.llm.api_key.as_deref().is_none_or(|k| k.trim().is_empty())
    {
        return Err(ConfigError::ValidationError(format!(
            "llm.api_key is required for provider {:?} (or set {})",
            config.llm.provider,
            config.llm.provider.api_key_env_var().unwrap_or_default()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, ServerConfig, SubmissionsConfig};
    use crate::lifecycle::LifecycleConfig;
    use crate::llm::{LlmConfig, LlmProvider};

    fn valid_config() -> Config {
        Config {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            llm: LlmConfig::new(LlmProvider::Ollama, "llava"),
            submissions: SubmissionsConfig::default(),
            lifecycle: LifecycleConfig::default(),
        }
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = valid_config();
        config.server.port = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_zero_image_size_fails() {
        let mut config = valid_config();
        config.submissions.max_image_bytes = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_non_image_mime_fails() {
        let mut config = valid_config();
        config.submissions.accepted_mime_types = vec!["application/pdf".to_string()];
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("application/pdf"));
    }

    #[test]
    fn test_validate_zero_timeout_fails() {
        let mut config = valid_config();
        config.lifecycle.valuation_timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_retention_fails() {
        let mut config = valid_config();
        config.submissions.retention_hours = Some(0);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_oversized_retention_fails() {
        let mut config = valid_config();
        config.submissions.retention_hours = Some(i64::MAX as u64);
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("retention_hours"));

        config.submissions.retention_hours = Some(MAX_RETENTION_HOURS);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_zero_sweep_interval_fails() {
        let mut config = valid_config();
        config.submissions.sweep_interval_secs = 0;
        // Unused while retention is off.
        assert!(validate_config(&config).is_ok());

        config.submissions.retention_hours = Some(1);
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("sweep_interval_secs"));
    }

    #[test]
    fn test_validate_zero_llm_timeout_fails() {
        let mut config = valid_config();
        config.llm.timeout_secs = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("llm.timeout_secs"));
    }

    #[test]
    fn test_validate_hosted_provider_requires_key() {
        let mut config = valid_config();
        config.llm = LlmConfig::new(LlmProvider::Gemini, "gemini-1.5-flash-latest");
        assert!(validate_config(&config).is_err());

        config.llm.api_key = Some("key".to_string());
        assert!(validate_config(&config).is_ok());
    }
}
