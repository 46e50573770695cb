use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::errors::ComposerError;
use crate::llm_client::DEFAULT_MODEL;
use crate::protocol::config::ProtocolConfig;

/// Runtime configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub llm_model: String,
    pub llm_max_tokens: u32,
    pub llm_timeout_secs: u64,
    pub protocol_config_path: Option<PathBuf>,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            llm_model: std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            llm_max_tokens: parse_env_or("LLM_MAX_TOKENS", 4500)?,
            llm_timeout_secs: parse_env_or("LLM_TIMEOUT_SECS", 30)?,
            protocol_config_path: std::env::var("PROTOCOL_CONFIG_PATH").ok().map(PathBuf::from),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Protocol rules: the configured JSON file or defaults, then env overrides.
    pub fn protocol(&self) -> Result<ProtocolConfig, ComposerError> {
        ProtocolConfig::load(self.protocol_config_path.as_deref()).map_err(ComposerError::Config)
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{value}'")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_numeric_var_uses_default() {
        let value: u32 = parse_env_or("COMPOSER_TEST_UNSET_VAR", 4500).unwrap();
        assert_eq!(value, 4500);
    }

    #[test]
    fn test_bad_protocol_file_is_a_config_error() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let config = Config {
            anthropic_api_key: "test-key".to_string(),
            llm_model: DEFAULT_MODEL.to_string(),
            llm_max_tokens: 4500,
            llm_timeout_secs: 30,
            protocol_config_path: Some(file.path().to_path_buf()),
            rust_log: "info".to_string(),
        };

        assert!(matches!(config.protocol(), Err(ComposerError::Config(_))));
    }

    #[test]
    fn test_missing_required_var_names_the_key() {
        let err = require_env("COMPOSER_TEST_MISSING_KEY").unwrap_err();
        assert!(err.to_string().contains("COMPOSER_TEST_MISSING_KEY"));
    }
}
