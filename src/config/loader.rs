//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable that replaces `auth.jwt_secret`.
pub const JWT_SECRET_ENV: &str = "GATEWAY_JWT_SECRET";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content, |key| std::env::var(key).ok())
}

/// Build configuration from defaults and the process environment alone.
///
/// Used when no config file is given; overrides and validation still apply.
pub fn load_from_env() -> Result<GatewayConfig, ConfigError> {
    parse_config("", |key| std::env::var(key).ok())
}

/// Parse, apply overrides from `env`, and validate configuration text.
pub fn parse_config<F>(content: &str, env: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config: GatewayConfig = toml::from_str(content)?;

    if let Some(secret) = env(JWT_SECRET_ENV).filter(|s| !s.is_empty()) {
        config.auth.jwt_secret = secret;
    }

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
