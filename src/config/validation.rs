//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Detect duplicate service names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::HeaderName;
use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("service at position {0} has an empty name")]
    EmptyServiceName(usize),

    #[error("duplicate service name '{0}'")]
    DuplicateService(String),

    #[error("service '{name}' has invalid url '{url}': {reason}")]
    ServiceUrl {
        name: String,
        url: String,
        reason: String,
    },

    #[error("health check timeout must be greater than zero")]
    ZeroProbeTimeout,

    #[error("health check path '{0}' must start with '/'")]
    HealthPath(String),

    #[error("request timeout must be greater than zero")]
    ZeroRequestTimeout,

    #[error("token ttl must be greater than zero")]
    ZeroTokenTtl,

    #[error("invalid correlation header name '{0}'")]
    CorrelationHeader(String),

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),
}

/// Validate a parsed configuration, collecting every problem.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    let mut seen = HashSet::new();
    for (idx, service) in config.services.iter().enumerate() {
        if service.name.trim().is_empty() {
            errors.push(ValidationError::EmptyServiceName(idx));
        } else if !seen.insert(service.name.as_str()) {
            errors.push(ValidationError::DuplicateService(service.name.clone()));
        }

        let reason = match Url::parse(&service.url) {
            Ok(url) if url.scheme() == "http" => None,
            Ok(url) => Some(format!("unsupported scheme '{}'", url.scheme())),
            Err(e) => Some(e.to_string()),
        };
        if let Some(reason) = reason {
            errors.push(ValidationError::ServiceUrl {
                name: service.name.clone(),
                url: service.url.clone(),
                reason,
            });
        }
    }

    if config.health_check.timeout_ms == 0 {
        errors.push(ValidationError::ZeroProbeTimeout);
    }
    if !config.health_check.path.starts_with('/') {
        errors.push(ValidationError::HealthPath(config.health_check.path.clone()));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }
    if config.auth.token_ttl_secs == 0 {
        errors.push(ValidationError::ZeroTokenTtl);
    }
    if HeaderName::from_bytes(config.observability.correlation_header.as_bytes()).is_err() {
        errors.push(ValidationError::CorrelationHeader(
            config.observability.correlation_header.clone(),
        ));
    }

    if config.observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
