//! Health report types and the rollup rule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health of a single backend service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Unknown,
}

/// Rolled-up health of every configured service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown,
}

/// Outcome of probing one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,
    pub response_time_ms: u64,
}

impl ServiceHealth {
    pub fn healthy(name: impl Into<String>, url: Option<String>, response_time_ms: u64) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Healthy,
            url,
            message: None,
            response_time_ms,
        }
    }

    pub fn unhealthy(
        name: impl Into<String>,
        url: Option<String>,
        message: impl Into<String>,
        response_time_ms: u64,
    ) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Unhealthy,
            url,
            message: Some(message.into()),
            response_time_ms,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Body of the gateway's service health route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealthResponse {
    pub services: Vec<ServiceHealth>,
    pub overall_status: OverallStatus,
    /// When the aggregation started.
    pub checked_at: DateTime<Utc>,
}

impl ServiceHealthResponse {
    pub fn new(services: Vec<ServiceHealth>, checked_at: DateTime<Utc>) -> Self {
        let overall_status = rollup(&services);
        Self {
            services,
            overall_status,
            checked_at,
        }
    }
}

/// Derive the overall status from individual results.
///
/// ```text
/// []                          → Unknown
/// all Healthy                 → Healthy
/// all Unknown                 → Unknown
/// no Healthy (some Unhealthy) → Unhealthy
/// Healthy + anything else     → Degraded
/// ```
pub fn rollup(services: &[ServiceHealth]) -> OverallStatus {
    if services.is_empty() {
        return OverallStatus::Unknown;
    }

    let healthy = services.iter().filter(|s| s.status == HealthStatus::Healthy).count();
    let unknown = services.iter().filter(|s| s.status == HealthStatus::Unknown).count();

    if healthy == services.len() {
        OverallStatus::Healthy
    } else if unknown == services.len() {
        OverallStatus::Unknown
    } else if healthy == 0 {
        OverallStatus::Unhealthy
    } else {
        OverallStatus::Degraded
    }
}
