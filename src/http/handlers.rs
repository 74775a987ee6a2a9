//! Gateway health routes.

use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::health::ServiceHealthResponse;
use crate::http::correlation::CorrelationId;
use crate::http::server::AppState;

/// Liveness of the gateway process itself.
///
/// ```json
/// { "status": "UP", "timestamp": "2024-03-10T15:30:45.123Z" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

impl LivenessResponse {
    pub fn up(now: DateTime<Utc>) -> Self {
        Self {
            status: "UP".to_string(),
            timestamp: now,
        }
    }
}

/// `GET /health`
pub async fn liveness(State(state): State<AppState>) -> Json<LivenessResponse> {
    Json(LivenessResponse::up(state.clock.now()))
}

/// `GET /health/services`
///
/// Always answers 200; callers must read `overallStatus`.
pub async fn service_health(
    State(state): State<AppState>,
    Extension(correlation_id): Extension<CorrelationId>,
) -> Json<ServiceHealthResponse> {
    tracing::debug!(
        correlation_id = %correlation_id,
        services = state.services.len(),
        "Aggregating service health"
    );

    let response = state
        .aggregator
        .aggregate(&state.services, state.probe_timeout)
        .await;

    Json(response)
}
