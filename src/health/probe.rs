//! Single-service liveness probe.
//!
//! # Responsibilities
//! - Issue one bounded-time request against a service's health endpoint
//! - Classify the outcome (healthy / non-success status / connection error / timeout)
//!
//! # Design Decisions
//! - Never fails: every outcome becomes a `ServiceHealth`
//! - Timeouts drop the in-flight request future (best-effort cancellation)
//! - The response body is never read; status is the only signal

use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use futures_util::future::BoxFuture;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::time::{self, Instant};
use url::Url;

use crate::config::ServiceConfig;
use crate::health::model::ServiceHealth;

/// Failure message for probes that ran out of time.
pub const TIMEOUT_MESSAGE: &str = "timeout";
/// Prefix for transport-level failures.
pub const CONNECTION_ERROR_PREFIX: &str = "connection error";

/// A backend service to probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceTarget {
    pub name: String,
    pub url: String,
}

impl ServiceTarget {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

impl From<&ServiceConfig> for ServiceTarget {
    fn from(config: &ServiceConfig) -> Self {
        Self::new(&config.name, &config.url)
    }
}

/// Performs one liveness check against one service.
///
/// Implementations must not panic and must always produce a result; the
/// aggregator treats the returned value as final.
pub trait HealthProbe: Send + Sync + 'static {
    fn check<'a>(&'a self, target: &'a ServiceTarget, timeout: Duration) -> BoxFuture<'a, ServiceHealth>;
}

/// Probes services over HTTP with `GET {url}{path}`.
#[derive(Clone)]
pub struct HttpProbe {
    client: Client<HttpConnector, Body>,
    path: String,
}

impl HttpProbe {
    pub fn new(path: impl Into<String>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            client,
            path: path.into(),
        }
    }

    /// Resolve the probe URL for a service base URL.
    pub fn probe_url(&self, base: &str) -> Result<Url, url::ParseError> {
        let base = Url::parse(base)?;
        let base_path = base.path().trim_end_matches('/');
        let mut url = base.clone();
        url.set_path(&format!("{}{}", base_path, self.path));
        Ok(url)
    }

    async fn probe(&self, target: &ServiceTarget, timeout: Duration) -> ServiceHealth {
        let start = Instant::now();

        let url = match self.probe_url(&target.url) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(service = %target.name, url = %target.url, error = %e, "Health check failed: invalid url");
                return ServiceHealth::unhealthy(
                    &target.name,
                    Some(target.url.clone()),
                    format!("{}: invalid url: {}", CONNECTION_ERROR_PREFIX, e),
                    elapsed_ms(start),
                );
            }
        };
        let url_string = url.to_string();

        let request = match Request::builder()
            .method("GET")
            .uri(url_string.as_str())
            .header("user-agent", "edge-gateway-health-check")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::warn!(service = %target.name, url = %url_string, error = %e, "Health check failed: invalid request");
                return ServiceHealth::unhealthy(
                    &target.name,
                    Some(url_string),
                    format!("{}: {}", CONNECTION_ERROR_PREFIX, e),
                    elapsed_ms(start),
                );
            }
        };

        let response_future = self.client.request(request);

        match time::timeout(timeout, response_future).await {
            Ok(Ok(response)) => {
                let status = response.status();
                let elapsed = elapsed_ms(start);
                if status.is_success() {
                    ServiceHealth::healthy(&target.name, Some(url_string), elapsed)
                } else {
                    tracing::warn!(service = %target.name, status = %status, "Health check failed: non-success status");
                    ServiceHealth::unhealthy(
                        &target.name,
                        Some(url_string),
                        format!("unexpected status {}", status.as_u16()),
                        elapsed,
                    )
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(service = %target.name, error = %e, "Health check failed: connection error");
                ServiceHealth::unhealthy(
                    &target.name,
                    Some(url_string),
                    format!("{}: {}", CONNECTION_ERROR_PREFIX, e),
                    elapsed_ms(start),
                )
            }
            Err(_) => {
                tracing::warn!(service = %target.name, timeout_ms = timeout.as_millis() as u64, "Health check failed: timeout");
                ServiceHealth::unhealthy(&target.name, Some(url_string), TIMEOUT_MESSAGE, elapsed_ms(start))
            }
        }
    }
}

impl HealthProbe for HttpProbe {
    fn check<'a>(&'a self, target: &'a ServiceTarget, timeout: Duration) -> BoxFuture<'a, ServiceHealth> {
        Box::pin(self.probe(target, timeout))
    }
}

pub(crate) fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::model::HealthStatus;

    #[test]
    fn test_probe_url_joins_paths() {
        let probe = HttpProbe::new("/health");
        assert_eq!(
            probe.probe_url("http://orders:8080").unwrap().as_str(),
            "http://orders:8080/health"
        );
        assert_eq!(
            probe.probe_url("http://orders:8080/api/").unwrap().as_str(),
            "http://orders:8080/api/health"
        );
        assert!(probe.probe_url("not a url").is_err());
    }

    #[tokio::test]
    async fn test_malformed_url_is_unhealthy() {
        let probe = HttpProbe::new("/health");
        let target = ServiceTarget::new("broken", "::not-a-url::");

        let health = probe.check(&target, Duration::from_millis(200)).await;
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert!(health.message.unwrap().starts_with(CONNECTION_ERROR_PREFIX));
    }

    #[tokio::test]
    async fn test_unsupported_scheme_is_connection_error() {
        let probe = HttpProbe::new("/health");
        let target = ServiceTarget::new("tls", "https://127.0.0.1:1");

        let health = probe.check(&target, Duration::from_millis(500)).await;
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert!(health.message.unwrap().starts_with(CONNECTION_ERROR_PREFIX));
    }
}
