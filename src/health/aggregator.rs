//! Concurrent health aggregation.
//!
//! # Responsibilities
//! - Fan out one probe task per configured service
//! - Bound every task by the per-probe timeout
//! - Join all tasks and roll the results up into one report
//!
//! # Design Decisions
//! - One tokio task per service; total latency ≈ one timeout, not N
//! - Results are collected in input order by awaiting handles in order
//! - A task that panics or overruns is reported, never propagated
//! - No caching: every call is a full fan-out

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::clock::{Clock, SystemClock};
use crate::health::model::{ServiceHealth, ServiceHealthResponse};
use crate::health::probe::{elapsed_ms, HealthProbe, ServiceTarget, TIMEOUT_MESSAGE};
use crate::observability::metrics;

/// Message for probe tasks that died before producing a result.
pub const PROBE_FAILED_MESSAGE: &str = "probe failed";

/// Fans health probes out across services and rolls up the results.
#[derive(Clone)]
pub struct HealthAggregator {
    probe: Arc<dyn HealthProbe>,
    clock: Arc<dyn Clock>,
}

impl HealthAggregator {
    pub fn new(probe: Arc<dyn HealthProbe>) -> Self {
        Self::with_clock(probe, Arc::new(SystemClock))
    }

    pub fn with_clock(probe: Arc<dyn HealthProbe>, clock: Arc<dyn Clock>) -> Self {
        Self { probe, clock }
    }

    /// Probe every service concurrently and build the rollup report.
    pub async fn aggregate(&self, services: &[ServiceTarget], per_probe_timeout: Duration) -> ServiceHealthResponse {
        let checked_at = self.clock.now();
        let start = Instant::now();

        let handles: Vec<(ServiceTarget, JoinHandle<ServiceHealth>)> = services
            .iter()
            .cloned()
            .map(|target| {
                let handle = tokio::spawn(run_probe(self.probe.clone(), target.clone(), per_probe_timeout));
                (target, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (target, handle) in handles {
            let health = match handle.await {
                Ok(health) => health,
                Err(e) => {
                    tracing::error!(service = %target.name, error = %e, "Health probe task failed");
                    ServiceHealth::unhealthy(&target.name, Some(target.url.clone()), PROBE_FAILED_MESSAGE, elapsed_ms(start))
                }
            };
            metrics::record_service_health(&health.name, health.is_healthy(), health.response_time_ms);
            results.push(health);
        }

        let response = ServiceHealthResponse::new(results, checked_at);

        tracing::info!(
            services = response.services.len(),
            healthy = response.services.iter().filter(|s| s.is_healthy()).count(),
            overall_status = ?response.overall_status,
            elapsed_ms = elapsed_ms(start),
            "Service health aggregated"
        );

        response
    }
}

/// Run one probe under a hard deadline.
async fn run_probe(probe: Arc<dyn HealthProbe>, target: ServiceTarget, timeout: Duration) -> ServiceHealth {
    let start = Instant::now();
    match time::timeout(timeout, probe.check(&target, timeout)).await {
        Ok(health) => health,
        Err(_) => {
            tracing::warn!(service = %target.name, timeout_ms = timeout.as_millis() as u64, "Health probe abandoned after timeout");
            ServiceHealth::unhealthy(&target.name, Some(target.url.clone()), TIMEOUT_MESSAGE, elapsed_ms(start))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::health::model::{HealthStatus, OverallStatus};
    use chrono::{DateTime, Utc};
    use futures_util::future::BoxFuture;
    use std::collections::HashMap;

    /// Scripted behaviour per service name.
    #[derive(Clone, Copy)]
    enum Script {
        Healthy { delay_ms: u64 },
        Failing { delay_ms: u64 },
        Hang,
        Panic,
    }

    struct ScriptedProbe {
        scripts: HashMap<String, Script>,
    }

    impl ScriptedProbe {
        fn new(scripts: &[(&str, Script)]) -> Arc<Self> {
            Arc::new(Self {
                scripts: scripts.iter().map(|(n, s)| (n.to_string(), *s)).collect(),
            })
        }
    }

    impl HealthProbe for ScriptedProbe {
        fn check<'a>(&'a self, target: &'a ServiceTarget, _timeout: Duration) -> BoxFuture<'a, ServiceHealth> {
            let script = self.scripts[&target.name];
            Box::pin(async move {
                match script {
                    Script::Healthy { delay_ms } => {
                        time::sleep(Duration::from_millis(delay_ms)).await;
                        ServiceHealth::healthy(&target.name, None, delay_ms)
                    }
                    Script::Failing { delay_ms } => {
                        time::sleep(Duration::from_millis(delay_ms)).await;
                        ServiceHealth::unhealthy(&target.name, None, "unexpected status 500", delay_ms)
                    }
                    Script::Hang => std::future::pending().await,
                    Script::Panic => panic!("probe blew up"),
                }
            })
        }
    }

    fn targets(names: &[&str]) -> Vec<ServiceTarget> {
        names
            .iter()
            .map(|n| ServiceTarget::new(*n, format!("http://{n}")))
            .collect()
    }

    #[tokio::test]
    async fn test_empty_service_list_is_unknown() {
        let aggregator = HealthAggregator::new(ScriptedProbe::new(&[]));
        let response = aggregator.aggregate(&[], Duration::from_secs(1)).await;

        assert!(response.services.is_empty());
        assert_eq!(response.overall_status, OverallStatus::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_order_follows_input_not_completion() {
        let probe = ScriptedProbe::new(&[
            ("slow", Script::Healthy { delay_ms: 300 }),
            ("medium", Script::Healthy { delay_ms: 200 }),
            ("fast", Script::Healthy { delay_ms: 100 }),
        ]);
        let aggregator = HealthAggregator::new(probe);

        let response = aggregator
            .aggregate(&targets(&["slow", "medium", "fast"]), Duration::from_secs(1))
            .await;

        let names: Vec<_> = response.services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["slow", "medium", "fast"]);
        assert_eq!(response.overall_status, OverallStatus::Healthy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_probes_bounded_by_single_timeout() {
        let probe = ScriptedProbe::new(&[
            ("a", Script::Hang),
            ("b", Script::Hang),
            ("c", Script::Hang),
            ("d", Script::Hang),
        ]);
        let aggregator = HealthAggregator::new(probe);
        let timeout = Duration::from_secs(2);

        let start = time::Instant::now();
        let response = aggregator.aggregate(&targets(&["a", "b", "c", "d"]), timeout).await;
        let elapsed = start.elapsed();

        assert!(elapsed >= timeout);
        assert!(elapsed < timeout * 2, "took {elapsed:?}");
        assert_eq!(response.overall_status, OverallStatus::Unhealthy);
        for service in &response.services {
            assert_eq!(service.message.as_deref(), Some(TIMEOUT_MESSAGE));
            assert!(service.response_time_ms >= 2000);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_mixed_outcomes_degrade() {
        let probe = ScriptedProbe::new(&[
            ("A", Script::Healthy { delay_ms: 10 }),
            ("B", Script::Hang),
            ("C", Script::Failing { delay_ms: 10 }),
        ]);
        let aggregator = HealthAggregator::new(probe);

        let response = aggregator
            .aggregate(&targets(&["A", "B", "C"]), Duration::from_secs(2))
            .await;

        let statuses: Vec<_> = response.services.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![HealthStatus::Healthy, HealthStatus::Unhealthy, HealthStatus::Unhealthy]
        );
        assert_eq!(response.services[1].message.as_deref(), Some(TIMEOUT_MESSAGE));
        assert_eq!(response.services[2].message.as_deref(), Some("unexpected status 500"));
        assert_eq!(response.overall_status, OverallStatus::Degraded);
    }

    #[tokio::test]
    async fn test_panicking_probe_is_contained() {
        let probe = ScriptedProbe::new(&[
            ("ok", Script::Healthy { delay_ms: 0 }),
            ("boom", Script::Panic),
        ]);
        let aggregator = HealthAggregator::new(probe);

        let response = aggregator
            .aggregate(&targets(&["ok", "boom"]), Duration::from_secs(1))
            .await;

        assert_eq!(response.services[1].status, HealthStatus::Unhealthy);
        assert_eq!(response.services[1].message.as_deref(), Some(PROBE_FAILED_MESSAGE));
        assert_eq!(response.overall_status, OverallStatus::Degraded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_checked_at_is_call_entry_time() {
        let start: DateTime<Utc> = "2024-03-10T15:30:45Z".parse().unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let probe = ScriptedProbe::new(&[("slow", Script::Healthy { delay_ms: 500 })]);
        let aggregator = HealthAggregator::with_clock(probe, clock.clone());

        let response = aggregator.aggregate(&targets(&["slow"]), Duration::from_secs(1)).await;
        clock.advance(chrono::Duration::seconds(1));

        assert_eq!(response.checked_at, start);
    }

    #[tokio::test]
    async fn test_each_call_probes_again() {
        let probe = ScriptedProbe::new(&[("a", Script::Healthy { delay_ms: 0 })]);
        let aggregator = HealthAggregator::new(probe);
        let services = targets(&["a"]);

        let first = aggregator.aggregate(&services, Duration::from_secs(1)).await;
        let second = aggregator.aggregate(&services, Duration::from_secs(1)).await;

        assert_eq!(first.services, second.services);
        assert!(second.checked_at >= first.checked_at);
    }
}
