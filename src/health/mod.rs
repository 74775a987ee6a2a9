//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Health-check trigger (GET /health/services):
//!     aggregator.rs
//!     → one probe.rs task per configured service (concurrent)
//!     → each bounded by the per-probe timeout
//!     → join in configuration order
//!     → model.rs rollup (Healthy / Degraded / Unhealthy / Unknown)
//! ```
//!
//! # Design Decisions
//! - Probes never fail; failures are values
//! - Rollup is a pure function of the collected results
//! - Status travels in the body; the route always answers 200

pub mod aggregator;
pub mod model;
pub mod probe;

pub use aggregator::HealthAggregator;
pub use model::{rollup, HealthStatus, OverallStatus, ServiceHealth, ServiceHealthResponse};
pub use probe::{HealthProbe, HttpProbe, ServiceTarget};
