//! Edge gateway cross-cutting layer: request correlation, concurrent
//! backend health aggregation and bearer token issuance.

pub mod auth;
pub mod clock;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
