//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, env overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → handed to the HTTP server and its subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Signing key material may come from the environment instead of the file

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_from_env, ConfigError};
pub use schema::{
    AuthConfig, GatewayConfig, HealthCheckConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, ServiceConfig, TimeoutConfig, UserConfig,
};
pub use validation::{validate_config, ValidationError};
