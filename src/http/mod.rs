//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → correlation.rs (assign ID, started event, span)
//!     → handlers.rs / auth handlers (route handling)
//!     → correlation.rs (completed event, response header)
//!     → Send to client
//! ```

pub mod correlation;
pub mod handlers;
pub mod server;

pub use correlation::{
    CorrelationContext, CorrelationId, CorrelationLayer, CorrelationService, MakeCorrelationId,
    RequestLogger, RequestOutcome, TracingRequestLogger, CORRELATION_HEADER,
};
pub use server::{AppState, HttpServer};
