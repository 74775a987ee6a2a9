//! Request correlation middleware.
//!
//! # Responsibilities
//! - Assign a correlation ID to every request (or adopt the inbound one)
//! - Expose the ID to later stages (request extensions + tracing span)
//! - Echo the ID in the response header
//! - Emit exactly one "started" and one "completed" event per request
//!
//! # Design Decisions
//! - The logger is injected, not taken from the global subscriber
//! - Completion is emitted from a drop guard, so downstream errors and
//!   cancellation (future dropped mid-flight) still produce the event
//! - Downstream errors are passed through untouched

use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Response, StatusCode};
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use tower::{Layer, Service};
use tracing::Instrument;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::observability::metrics;

/// Default header carrying the correlation ID.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Inbound IDs longer than this are replaced.
pub const MAX_INBOUND_ID_LEN: usize = 128;

/// Correlation ID attached to a request.
///
/// Handlers read it with `Extension<CorrelationId>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of fresh correlation IDs.
pub trait MakeCorrelationId: Send + Sync + 'static {
    fn make_id(&self) -> CorrelationId;
}

/// Generates UUID v4 correlation IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidCorrelationId;

impl MakeCorrelationId for UuidCorrelationId {
    fn make_id(&self) -> CorrelationId {
        CorrelationId(Uuid::new_v4().to_string())
    }
}

/// Per-request envelope owned by one middleware invocation.
#[derive(Debug, Clone)]
pub struct CorrelationContext {
    pub correlation_id: CorrelationId,
    pub started_at: DateTime<Utc>,
    pub method: Method,
    pub path: String,
}

/// How downstream processing ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A response was produced.
    Status(StatusCode),
    /// The downstream service returned an error.
    Failed(String),
    /// The request future was dropped before it finished, including when
    /// downstream panicked.
    Cancelled,
}

impl RequestOutcome {
    /// Short label used for metrics.
    pub fn label(&self) -> String {
        match self {
            RequestOutcome::Status(status) => status.as_u16().to_string(),
            RequestOutcome::Failed(_) => "error".to_string(),
            RequestOutcome::Cancelled => "cancelled".to_string(),
        }
    }
}

/// Receives the two lifecycle events of every request.
pub trait RequestLogger: Send + Sync + 'static {
    fn started(&self, ctx: &CorrelationContext);
    fn completed(&self, ctx: &CorrelationContext, outcome: &RequestOutcome, elapsed: Duration);
}

/// Forwards request events to `tracing` and records request metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRequestLogger;

impl RequestLogger for TracingRequestLogger {
    fn started(&self, ctx: &CorrelationContext) {
        tracing::info!(
            correlation_id = %ctx.correlation_id,
            method = %ctx.method,
            path = %ctx.path,
            "Request started"
        );
    }

    fn completed(&self, ctx: &CorrelationContext, outcome: &RequestOutcome, elapsed: Duration) {
        let elapsed_ms = elapsed.as_millis() as u64;
        match outcome {
            RequestOutcome::Status(status) if status.is_server_error() => tracing::warn!(
                correlation_id = %ctx.correlation_id,
                method = %ctx.method,
                path = %ctx.path,
                status = status.as_u16(),
                elapsed_ms,
                "Request completed"
            ),
            RequestOutcome::Status(status) => tracing::info!(
                correlation_id = %ctx.correlation_id,
                method = %ctx.method,
                path = %ctx.path,
                status = status.as_u16(),
                elapsed_ms,
                "Request completed"
            ),
            RequestOutcome::Failed(error) => tracing::error!(
                correlation_id = %ctx.correlation_id,
                method = %ctx.method,
                path = %ctx.path,
                error = %error,
                elapsed_ms,
                "Request completed"
            ),
            RequestOutcome::Cancelled => tracing::warn!(
                correlation_id = %ctx.correlation_id,
                method = %ctx.method,
                path = %ctx.path,
                outcome = "cancelled",
                elapsed_ms,
                "Request completed"
            ),
        }

        metrics::record_request(ctx.method.as_str(), &outcome.label(), elapsed);
    }
}

/// Emits the completion event exactly once, on finish or on drop.
struct CompletionGuard {
    ctx: CorrelationContext,
    logger: Arc<dyn RequestLogger>,
    start: Instant,
    done: bool,
}

impl CompletionGuard {
    fn new(ctx: CorrelationContext, logger: Arc<dyn RequestLogger>) -> Self {
        Self {
            ctx,
            logger,
            start: Instant::now(),
            done: false,
        }
    }

    fn finish(mut self, outcome: RequestOutcome) {
        self.emit(&outcome);
    }

    fn emit(&mut self, outcome: &RequestOutcome) {
        if self.done {
            return;
        }
        self.done = true;
        self.logger.completed(&self.ctx, outcome, self.start.elapsed());
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.emit(&RequestOutcome::Cancelled);
    }
}

/// Layer that wraps services with [`CorrelationService`].
#[derive(Clone)]
pub struct CorrelationLayer {
    header: HeaderName,
    logger: Arc<dyn RequestLogger>,
    make_id: Arc<dyn MakeCorrelationId>,
    clock: Arc<dyn Clock>,
}

impl CorrelationLayer {
    pub fn new(logger: Arc<dyn RequestLogger>) -> Self {
        Self {
            header: HeaderName::from_static(CORRELATION_HEADER),
            logger,
            make_id: Arc::new(UuidCorrelationId),
            clock: Arc::new(SystemClock),
        }
    }

    /// Use a different header name for inbound and outbound IDs.
    pub fn with_header(mut self, header: HeaderName) -> Self {
        self.header = header;
        self
    }

    /// Use a different ID generator.
    pub fn with_id_source(mut self, make_id: Arc<dyn MakeCorrelationId>) -> Self {
        self.make_id = make_id;
        self
    }

    /// Use a different clock for `started_at`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl<S> Layer<S> for CorrelationLayer {
    type Service = CorrelationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelationService {
            inner,
            header: self.header.clone(),
            logger: self.logger.clone(),
            make_id: self.make_id.clone(),
            clock: self.clock.clone(),
        }
    }
}

/// Middleware service produced by [`CorrelationLayer`].
#[derive(Clone)]
pub struct CorrelationService<S> {
    inner: S,
    header: HeaderName,
    logger: Arc<dyn RequestLogger>,
    make_id: Arc<dyn MakeCorrelationId>,
    clock: Arc<dyn Clock>,
}

impl<S> CorrelationService<S> {
    /// Adopt a usable inbound ID or mint a new one.
    fn resolve_id(&self, headers: &HeaderMap) -> (CorrelationId, HeaderValue) {
        let inbound = headers
            .get(&self.header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty() && v.len() <= MAX_INBOUND_ID_LEN);

        if let Some(id) = inbound {
            if let Ok(value) = HeaderValue::from_str(id) {
                return (CorrelationId::new(id), value);
            }
        }

        let id = self.make_id.make_id();
        match HeaderValue::from_str(id.as_str()) {
            Ok(value) => (id, value),
            Err(_) => {
                tracing::warn!(id = %id, "Generated correlation ID is not a valid header value, using UUID");
                let id = UuidCorrelationId.make_id();
                let value = HeaderValue::from_str(id.as_str()).unwrap_or(HeaderValue::from_static("invalid"));
                (id, value)
            }
        }
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for CorrelationService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: fmt::Display,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        let (id, header_value) = self.resolve_id(request.headers());

        let ctx = CorrelationContext {
            correlation_id: id.clone(),
            started_at: self.clock.now(),
            method: request.method().clone(),
            path: request.uri().path().to_string(),
        };
        request.extensions_mut().insert(id.clone());

        let span = tracing::info_span!(
            "request",
            correlation_id = %id,
            method = %ctx.method,
            path = %ctx.path
        );

        self.logger.started(&ctx);
        let guard = CompletionGuard::new(ctx, self.logger.clone());

        let future = span.in_scope(|| self.inner.call(request));
        let header = self.header.clone();

        Box::pin(async move {
            match future.instrument(span).await {
                Ok(mut response) => {
                    guard.finish(RequestOutcome::Status(response.status()));
                    response.headers_mut().insert(header, header_value);
                    Ok(response)
                }
                Err(e) => {
                    guard.finish(RequestOutcome::Failed(e.to_string()));
                    Err(e)
                }
            }
        })
    }
}
