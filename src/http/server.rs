//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, correlation, request timeout)
//! - Build shared state (health aggregator, token issuer, verifier)
//! - Serve until the shutdown signal fires

use axum::{
    http::HeaderName,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::auth::handlers::issue_token;
use crate::auth::{AuthError, IdentityVerifier, StaticIdentityVerifier, TokenIssuer};
use crate::clock::{Clock, SystemClock};
use crate::config::GatewayConfig;
use crate::health::{HealthAggregator, HttpProbe, ServiceTarget};
use crate::http::correlation::{CorrelationLayer, RequestLogger, TracingRequestLogger};
use crate::http::handlers::{liveness, service_health};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub aggregator: HealthAggregator,
    pub services: Arc<Vec<ServiceTarget>>,
    pub probe_timeout: Duration,
    pub issuer: Arc<TokenIssuer>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub token_ttl: Duration,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Build state from configuration with the bundled collaborators.
    ///
    /// Fails when no signing key is configured.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, AuthError> {
        let issuer = TokenIssuer::from_config(&config.auth)?;
        let probe = HttpProbe::new(config.health_check.path.clone());

        Ok(Self {
            aggregator: HealthAggregator::new(Arc::new(probe)),
            services: Arc::new(config.services.iter().map(ServiceTarget::from).collect()),
            probe_timeout: config.health_check.timeout(),
            issuer: Arc::new(issuer),
            verifier: Arc::new(StaticIdentityVerifier::new(&config.auth.users)),
            token_ttl: config.auth.token_ttl(),
            clock: Arc::new(SystemClock),
        })
    }
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, AuthError> {
        let state = AppState::from_config(&config)?;
        Ok(Self::with_state(config, state, Arc::new(TracingRequestLogger)))
    }

    /// Create a server around prepared state and request logger.
    pub fn with_state(config: GatewayConfig, state: AppState, logger: Arc<dyn RequestLogger>) -> Self {
        let router = Self::build_router(&config, state, logger);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState, logger: Arc<dyn RequestLogger>) -> Router {
        let mut correlation = CorrelationLayer::new(logger).with_clock(state.clock.clone());
        match HeaderName::from_bytes(config.observability.correlation_header.as_bytes()) {
            Ok(header) => correlation = correlation.with_header(header),
            Err(e) => tracing::warn!(
                header = %config.observability.correlation_header,
                error = %e,
                "Invalid correlation header, using default"
            ),
        }

        Router::new()
            .route("/health", get(liveness))
            .route("/health/services", get(service_health))
            .route("/auth/token", post(issue_token))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(correlation)
            .layer(TraceLayer::new_for_http())
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            services = self.config.services.len(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::identity::password_digest;
    use crate::config::UserConfig;
    use crate::health::ServiceHealthResponse;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn config() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.auth.jwt_secret = "server-test-secret".into();
        config.auth.users.push(UserConfig {
            username: "alice".into(),
            password_sha256: password_digest("wonderland"),
            roles: vec![],
        });
        config
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_server_requires_signing_key() {
        let result = HttpServer::new(GatewayConfig::default());
        assert!(matches!(result, Err(AuthError::MissingSigningKey)));
    }

    #[tokio::test]
    async fn test_liveness_has_correlation_header() {
        let server = HttpServer::new(config()).unwrap();

        let response = server
            .router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-correlation-id"));
        assert_eq!(body_json(response).await["status"], "UP");
    }

    #[tokio::test]
    async fn test_service_health_with_no_services_is_unknown() {
        let server = HttpServer::new(config()).unwrap();

        let response = server
            .router()
            .oneshot(Request::get("/health/services").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let parsed: ServiceHealthResponse = serde_json::from_value(json.clone()).unwrap();
        assert!(parsed.services.is_empty());
        assert_eq!(json["overallStatus"], "Unknown");
    }

    #[tokio::test]
    async fn test_token_route_issues_bearer() {
        let server = HttpServer::new(config()).unwrap();

        let request = Request::post("/auth/token")
            .header("content-type", "application/json")
            .header("x-correlation-id", "login-1")
            .body(Body::from(r#"{"username":"alice","password":"wonderland"}"#))
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-correlation-id"], "login-1");
        let json = body_json(response).await;
        assert_eq!(json["tokenType"], "Bearer");
        let expires_in = json["expiresIn"].as_u64().unwrap();
        assert!(expires_in <= 3600 && expires_in > 3595);
    }

    #[tokio::test]
    async fn test_token_route_rejects_malformed_bodies_as_json_400() {
        let server = HttpServer::new(config()).unwrap();
        let cases = [
            ("application/json", r#"{"username":"alice"}"#),
            ("application/json", "not json"),
            ("text/plain", r#"{"username":"alice","password":"wonderland"}"#),
        ];

        for (content_type, body) in cases {
            let request = Request::post("/auth/token")
                .header("content-type", content_type)
                .body(Body::from(body))
                .unwrap();
            let response = server.router().oneshot(request).await.unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{content_type} {body}");
            assert_eq!(response.headers()["content-type"], "application/json");
            let json = body_json(response).await;
            assert!(
                json["error"].as_str().unwrap().starts_with("malformed request: "),
                "{json}"
            );
        }
    }

    #[tokio::test]
    async fn test_token_route_rejects_bad_password() {
        let server = HttpServer::new(config()).unwrap();

        let request = Request::post("/auth/token")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"username":"alice","password":"nope"}"#))
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key("x-correlation-id"));
        assert_eq!(body_json(response).await["error"], "invalid credentials");
    }
}
