//! Credential issuance errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// No key material is configured; the issuer cannot operate.
    #[error("signing key is not configured")]
    MissingSigningKey,

    #[error("token ttl is out of range")]
    InvalidTtl,

    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("invalid credentials")]
    InvalidCredentials,

    /// The request body could not be read as a token request.
    #[error("malformed request: {0}")]
    BadRequest(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AuthError::MissingSigningKey | AuthError::InvalidTtl | AuthError::Signing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Credential issuance failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
