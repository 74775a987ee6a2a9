//! Token route.

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::auth::error::AuthError;
use crate::auth::token::TokenResponse;
use crate::http::correlation::CorrelationId;
use crate::http::server::AppState;

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

/// `POST /auth/token`
pub async fn issue_token(
    State(state): State<AppState>,
    Extension(correlation_id): Extension<CorrelationId>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AuthError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!(correlation_id = %correlation_id, error = %rejection, "Malformed token request");
        AuthError::BadRequest(rejection.body_text())
    })?;

    let identity = match state.verifier.verify(&request.username, &request.password).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!(correlation_id = %correlation_id, username = %request.username, "Credential verification rejected");
            return Err(e);
        }
    };

    let credential = state.issuer.issue(&identity, state.token_ttl)?;

    Ok(Json(TokenResponse::from_credential(&credential, state.issuer.now())))
}
