//! Bearer token issuance.
//!
//! # Responsibilities
//! - Sign a JWT binding an identity to an absolute expiry
//! - Report remaining lifetime relative to the reader's clock
//!
//! # Design Decisions
//! - `expires_in` is always derived from `expires_at`, never stored
//! - The issuer keeps no record of outstanding tokens
//! - Missing key material is a construction-time error

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::error::AuthError;
use crate::auth::identity::Identity;
use crate::clock::{Clock, SystemClock};
use crate::config::AuthConfig;
use crate::observability::metrics;

/// JWT claims carried by issued tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// The only token type issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TokenType {
    #[default]
    Bearer,
}

/// An issued bearer credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub token: String,
    pub token_type: TokenType,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Whole seconds until expiry as seen at `now`, never negative.
    pub fn expires_in(&self, now: DateTime<Utc>) -> u64 {
        (self.expires_at - now).num_seconds().max(0) as u64
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Wire shape of a credential, with `expiresIn` computed at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: String,
    pub token_type: TokenType,
    pub expires_at: DateTime<Utc>,
    pub expires_in: u64,
}

impl TokenResponse {
    pub fn from_credential(credential: &Credential, now: DateTime<Utc>) -> Self {
        Self {
            token: credential.token.clone(),
            token_type: credential.token_type,
            expires_at: credential.expires_at,
            expires_in: credential.expires_in(now),
        }
    }
}

/// Signs HS256 bearer tokens.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    issuer: String,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(secret: &str, issuer: impl Into<String>, clock: Arc<dyn Clock>) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::MissingSigningKey);
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            clock,
        })
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        Self::new(&config.jwt_secret, config.issuer.clone(), Arc::new(SystemClock))
    }

    /// The issuer's notion of the current time.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Sign a credential for `identity` valid for `ttl` from now.
    pub fn issue(&self, identity: &Identity, ttl: Duration) -> Result<Credential, AuthError> {
        let ttl = chrono::Duration::from_std(ttl).map_err(|_| AuthError::InvalidTtl)?;
        let now = self.clock.now();
        let expires_at = now.checked_add_signed(ttl).ok_or(AuthError::InvalidTtl)?;

        let claims = Claims {
            sub: identity.subject.clone(),
            roles: identity.roles.clone(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;

        metrics::record_token_issued();
        tracing::info!(subject = %identity.subject, expires_at = %expires_at, "Token issued");

        Ok(Credential {
            token,
            token_type: TokenType::Bearer,
            expires_at,
        })
    }
}
