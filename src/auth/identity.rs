//! Verified identities and the collaborator that produces them.

use std::collections::HashMap;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::auth::error::AuthError;
use crate::config::UserConfig;

/// An already-authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subject: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Identity {
    pub fn new(subject: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            subject: subject.into(),
            roles,
        }
    }
}

/// Checks presented credentials and returns the identity they prove.
pub trait IdentityVerifier: Send + Sync + 'static {
    fn verify<'a>(&'a self, username: &'a str, password: &'a str) -> BoxFuture<'a, Result<Identity, AuthError>>;
}

/// Verifier backed by the `[[auth.users]]` configuration entries.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityVerifier {
    users: HashMap<String, UserConfig>,
}

impl StaticIdentityVerifier {
    pub fn new(users: &[UserConfig]) -> Self {
        Self {
            users: users
                .iter()
                .map(|u| (u.username.clone(), u.clone()))
                .collect(),
        }
    }

    fn check(&self, username: &str, password: &str) -> Result<Identity, AuthError> {
        let user = self.users.get(username).ok_or(AuthError::InvalidCredentials)?;

        if digest_matches(&password_digest(password), &user.password_sha256.to_ascii_lowercase()) {
            Ok(Identity::new(&user.username, user.roles.clone()))
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}

impl IdentityVerifier for StaticIdentityVerifier {
    fn verify<'a>(&'a self, username: &'a str, password: &'a str) -> BoxFuture<'a, Result<Identity, AuthError>> {
        Box::pin(async move { self.check(username, password) })
    }
}

/// Lowercase hex SHA-256 of a password.
pub fn password_digest(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Compare digests without short-circuiting on the first mismatch.
fn digest_matches(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a.bytes()
            .zip(b.bytes())
            .fold(0u8, |acc, (x, y)| acc | (x ^ y))
            == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> StaticIdentityVerifier {
        StaticIdentityVerifier::new(&[UserConfig {
            username: "alice".into(),
            password_sha256: password_digest("wonderland").to_uppercase(),
            roles: vec!["admin".into()],
        }])
    }

    #[test]
    fn test_password_digest_is_sha256_hex() {
        assert_eq!(
            password_digest("password"),
            "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8"
        );
    }

    #[tokio::test]
    async fn test_valid_credentials_yield_identity() {
        let identity = verifier().verify("alice", "wonderland").await.unwrap();
        assert_eq!(identity, Identity::new("alice", vec!["admin".into()]));
    }

    #[tokio::test]
    async fn test_wrong_password_or_user_rejected() {
        let verifier = verifier();
        assert!(matches!(
            verifier.verify("alice", "looking-glass").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            verifier.verify("bob", "wonderland").await,
            Err(AuthError::InvalidCredentials)
        ));
    }
}
