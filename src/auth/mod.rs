//! Credential issuance subsystem.
//!
//! # Data Flow
//! ```text
//! POST /auth/token {username, password}
//!     → identity.rs (IdentityVerifier collaborator → Identity)
//!     → token.rs (TokenIssuer: expiresAt = now + ttl, sign)
//!     → TokenResponse {token, tokenType, expiresAt, expiresIn}
//! ```
//!
//! # Design Decisions
//! - Password checking belongs to the verifier, not the issuer
//! - Issuance is synchronous and stateless
//! - Signing key misconfiguration fails startup, never degrades silently

pub mod error;
pub mod handlers;
pub mod identity;
pub mod token;

pub use error::AuthError;
pub use identity::{Identity, IdentityVerifier, StaticIdentityVerifier};
pub use token::{Claims, Credential, TokenIssuer, TokenResponse, TokenType};
