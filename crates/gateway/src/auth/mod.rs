//! Identity-provider ID token verification.
//!
//! Firebase ID tokens are RS256 JWTs signed by Google's secure-token service.
//! Public keys come from a JWKS endpoint and are cached for a short TTL.
//!
//! ## Security
//!
//! - Tokens are never logged.
//! - The JWKS is fetched over HTTPS; an unknown `kid` triggers one refresh so
//!   key rotation is picked up without waiting for the TTL.

pub mod firebase;
pub mod jwks;

pub use firebase::FirebaseVerifier;
pub use jwks::JwksCache;

use common::ServiceError;
use thiserror::Error;

/// Token verification failures.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token is not a decodable JWT.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// The JWT header has no `kid`.
    #[error("token header has no key id")]
    MissingKeyId,

    /// No JWKS key matches the token's `kid`.
    #[error("no matching key in JWKS")]
    NoMatchingKey,

    /// Signature, issuer, audience, expiry or subject check failed.
    #[error("token rejected: {0}")]
    Rejected(String),

    /// The JWKS endpoint could not be fetched or parsed.
    #[error("JWKS fetch failed: {0}")]
    JwksFetch(String),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::JwksFetch(_) => ServiceError::Internal(err.to_string()),
            _ => ServiceError::InvalidToken(err.to_string()),
        }
    }
}
