//! Firebase ID token verification.
//!
//! See <https://firebase.google.com/docs/auth/admin/verify-id-tokens> for the
//! checks applied: RS256 signature by a `kid` from Google's secure-token JWKS,
//! `aud` equal to the project id, `iss` equal to
//! `https://securetoken.google.com/<project id>`, unexpired, non-empty `sub`.

use std::sync::Arc;

use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde::Deserialize;

use super::{AuthError, JwksCache};

/// Public JWKS for Firebase ID tokens.
pub const DEFAULT_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

const ISSUER_PREFIX: &str = "https://securetoken.google.com/";

/// Claims read from a Firebase ID token. Standard claims are checked by
/// [`Validation`] and not kept.
#[derive(Debug, Deserialize)]
struct FirebaseClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
}

/// Identity extracted from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub uid: String,
    pub email: Option<String>,
}

#[derive(Clone)]
pub struct FirebaseVerifier {
    project_id: Arc<str>,
    jwks: JwksCache,
}

impl FirebaseVerifier {
    pub fn new(project_id: impl Into<String>, jwks: JwksCache) -> Self {
        Self {
            project_id: Arc::from(project_id.into()),
            jwks,
        }
    }

    /// Verify `token` and return the caller's identity.
    pub async fn verify(&self, token: &str) -> Result<VerifiedToken, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::MalformedToken(e.to_string()))?;
        if header.alg != Algorithm::RS256 {
            return Err(AuthError::Rejected(format!("unexpected algorithm {:?}", header.alg)));
        }
        let kid = header.kid.ok_or(AuthError::MissingKeyId)?;
        let key = self.jwks.decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&*self.project_id]);
        validation.set_issuer(&[format!("{ISSUER_PREFIX}{}", self.project_id)]);
        validation.set_required_spec_claims(&["exp", "aud", "iss", "sub"]);

        let claims = decode::<FirebaseClaims>(token, &key, &validation)
            .map_err(|e| AuthError::Rejected(e.to_string()))?
            .claims;

        if claims.sub.is_empty() || claims.sub.len() > 128 {
            return Err(AuthError::Rejected("invalid subject".into()));
        }

        Ok(VerifiedToken {
            uid: claims.sub,
            email: claims.email,
        })
    }
}
