//! Common error types shared across crates.

use thiserror::Error;

/// Top-level service error type.
///
/// Variants map to HTTP status codes returned to callers:
/// - [`ServiceError::BadRequest`] → 400
/// - [`ServiceError::InvalidToken`] → 401
/// - [`ServiceError::PayloadTooLarge`] → 413
/// - every other variant → 500
///
/// The `Display` output carries internal detail for server-side logs only.
/// Responses use [`ServiceError::public_message`], which never tells a caller
/// *why* an envelope was rejected.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request was malformed: missing field, invalid JSON, unsupported
    /// transaction type, or a payload that cannot be parsed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The request body exceeded the size limit.
    #[error("request body exceeds the size limit")]
    PayloadTooLarge,

    /// An identity token failed verification.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The envelope does not have three base64 segments of the right sizes.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The authentication tag did not verify (wrong secret or tampering).
    #[error("envelope authentication failed")]
    AuthenticationFailed,

    /// A required server-side setting (secret, RPC endpoint, project id) is absent.
    #[error("{0} not configured")]
    ConfigurationMissing(&'static str),

    /// The external signer or chain endpoint returned an error or timed out.
    #[error("signing failed: {0}")]
    SigningFailed(String),

    /// An unexpected internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Returns the HTTP status code that should be sent for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::BadRequest(_) => 400,
            ServiceError::InvalidToken(_) => 401,
            ServiceError::PayloadTooLarge => 413,
            ServiceError::MalformedEnvelope(_)
            | ServiceError::AuthenticationFailed
            | ServiceError::ConfigurationMissing(_)
            | ServiceError::SigningFailed(_)
            | ServiceError::Internal(_) => 500,
        }
    }

    /// Short machine-readable code placed in the error body.
    ///
    /// Both envelope failures share one code.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::BadRequest(_) => "bad_request",
            ServiceError::InvalidToken(_) => "invalid_token",
            ServiceError::PayloadTooLarge => "payload_too_large",
            ServiceError::MalformedEnvelope(_) | ServiceError::AuthenticationFailed => {
                "decryption_failed"
            }
            ServiceError::ConfigurationMissing(_) => "not_configured",
            ServiceError::SigningFailed(_) => "signing_failed",
            ServiceError::Internal(_) => "internal_error",
        }
    }

    /// Message that is safe to return to the caller.
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::BadRequest(msg) => msg.clone(),
            ServiceError::InvalidToken(_) => "Invalid token".into(),
            ServiceError::PayloadTooLarge => "Request body too large".into(),
            ServiceError::MalformedEnvelope(_) | ServiceError::AuthenticationFailed => {
                "Decryption failed".into()
            }
            ServiceError::ConfigurationMissing(what) => format!("{what} not configured"),
            ServiceError::SigningFailed(_) => "Transaction signing failed".into(),
            ServiceError::Internal(_) => "Internal server error".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_codes() {
        assert_eq!(ServiceError::BadRequest("x".into()).http_status(), 400);
        assert_eq!(ServiceError::InvalidToken("x".into()).http_status(), 401);
        assert_eq!(ServiceError::PayloadTooLarge.http_status(), 413);
        assert_eq!(ServiceError::MalformedEnvelope("x".into()).http_status(), 500);
        assert_eq!(ServiceError::AuthenticationFailed.http_status(), 500);
        assert_eq!(
            ServiceError::ConfigurationMissing("Encryption secret").http_status(),
            500
        );
        assert_eq!(ServiceError::SigningFailed("x".into()).http_status(), 500);
        assert_eq!(ServiceError::Internal("x".into()).http_status(), 500);
    }

    #[test]
    fn display_includes_message() {
        let e = ServiceError::BadRequest("Plain text is required".into());
        assert!(e.to_string().contains("Plain text is required"));
    }

    #[test]
    fn envelope_failures_are_indistinguishable_to_callers() {
        let malformed = ServiceError::MalformedEnvelope("segment count 2".into());
        let tampered = ServiceError::AuthenticationFailed;
        assert_eq!(malformed.code(), tampered.code());
        assert_eq!(malformed.public_message(), tampered.public_message());
        assert_eq!(malformed.http_status(), tampered.http_status());
        assert!(!malformed.public_message().contains("segment"));
    }

    #[test]
    fn signing_failure_hides_detail() {
        let e = ServiceError::SigningFailed("nonce too low".into());
        assert_eq!(e.public_message(), "Transaction signing failed");
        assert!(e.to_string().contains("nonce too low"));
    }

    #[test]
    fn configuration_missing_names_the_setting() {
        let e = ServiceError::ConfigurationMissing("Encryption secret");
        assert_eq!(e.public_message(), "Encryption secret not configured");
    }

    #[test]
    fn payload_too_large_has_its_own_code() {
        let e = ServiceError::PayloadTooLarge;
        assert_eq!(e.code(), "payload_too_large");
        assert_eq!(e.public_message(), "Request body too large");
    }
}
