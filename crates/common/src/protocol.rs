//! Request and response types exchanged between the gateway and its callers.
//!
//! Field names are camelCase on the wire. Request fields are `Option`s so that
//! a missing field reaches the handler and is answered with a 400 rather than
//! an extractor rejection.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Encrypt / decrypt endpoints
// ---------------------------------------------------------------------------

/// Request body for `POST /encrypt`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptRequest {
    /// UTF-8 text to seal, usually a wallet private key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plain_text: Option<String>,
}

/// Successful response body for `POST /encrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptResponse {
    pub success: bool,
    /// `base64(iv):base64(tag):base64(ciphertext)`.
    pub encrypted_data: String,
}

/// Request body for `POST /decrypt`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_data: Option<String>,
}

/// Successful response body for `POST /decrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptResponse {
    pub success: bool,
    pub decrypted_data: String,
}

// ---------------------------------------------------------------------------
// Sign-transaction endpoint
// ---------------------------------------------------------------------------

/// Kind of Starknet transaction requested from `POST /sign-transaction`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Execute one or more contract calls from the account.
    #[default]
    Invoke,
    /// Declare a new contract class.
    Declare,
    /// Deploy an instance of a declared class through the Universal Deployer.
    Deploy,
}

/// Error returned when a transaction type string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedTransactionType(pub String);

impl fmt::Display for UnsupportedTransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported transaction type: {}", self.0)
    }
}

impl std::error::Error for UnsupportedTransactionType {}

impl FromStr for TransactionType {
    type Err = UnsupportedTransactionType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "invoke" => Ok(TransactionType::Invoke),
            "declare" => Ok(TransactionType::Declare),
            "deploy" => Ok(TransactionType::Deploy),
            other => Err(UnsupportedTransactionType(other.to_owned())),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransactionType::Invoke => "invoke",
            TransactionType::Declare => "declare",
            TransactionType::Deploy => "deploy",
        })
    }
}

/// Request body for `POST /sign-transaction`.
///
/// `transaction_type` stays a raw JSON value so that an unknown value is
/// reported as "Unsupported transaction type" instead of a generic JSON
/// error. It defaults to `invoke` only when the field is absent; an explicit
/// `null` deserialises to `Some(Value::Null)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignTransactionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_private_key: Option<String>,
    /// Account contract address (hex felt).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Type-specific payload; see the gateway's payload module for shapes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_data: Option<serde_json::Value>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub transaction_type: Option<serde_json::Value>,
}

/// Any value that is present, `null` included.
fn present<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

/// Successful response body for `POST /sign-transaction`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignTransactionResponse {
    pub success: bool,
    /// Hex-encoded transaction hash.
    pub transaction_hash: String,
    /// Chain client result, e.g. `{"transaction_hash": …, "class_hash": …}`.
    pub transaction: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Token verification endpoint
// ---------------------------------------------------------------------------

/// Request body for `POST /verify`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyRequest {
    /// Identity-provider ID token (JWT).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Successful response body for `POST /verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Standard error response body returned on any non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,
    /// Short machine-readable error code (e.g. `"bad_request"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub error: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            code: code.into(),
            error: error.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Overall service status: `"ok"` or `"degraded"`.
    pub status: String,
    /// Whether `ENCRYPTION_SECRET` is set.
    pub secret_configured: bool,
    /// Whether a chain signer is available.
    pub signer_configured: bool,
    /// Whether ID token verification is available.
    pub verifier_configured: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encrypt_request_uses_camel_case() {
        let req: EncryptRequest = serde_json::from_value(json!({"plainText": "x"})).unwrap();
        assert_eq!(req.plain_text.as_deref(), Some("x"));
    }

    #[test]
    fn missing_fields_deserialise_to_none() {
        let req: EncryptRequest = serde_json::from_value(json!({})).unwrap();
        assert!(req.plain_text.is_none());

        let req: SignTransactionRequest = serde_json::from_value(json!({})).unwrap();
        assert!(req.encrypted_private_key.is_none());
        assert!(req.transaction_type.is_none());
    }

    #[test]
    fn encrypt_response_field_names() {
        let resp = EncryptResponse {
            success: true,
            encrypted_data: "a:b:c".into(),
        };
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v, json!({"success": true, "encryptedData": "a:b:c"}));
    }

    #[test]
    fn sign_request_wire_names() {
        let req = SignTransactionRequest {
            encrypted_private_key: Some("iv:tag:ct".into()),
            address: Some("0x1".into()),
            transaction_data: Some(json!({"calls": []})),
            transaction_type: Some("invoke".into()),
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["encryptedPrivateKey"], "iv:tag:ct");
        assert_eq!(v["transactionData"], json!({"calls": []}));
        assert_eq!(v["transactionType"], "invoke");
    }

    #[test]
    fn explicit_null_transaction_type_is_kept() {
        let req: SignTransactionRequest =
            serde_json::from_value(json!({"transactionType": null})).unwrap();
        assert_eq!(req.transaction_type, Some(serde_json::Value::Null));

        let req: SignTransactionRequest =
            serde_json::from_value(json!({"transactionType": ""})).unwrap();
        assert_eq!(req.transaction_type, Some(json!("")));
    }

    #[test]
    fn transaction_type_parse_and_display() {
        for (s, t) in [
            ("invoke", TransactionType::Invoke),
            ("declare", TransactionType::Declare),
            ("deploy", TransactionType::Deploy),
        ] {
            assert_eq!(s.parse::<TransactionType>().unwrap(), t);
            assert_eq!(t.to_string(), s);
        }
        assert!("transfer".parse::<TransactionType>().is_err());
        assert_eq!(TransactionType::default(), TransactionType::Invoke);
    }

    #[test]
    fn error_response_new() {
        let e = ErrorResponse::new("bad_request", "Plain text is required");
        assert!(!e.success);
        assert_eq!(e.code, "bad_request");
        assert!(e.error.contains("Plain text"));
    }

    #[test]
    fn health_response_serde() {
        let h = HealthResponse {
            status: "ok".into(),
            secret_configured: true,
            signer_configured: false,
            verifier_configured: false,
        };
        let v = serde_json::to_value(&h).unwrap();
        assert_eq!(v["secretConfigured"], true);
        assert_eq!(v["signerConfigured"], false);
    }
}
