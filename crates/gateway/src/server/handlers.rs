//! Axum request handlers for all service endpoints.
//!
//! Bodies are extracted as `Result<Json<T>, JsonRejection>` so that invalid
//! JSON is answered with the same error body as every other failure. Empty
//! strings count as missing fields.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use common::{
    protocol::{
        DecryptRequest, DecryptResponse, EncryptRequest, EncryptResponse, ErrorResponse,
        HealthResponse, SignTransactionRequest, SignTransactionResponse, VerifyRequest,
        VerifyResponse,
    },
    ServiceError, TransactionType,
};
use tracing::debug;

use super::{error::ApiError, state::AppState};
use crate::signing::{parse_felt, TransactionPayload};

type ApiResult<T> = Result<Json<T>, ApiError>;

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ServiceError> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        debug!(reason = %rejection.body_text(), "request body rejected");
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServiceError::PayloadTooLarge
        } else {
            ServiceError::BadRequest("Invalid JSON body".into())
        }
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn required(value: Option<String>, message: &str) -> Result<String, ServiceError> {
    non_empty(value).ok_or_else(|| ServiceError::BadRequest(message.into()))
}

/// `POST /encrypt`: Seal `plainText` into an envelope string.
pub async fn encrypt(
    State(state): State<AppState>,
    payload: Result<Json<EncryptRequest>, JsonRejection>,
) -> ApiResult<EncryptResponse> {
    let req = body(payload)?;
    let plain_text = required(req.plain_text, "Plain text is required")?;
    let encrypted_data = state.codec()?.encrypt(&plain_text)?;

    Ok(Json(EncryptResponse {
        success: true,
        encrypted_data,
    }))
}

/// `POST /decrypt`: Open an envelope produced by `/encrypt`.
///
/// Malformed and tampered envelopes produce the same response.
pub async fn decrypt(
    State(state): State<AppState>,
    payload: Result<Json<DecryptRequest>, JsonRejection>,
) -> ApiResult<DecryptResponse> {
    let req = body(payload)?;
    let encrypted_data = required(req.encrypted_data, "Encrypted data is required")?;
    let plain = state.codec()?.decrypt(&encrypted_data)?;

    Ok(Json(DecryptResponse {
        success: true,
        decrypted_data: plain.expose().to_owned(),
    }))
}

/// `POST /sign-transaction`: Decrypt the caller's key and sign one transaction.
pub async fn sign_transaction(
    State(state): State<AppState>,
    payload: Result<Json<SignTransactionRequest>, JsonRejection>,
) -> ApiResult<SignTransactionResponse> {
    let req = body(payload)?;
    let (Some(encrypted_key), Some(address), Some(data)) = (
        non_empty(req.encrypted_private_key),
        non_empty(req.address),
        req.transaction_data.filter(|v| !v.is_null()),
    ) else {
        return Err(ServiceError::BadRequest("Missing required parameters".into()).into());
    };
    let codec = state.codec()?;

    // Only an absent field defaults; `null`, `""` and non-strings are rejected.
    let kind = match req.transaction_type {
        None => TransactionType::default(),
        Some(raw) => raw
            .as_str()
            .and_then(|s| s.parse::<TransactionType>().ok())
            .ok_or_else(|| ServiceError::BadRequest("Unsupported transaction type".into()))?,
    };
    let address = parse_felt(&address)
        .map_err(|_| ServiceError::BadRequest("Invalid account address".into()))?;
    let payload = TransactionPayload::parse(kind, data)
        .map_err(|e| ServiceError::BadRequest(format!("Invalid transaction data: {e}")))?;

    let signed = state
        .signing()?
        .sign_transaction(codec, &encrypted_key, address, payload)
        .await?;

    Ok(Json(SignTransactionResponse {
        success: true,
        transaction_hash: format!("{:#x}", signed.transaction_hash),
        transaction: signed.transaction,
    }))
}

/// `POST /verify`: Verify a Firebase ID token.
pub async fn verify(
    State(state): State<AppState>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> ApiResult<VerifyResponse> {
    let req = body(payload)?;
    let token = required(req.token, "No token provided")?;
    let identity = state.verifier()?.verify(&token).await?;

    Ok(Json(VerifyResponse {
        valid: true,
        uid: identity.uid,
        email: identity.email,
    }))
}

/// `GET /health`: Liveness plus which optional components are configured.
///
/// Always `200 OK`; `status` is `"degraded"` when no encryption secret is set.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let secret_configured = state.codec().is_ok();
    Json(HealthResponse {
        status: if secret_configured { "ok" } else { "degraded" }.into(),
        secret_configured,
        signer_configured: state.signing().is_ok(),
        verifier_configured: state.verifier().is_ok(),
    })
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("not_found", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}
