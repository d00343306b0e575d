//! HTTP client for the keyguard-svc gateway.
//!
//! Wraps the gateway's JSON routes so callers never handle plaintext keys
//! beyond the initial `encrypt_private_key` call: signing always sends the
//! envelope, and the gateway decrypts it server-side.

use common::protocol::{
    DecryptRequest, DecryptResponse, EncryptRequest, EncryptResponse, ErrorResponse,
    SignTransactionRequest, SignTransactionResponse,
};
use common::TransactionType;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors returned by [`TransactionService`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid gateway URL: {0}")]
    InvalidBaseUrl(String),

    /// The request never produced an HTTP answer, or the answer was not JSON.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The gateway answered with a non-2xx status.
    #[error("gateway returned {status}: {message}")]
    Api { status: u16, message: String },
}

/// Client for the encrypt, decrypt and sign-transaction routes.
#[derive(Debug, Clone)]
pub struct TransactionService {
    base_url: String,
    client: reqwest::Client,
}

impl TransactionService {
    /// Create a client for the gateway at `base_url`, e.g. `https://keyguard.internal:8080`.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Like [`TransactionService::new`] with a preconfigured `reqwest` client.
    pub fn with_client(base_url: &str, client: reqwest::Client) -> Result<Self, ClientError> {
        reqwest::Url::parse(base_url).map_err(|e| ClientError::InvalidBaseUrl(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            client,
        })
    }

    /// Seal a private key and return its envelope string.
    pub async fn encrypt_private_key(&self, private_key: &str) -> Result<String, ClientError> {
        let body = EncryptRequest {
            plain_text: Some(private_key.to_owned()),
        };
        let resp: EncryptResponse = self.post("encrypt", &body).await?;
        Ok(resp.encrypted_data)
    }

    pub async fn decrypt_private_key(&self, encrypted: &str) -> Result<String, ClientError> {
        let body = DecryptRequest {
            encrypted_data: Some(encrypted.to_owned()),
        };
        let resp: DecryptResponse = self.post("decrypt", &body).await?;
        Ok(resp.decrypted_data)
    }

    /// Have the gateway decrypt `encrypted_private_key` and sign one transaction.
    pub async fn sign_transaction(
        &self,
        encrypted_private_key: &str,
        address: &str,
        transaction_data: Value,
        transaction_type: TransactionType,
    ) -> Result<SignTransactionResponse, ClientError> {
        let body = SignTransactionRequest {
            encrypted_private_key: Some(encrypted_private_key.to_owned()),
            address: Some(address.to_owned()),
            transaction_data: Some(transaction_data),
            transaction_type: Some(Value::String(transaction_type.to_string())),
        };
        self.post("sign-transaction", &body).await
    }

    /// Invoke `calls` (each `{contractAddress, entrypoint, calldata}`) from `address`.
    pub async fn execute_transaction(
        &self,
        encrypted_private_key: &str,
        address: &str,
        calls: Vec<Value>,
    ) -> Result<SignTransactionResponse, ClientError> {
        self.sign_transaction(
            encrypted_private_key,
            address,
            json!({ "calls": calls }),
            TransactionType::Invoke,
        )
        .await
    }

    pub async fn declare_contract(
        &self,
        encrypted_private_key: &str,
        address: &str,
        contract_data: Value,
    ) -> Result<SignTransactionResponse, ClientError> {
        self.sign_transaction(
            encrypted_private_key,
            address,
            contract_data,
            TransactionType::Declare,
        )
        .await
    }

    pub async fn deploy_contract(
        &self,
        encrypted_private_key: &str,
        address: &str,
        contract_data: Value,
    ) -> Result<SignTransactionResponse, ClientError> {
        self.sign_transaction(
            encrypted_private_key,
            address,
            contract_data,
            TransactionType::Deploy,
        )
        .await
    }

    async fn post<B, R>(&self, endpoint: &str, body: &B) -> Result<R, ClientError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{endpoint}", self.base_url);
        debug!(endpoint, "calling gateway");
        let response = self.client.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorResponse>()
                .await
                .map(|e| e.error)
                .unwrap_or_else(|_| "Request failed".into());
            warn!(endpoint, status = status.as_u16(), %message, "gateway request failed");
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}
