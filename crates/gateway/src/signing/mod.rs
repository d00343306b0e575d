//! Delegated transaction signing.
//!
//! The caller sends an encrypted private key; the key is opened in-process,
//! handed to a [`TransactionSigner`] for exactly one transaction, and dropped
//! (zeroed) as soon as the signer returns. Chain-specific construction and
//! curve arithmetic live behind the signer trait.
//!
//! # Invariants
//!
//! - The plaintext key never leaves this module and is never logged.
//! - Failures are not retried: resubmitting a signed transaction is the
//!   caller's decision.
//! - Every signer call is bounded by an explicit timeout.

pub mod chain;
pub mod payload;

pub use chain::StarknetSigner;
pub use payload::{parse_felt, TransactionPayload};

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use common::ServiceError;
use starknet::core::types::Felt;
use thiserror::Error;
use tracing::info;

use crate::crypto::{EnvelopeCodec, Plaintext};

/// Errors returned by a [`TransactionSigner`].
#[derive(Debug, Error)]
pub enum SignerError {
    /// The decrypted key is not a valid signing key for the chain.
    #[error("decrypted private key is not a valid signing key")]
    InvalidKey,

    /// The RPC endpoint or account contract rejected the transaction.
    #[error("chain error: {0}")]
    Chain(String),

    /// The signer did not answer within the configured timeout.
    #[error("signing timed out after {0:?}")]
    Timeout(Duration),
}

/// Result of a successful signing call.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub transaction_hash: Felt,
    /// Chain client result, serialised for the response body.
    pub transaction: serde_json::Value,
}

/// Narrow seam to the external chain client.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Sign and submit `payload` from the account at `address`.
    async fn sign(
        &self,
        private_key: &Plaintext,
        address: Felt,
        payload: TransactionPayload,
    ) -> Result<SignedTransaction, SignerError>;
}

/// Decrypts a private-key envelope and drives one [`TransactionSigner`] call.
#[derive(Clone)]
pub struct SigningService {
    signer: Arc<dyn TransactionSigner>,
    timeout: Duration,
}

impl SigningService {
    pub fn new(signer: Arc<dyn TransactionSigner>, timeout: Duration) -> Self {
        Self { signer, timeout }
    }

    /// Open `encrypted_key` with `codec` and sign `payload` for `address`.
    ///
    /// # Errors
    ///
    /// Every failure, including a malformed or tampered envelope, is reported
    /// as [`ServiceError::SigningFailed`]; the detail is only in its `Display`.
    pub async fn sign_transaction(
        &self,
        codec: &EnvelopeCodec,
        encrypted_key: &str,
        address: Felt,
        payload: TransactionPayload,
    ) -> Result<SignedTransaction, ServiceError> {
        let private_key = codec
            .decrypt(encrypted_key)
            .map_err(|e| ServiceError::SigningFailed(format!("private key envelope: {e}")))?;

        let kind = payload.kind();
        let outcome = tokio::time::timeout(
            self.timeout,
            self.signer.sign(&private_key, address, payload),
        )
        .await;
        drop(private_key);

        let signed = match outcome {
            Ok(Ok(signed)) => signed,
            Ok(Err(e)) => return Err(ServiceError::SigningFailed(e.to_string())),
            Err(_) => {
                return Err(ServiceError::SigningFailed(
                    SignerError::Timeout(self.timeout).to_string(),
                ))
            }
        };

        info!(
            transaction_type = %kind,
            transaction_hash = %format!("{:#x}", signed.transaction_hash),
            "transaction submitted"
        );
        Ok(signed)
    }
}
