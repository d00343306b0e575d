//! [`TransactionSigner`] backed by a Starknet JSON-RPC endpoint.
//!
//! A fresh provider and `SingleOwnerAccount` are built for each call, so no
//! key material outlives the request. Fee estimation, nonce lookup, hashing
//! and ECDSA signing are done by the `starknet` crate.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use starknet::{
    accounts::{Account, ExecutionEncoding, SingleOwnerAccount},
    contract::ContractFactory,
    core::{
        types::{BlockId, BlockTag, Felt},
        utils::cairo_short_string_to_felt,
    },
    providers::{
        jsonrpc::{HttpTransport, JsonRpcClient},
        Provider, Url,
    },
    signers::{LocalWallet, SigningKey},
};
use tracing::debug;

use super::{parse_felt, SignedTransaction, SignerError, TransactionPayload, TransactionSigner};
use crate::crypto::Plaintext;

/// Signs with a single-owner account contract over Starknet JSON-RPC.
#[derive(Debug, Clone)]
pub struct StarknetSigner {
    rpc_url: Url,
    /// Fetched from the provider on every call when `None`.
    chain_id: Option<Felt>,
}

impl StarknetSigner {
    /// Build a signer for `rpc_url`.
    ///
    /// `chain_id` may be a hex felt (`0x534e5f5345504f4c4941`) or a Cairo short
    /// string (`SN_SEPOLIA`).
    ///
    /// # Errors
    ///
    /// Returns an error if the URL or chain id cannot be parsed.
    pub fn new(rpc_url: &str, chain_id: Option<&str>) -> Result<Self> {
        let rpc_url = Url::parse(rpc_url).context("STARKNET_RPC_URL is not a valid URL")?;
        let chain_id = chain_id
            .map(parse_chain_id)
            .transpose()
            .context("STARKNET_CHAIN_ID is neither a hex felt nor a short string")?;
        Ok(Self { rpc_url, chain_id })
    }
}

fn parse_chain_id(value: &str) -> Result<Felt> {
    let value = value.trim();
    if value.starts_with("0x") {
        return Felt::from_hex(value).map_err(|e| anyhow::anyhow!("{e}"));
    }
    cairo_short_string_to_felt(value).map_err(|e| anyhow::anyhow!("{e}"))
}

fn chain_error(err: impl std::fmt::Display) -> SignerError {
    SignerError::Chain(err.to_string())
}

fn hex(felt: Felt) -> String {
    format!("{felt:#x}")
}

#[async_trait]
impl TransactionSigner for StarknetSigner {
    async fn sign(
        &self,
        private_key: &Plaintext,
        address: Felt,
        payload: TransactionPayload,
    ) -> Result<SignedTransaction, SignerError> {
        let secret = parse_felt(private_key.expose()).map_err(|_| SignerError::InvalidKey)?;
        if secret == Felt::ZERO {
            return Err(SignerError::InvalidKey);
        }
        let wallet = LocalWallet::from(SigningKey::from_secret_scalar(secret));

        let provider = JsonRpcClient::new(HttpTransport::new(self.rpc_url.clone()));
        let chain_id = match self.chain_id {
            Some(id) => id,
            None => provider.chain_id().await.map_err(chain_error)?,
        };

        let mut account =
            SingleOwnerAccount::new(provider, wallet, address, chain_id, ExecutionEncoding::New);
        account.set_block_id(BlockId::Tag(BlockTag::Pending));

        match payload {
            TransactionPayload::Invoke { calls } => {
                debug!(calls = calls.len(), "submitting invoke");
                let result = account.execute_v3(calls).send().await.map_err(chain_error)?;
                Ok(SignedTransaction {
                    transaction_hash: result.transaction_hash,
                    transaction: json!({ "transaction_hash": hex(result.transaction_hash) }),
                })
            }
            TransactionPayload::Declare {
                contract,
                compiled_class_hash,
            } => {
                debug!("submitting declare");
                let result = account
                    .declare_v3(contract, compiled_class_hash)
                    .send()
                    .await
                    .map_err(chain_error)?;
                Ok(SignedTransaction {
                    transaction_hash: result.transaction_hash,
                    transaction: json!({
                        "transaction_hash": hex(result.transaction_hash),
                        "class_hash": hex(result.class_hash),
                    }),
                })
            }
            TransactionPayload::Deploy {
                class_hash,
                constructor_calldata,
                salt,
                unique,
            } => {
                let salt = salt.unwrap_or_else(|| SigningKey::from_random().secret_scalar());
                let factory = ContractFactory::new(class_hash, account);
                let deployment = factory.deploy_v3(constructor_calldata, salt, unique);
                let contract_address = deployment.deployed_address();
                debug!(contract_address = %hex(contract_address), "submitting deploy");

                let result = deployment.send().await.map_err(chain_error)?;
                Ok(SignedTransaction {
                    transaction_hash: result.transaction_hash,
                    transaction: json!({
                        "transaction_hash": hex(result.transaction_hash),
                        "contract_address": hex(contract_address),
                    }),
                })
            }
        }
    }
}
