//! Typed transaction payloads parsed from the untyped `transactionData` field.
//!
//! Accepted shapes, per transaction type:
//!
//! - `invoke`: `{"calls": [call, …]}`, `[call, …]` or a single `call`, where a
//!   call is `{"contractAddress", "entrypoint", "calldata"?}`.
//! - `declare`: `{"contract": <sierra artifact>, "compiledClassHash"}` or
//!   `{"contract": …, "casm": <casm artifact>}`.
//! - `deploy`: `{"classHash", "constructorCalldata"?, "salt"?, "unique"?}`.
//!
//! Felts are accepted as `0x`-prefixed hex strings, decimal strings, or JSON
//! integers.

use std::sync::Arc;

use common::TransactionType;
use serde::{de, Deserialize, Deserializer};
use starknet::core::{
    types::{
        contract::{CompiledClass, SierraClass},
        Call, Felt, FlattenedSierraClass,
    },
    utils::get_selector_from_name,
};
use thiserror::Error;

/// Errors raised while turning JSON into a [`TransactionPayload`].
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("invalid {kind} payload: {reason}")]
    Invalid {
        kind: TransactionType,
        reason: String,
    },

    #[error("invalid felt value: {0}")]
    InvalidFelt(String),
}

/// A validated transaction ready to hand to a signer.
#[derive(Debug, Clone)]
pub enum TransactionPayload {
    Invoke {
        calls: Vec<Call>,
    },
    Declare {
        contract: Arc<FlattenedSierraClass>,
        compiled_class_hash: Felt,
    },
    Deploy {
        class_hash: Felt,
        constructor_calldata: Vec<Felt>,
        /// `None` asks the signer to pick a random salt.
        salt: Option<Felt>,
        unique: bool,
    },
}

impl TransactionPayload {
    /// Parse `data` according to `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] if `data` does not match any accepted shape for
    /// `kind`, contains an unparseable felt, or names a non-ASCII entrypoint.
    pub fn parse(kind: TransactionType, data: serde_json::Value) -> Result<Self, PayloadError> {
        let invalid = |reason: String| PayloadError::Invalid { kind, reason };

        match kind {
            TransactionType::Invoke => {
                let calls = match serde_json::from_value::<InvokeData>(data)
                    .map_err(|e| invalid(e.to_string()))?
                {
                    InvokeData::Wrapped { calls } | InvokeData::Many(calls) => calls,
                    InvokeData::Single(call) => vec![call],
                };
                if calls.is_empty() {
                    return Err(invalid("at least one call is required".into()));
                }
                let calls = calls
                    .into_iter()
                    .map(|c| {
                        let selector = get_selector_from_name(&c.entrypoint)
                            .map_err(|_| invalid(format!("entrypoint {:?} is not ASCII", c.entrypoint)))?;
                        Ok(Call {
                            to: c.contract_address,
                            selector,
                            calldata: c.calldata,
                        })
                    })
                    .collect::<Result<Vec<_>, PayloadError>>()?;
                Ok(TransactionPayload::Invoke { calls })
            }
            TransactionType::Declare => {
                let raw: DeclareData =
                    serde_json::from_value(data).map_err(|e| invalid(e.to_string()))?;
                let sierra: SierraClass =
                    serde_json::from_value(raw.contract).map_err(|e| invalid(format!("contract: {e}")))?;
                let contract = sierra
                    .flatten()
                    .map_err(|e| invalid(format!("contract: {e}")))?;

                let compiled_class_hash = match (raw.compiled_class_hash, raw.casm) {
                    (Some(hash), _) => hash,
                    (None, Some(casm)) => {
                        let compiled: CompiledClass = serde_json::from_value(casm)
                            .map_err(|e| invalid(format!("casm: {e}")))?;
                        compiled
                            .class_hash()
                            .map_err(|e| invalid(format!("casm: {e}")))?
                    }
                    (None, None) => {
                        return Err(invalid("compiledClassHash or casm is required".into()))
                    }
                };

                Ok(TransactionPayload::Declare {
                    contract: Arc::new(contract),
                    compiled_class_hash,
                })
            }
            TransactionType::Deploy => {
                let raw: DeployData =
                    serde_json::from_value(data).map_err(|e| invalid(e.to_string()))?;
                Ok(TransactionPayload::Deploy {
                    class_hash: raw.class_hash,
                    constructor_calldata: raw.constructor_calldata,
                    salt: raw.salt,
                    unique: raw.unique,
                })
            }
        }
    }

    pub fn kind(&self) -> TransactionType {
        match self {
            TransactionPayload::Invoke { .. } => TransactionType::Invoke,
            TransactionPayload::Declare { .. } => TransactionType::Declare,
            TransactionPayload::Deploy { .. } => TransactionType::Deploy,
        }
    }
}

/// Parse an account address or other single felt supplied as text.
pub fn parse_felt(text: &str) -> Result<Felt, PayloadError> {
    let text = text.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) if !hex.is_empty() => Felt::from_hex(&format!("0x{hex}")),
        None if !text.is_empty() => Felt::from_dec_str(text),
        _ => return Err(PayloadError::InvalidFelt(text.to_owned())),
    };
    parsed.map_err(|_| PayloadError::InvalidFelt(text.to_owned()))
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum InvokeData {
    Wrapped { calls: Vec<CallData> },
    Many(Vec<CallData>),
    Single(CallData),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallData {
    #[serde(deserialize_with = "felt")]
    contract_address: Felt,
    entrypoint: String,
    #[serde(default, deserialize_with = "felts")]
    calldata: Vec<Felt>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeclareData {
    contract: serde_json::Value,
    #[serde(default, deserialize_with = "optional_felt")]
    compiled_class_hash: Option<Felt>,
    #[serde(default)]
    casm: Option<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeployData {
    #[serde(deserialize_with = "felt")]
    class_hash: Felt,
    #[serde(default, deserialize_with = "felts")]
    constructor_calldata: Vec<Felt>,
    #[serde(default, deserialize_with = "optional_felt")]
    salt: Option<Felt>,
    #[serde(default = "default_unique")]
    unique: bool,
}

fn default_unique() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FeltRepr {
    Text(String),
    Number(u64),
}

impl FeltRepr {
    fn into_felt(self) -> Result<Felt, PayloadError> {
        match self {
            FeltRepr::Text(s) => parse_felt(&s),
            FeltRepr::Number(n) => Ok(Felt::from(n)),
        }
    }
}

fn felt<'de, D: Deserializer<'de>>(d: D) -> Result<Felt, D::Error> {
    FeltRepr::deserialize(d)?
        .into_felt()
        .map_err(de::Error::custom)
}

fn felts<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Felt>, D::Error> {
    Vec::<FeltRepr>::deserialize(d)?
        .into_iter()
        .map(FeltRepr::into_felt)
        .collect::<Result<_, _>>()
        .map_err(de::Error::custom)
}

fn optional_felt<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Felt>, D::Error> {
    Option::<FeltRepr>::deserialize(d)?
        .map(FeltRepr::into_felt)
        .transpose()
        .map_err(de::Error::custom)
}
