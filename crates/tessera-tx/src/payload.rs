//! Unsigned payloads from the payload service and their signed form.

use crate::eip1559::Eip1559Transaction;
use crate::quantity::{de_u128, de_u64};
use crate::solana::SolanaTransaction;
use crate::TxError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tessera_crypto::{evm, solana};
use tessera_types::ChainVariant;

/// Field carrying the base64 transaction in Solana responses.
pub const SOLANA_TX_FIELD: &str = "solTransferData";

/// EVM transaction fields as the payload service returns them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmPayload {
    #[serde(deserialize_with = "de_u64")]
    pub chain_id: u64,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default, deserialize_with = "de_u128")]
    pub value: u128,
    #[serde(deserialize_with = "de_u128")]
    pub max_fee_per_gas: u128,
    #[serde(deserialize_with = "de_u128")]
    pub max_priority_fee_per_gas: u128,
    #[serde(alias = "gasLimit", deserialize_with = "de_u64")]
    pub gas: u64,
    #[serde(deserialize_with = "de_u64")]
    pub nonce: u64,
    #[serde(default)]
    pub data: Option<String>,
}

impl EvmPayload {
    /// Build the typed transaction, validating addresses and calldata.
    pub fn to_transaction(&self) -> Result<Eip1559Transaction, TxError> {
        let to = match self.to.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(addr) => Some(parse_address(addr)?),
        };
        let data = match self.data.as_deref().map(str::trim) {
            None | Some("") | Some("0x") => Vec::new(),
            Some(hex_data) => {
                let digits = hex_data.strip_prefix("0x").unwrap_or(hex_data);
                hex::decode(digits).map_err(|e| TxError::Parse(format!("data: {e}")))?
            }
        };

        Ok(Eip1559Transaction {
            chain_id: self.chain_id,
            nonce: self.nonce,
            max_priority_fee_per_gas: self.max_priority_fee_per_gas,
            max_fee_per_gas: self.max_fee_per_gas,
            gas_limit: self.gas,
            to,
            value: self.value,
            data,
        })
    }
}

fn parse_address(addr: &str) -> Result<[u8; 20], TxError> {
    let digits = addr
        .strip_prefix("0x")
        .or_else(|| addr.strip_prefix("0X"))
        .ok_or_else(|| TxError::Parse(format!("address {addr} lacks 0x prefix")))?;
    let bytes = hex::decode(digits).map_err(|e| TxError::Parse(format!("address {addr}: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| TxError::Parse(format!("address {addr} is not 20 bytes")))
}

/// An unsigned transaction for one chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsignedPayload {
    Evm(EvmPayload),
    /// Base64 of a serialized (versioned or legacy) transaction.
    Solana(String),
}

impl UnsignedPayload {
    pub fn variant(&self) -> ChainVariant {
        match self {
            UnsignedPayload::Evm(_) => ChainVariant::Evm,
            UnsignedPayload::Solana(_) => ChainVariant::Solana,
        }
    }

    /// Interpret a payload-service response for the given chain.
    ///
    /// EVM responses are the transaction fields themselves; Solana
    /// responses carry the transaction under `solTransferData`.
    pub fn from_response(variant: ChainVariant, response: Value) -> Result<Self, TxError> {
        match variant {
            ChainVariant::Evm => serde_json::from_value(response)
                .map(UnsignedPayload::Evm)
                .map_err(|e| TxError::Parse(format!("EVM payload: {e}"))),
            ChainVariant::Solana => response
                .get(SOLANA_TX_FIELD)
                .and_then(Value::as_str)
                .map(|s| UnsignedPayload::Solana(s.to_string()))
                .ok_or_else(|| TxError::Parse(format!("Solana payload lacks {SOLANA_TX_FIELD}"))),
        }
    }
}

/// Broadcast-ready transaction text.
///
/// EVM: `0x`-prefixed hex of the typed envelope. Solana: base58 of the
/// serialized transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedPayload {
    pub variant: ChainVariant,
    pub signer: String,
    pub raw: String,
}

/// Sign an unsigned payload with a key in its vault encoding.
///
/// `signer` is the address the key is expected to control. A key that does
/// not derive to it, an EVM payload whose `from` names another account, or
/// a Solana transaction that does not list it as a signer all fail.
pub fn sign_with_secret(
    payload: &UnsignedPayload,
    secret: &str,
    signer: &str,
) -> Result<SignedPayload, TxError> {
    match payload {
        UnsignedPayload::Evm(evm_payload) => {
            let key = evm::signing_key_from_hex(secret)?;
            let address = evm::address_of(key.verifying_key());
            ensure_same_evm(signer, &address)?;
            if let Some(from) = evm_payload.from.as_deref() {
                ensure_same_evm(from, &address)?;
            }

            let signed = evm_payload.to_transaction()?.sign(&key)?;
            debug!("signed EVM transaction for {} on chain {}", address, evm_payload.chain_id);
            Ok(SignedPayload {
                variant: ChainVariant::Evm,
                signer: address,
                raw: signed.raw_hex(),
            })
        }
        UnsignedPayload::Solana(encoded) => {
            let key = solana::signing_key_from_base58(secret)?;
            let address = solana::address_of(&key.verifying_key());
            if signer != address {
                return Err(TxError::SignerMismatch {
                    expected: signer.to_string(),
                    actual: address,
                });
            }

            let bytes = BASE64
                .decode(encoded.trim())
                .map_err(|e| TxError::Parse(format!("base64: {e}")))?;
            let mut tx = SolanaTransaction::from_bytes(&bytes)?;
            let slot = tx.sign(&key)?;
            debug!("signed Solana transaction for {} in slot {}", address, slot);
            Ok(SignedPayload {
                variant: ChainVariant::Solana,
                signer: address,
                raw: bs58::encode(tx.to_bytes()).into_string(),
            })
        }
    }
}

fn ensure_same_evm(expected: &str, actual: &str) -> Result<(), TxError> {
    match evm::normalize_address(expected) {
        Some(normalized) if normalized == actual => Ok(()),
        _ => Err(TxError::SignerMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }),
    }
}
