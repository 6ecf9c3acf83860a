//! Typed payload and broadcast endpoints.
//!
//! The payload endpoints return an opaque unsigned transaction. For EVM
//! chains it is the transaction fields themselves; for Solana it carries a
//! base64 transaction under `solTransferData`. The broadcast endpoint takes
//! the signed transaction text plus the operation's metadata.

use crate::client::GatewayClient;
use crate::error::RpcError;
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub mod endpoints {
    pub const WITHDRAWAL_DATA: &str = "/web3/wallet/withdrawalData";
    pub const SWAP_DATA: &str = "/web3/swap/getSwapData";
    pub const APPROVE_DATA: &str = "/web3/swap/approve";
    pub const BROADCAST: &str = "/web3/wallet/broadcast";
}

// =============================================================================
// Request Types
// =============================================================================

/// Body of a transfer (withdrawal) payload request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub chain_id: String,
    /// Token contract; `None` for the native asset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
    pub to_address: String,
    pub qty: String,
    pub from_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
}

/// Body of a swap payload request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest {
    pub chain_id: String,
    pub from_token_address: String,
    pub to_token_address: String,
    pub amount: String,
    pub slippage: String,
    pub from_address: String,
    /// Quote previously returned by the aggregator, passed through verbatim.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub quote_response: Value,
}

/// Body of a token-approval payload request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveRequest {
    pub chain_id: String,
    pub from_token_address: String,
    pub to_token_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
}

/// Operation tag echoed to the broadcast service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationType {
    Send,
    Swap,
    Approve,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationType::Send => "Send",
            OperationType::Swap => "Swap",
            OperationType::Approve => "Approve",
        };
        f.write_str(s)
    }
}

/// Body of a broadcast request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastRequest {
    pub chain_id: String,
    pub from_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
    /// Signed transaction: `0x` hex for EVM, base58 for Solana.
    pub transaction_data: String,
    #[serde(rename = "type")]
    pub operation: OperationType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qty: Option<String>,
    pub wallet_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_from_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_to_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_from_qty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_to_qty: Option<String>,
}

// =============================================================================
// Response Types
// =============================================================================

/// Broadcast result. The hash field name varies between deployments.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastReceipt {
    #[serde(default, alias = "hash", alias = "txId", alias = "signature")]
    pub tx_hash: Option<String>,
    /// Catch-all for additional fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl BroadcastReceipt {
    fn from_value(value: Value) -> Result<Self, RpcError> {
        match value {
            Value::String(hash) => Ok(Self {
                tx_hash: Some(hash),
                extra: Default::default(),
            }),
            other => Ok(serde_json::from_value(other)?),
        }
    }
}

// =============================================================================
// Endpoint Methods
// =============================================================================

impl GatewayClient {
    /// Unsigned transfer payload.
    pub async fn withdrawal_data(&self, req: &WithdrawalRequest) -> Result<Value, RpcError> {
        self.post(endpoints::WITHDRAWAL_DATA, &serde_json::to_value(req)?)
            .await
    }

    /// Unsigned swap payload.
    pub async fn swap_data(&self, req: &SwapRequest) -> Result<Value, RpcError> {
        self.post(endpoints::SWAP_DATA, &serde_json::to_value(req)?).await
    }

    /// Unsigned approval payload.
    pub async fn approve_data(&self, req: &ApproveRequest) -> Result<Value, RpcError> {
        self.post(endpoints::APPROVE_DATA, &serde_json::to_value(req)?)
            .await
    }

    /// Submit a signed transaction.
    pub async fn broadcast(&self, req: &BroadcastRequest) -> Result<BroadcastReceipt, RpcError> {
        let value = self
            .post(endpoints::BROADCAST, &serde_json::to_value(req)?)
            .await?;
        let receipt = BroadcastReceipt::from_value(value)?;
        info!(
            "broadcast {} on chain {} from {}: {}",
            req.operation,
            req.chain_id,
            req.from_address,
            receipt.tx_hash.as_deref().unwrap_or("<no hash>")
        );
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_withdrawal_body_field_names() {
        let req = WithdrawalRequest {
            chain_id: "56".into(),
            contract_address: None,
            to_address: "0xto".into(),
            qty: "1.5".into(),
            from_address: "0xfrom".into(),
            gas_limit: Some("21000".into()),
            nonce: Some(7),
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "chainId": "56",
                "toAddress": "0xto",
                "qty": "1.5",
                "fromAddress": "0xfrom",
                "gasLimit": "21000",
                "nonce": 7
            })
        );
    }

    #[test]
    fn test_swap_body_passes_quote_through() {
        let req = SwapRequest {
            chain_id: "solana".into(),
            from_token_address: "So11111111111111111111111111111111111111112".into(),
            to_token_address: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".into(),
            amount: "1000000".into(),
            slippage: "0.5".into(),
            from_address: "HAgk14JpMQLgt6rVgv7cBQFJWFto5Dqxi472uT3DKpqk".into(),
            quote_response: json!({"routePlan": []}),
        };
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["fromTokenAddress"], "So11111111111111111111111111111111111111112");
        assert_eq!(body["quoteResponse"], json!({"routePlan": []}));
    }

    #[test]
    fn test_broadcast_body_uses_type_tag() {
        let req = BroadcastRequest {
            chain_id: "1".into(),
            from_address: "0xfrom".into(),
            to_address: Some("0xto".into()),
            contract_address: None,
            transaction_data: "0x02f8".into(),
            operation: OperationType::Swap,
            qty: None,
            wallet_id: "w".into(),
            member_id: Some("m".into()),
            swap_from_address: Some("0xa".into()),
            swap_to_address: Some("0xb".into()),
            swap_from_qty: Some("1".into()),
            swap_to_qty: Some("2".into()),
        };
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["type"], "Swap");
        assert_eq!(body["transactionData"], "0x02f8");
        assert_eq!(body["swapToQty"], "2");
        assert!(body.get("qty").is_none());
    }

    #[test]
    fn test_receipt_forms() {
        let r = BroadcastReceipt::from_value(json!("0xhash")).unwrap();
        assert_eq!(r.tx_hash.as_deref(), Some("0xhash"));

        let r = BroadcastReceipt::from_value(json!({"hash": "abc", "status": 1})).unwrap();
        assert_eq!(r.tx_hash.as_deref(), Some("abc"));
        assert_eq!(r.extra["status"], 1);

        let r = BroadcastReceipt::from_value(json!({})).unwrap();
        assert!(r.tx_hash.is_none());
    }
}
