//! Transfer, swap and approve workflows.
//!
//! Each workflow asks the payload service for an unsigned transaction,
//! signs it with the wallet's key for the requested chain, and only then
//! hands the signed text to the broadcast service together with the
//! operation's metadata.

use async_trait::async_trait;
use log::{debug, info};
use serde_json::Value;
use std::sync::Arc;
use tessera_rpc::{
    ApproveRequest, BroadcastReceipt, BroadcastRequest, GatewayClient, OperationType, RpcError,
    SwapRequest, WithdrawalRequest,
};
use tessera_tx::{SignedPayload, UnsignedPayload};
use tessera_types::{AddressEntry, ChainVariant, WalletId, WalletIdentity};

use crate::error::WalletError;
use crate::vault::SecureVault;
use crate::wallet::{AtomicIdAllocator, IdAllocator, WalletManager};

// =============================================================================
// Service seams
// =============================================================================

/// Produces unsigned transactions.
#[async_trait]
pub trait PayloadService: Send + Sync {
    async fn withdrawal_data(&self, req: &WithdrawalRequest) -> Result<Value, RpcError>;
    async fn swap_data(&self, req: &SwapRequest) -> Result<Value, RpcError>;
    async fn approve_data(&self, req: &ApproveRequest) -> Result<Value, RpcError>;
}

/// Submits signed transactions.
#[async_trait]
pub trait BroadcastService: Send + Sync {
    async fn broadcast(&self, req: &BroadcastRequest) -> Result<BroadcastReceipt, RpcError>;
}

#[async_trait]
impl PayloadService for GatewayClient {
    async fn withdrawal_data(&self, req: &WithdrawalRequest) -> Result<Value, RpcError> {
        GatewayClient::withdrawal_data(self, req).await
    }

    async fn swap_data(&self, req: &SwapRequest) -> Result<Value, RpcError> {
        GatewayClient::swap_data(self, req).await
    }

    async fn approve_data(&self, req: &ApproveRequest) -> Result<Value, RpcError> {
        GatewayClient::approve_data(self, req).await
    }
}

#[async_trait]
impl BroadcastService for GatewayClient {
    async fn broadcast(&self, req: &BroadcastRequest) -> Result<BroadcastReceipt, RpcError> {
        GatewayClient::broadcast(self, req).await
    }
}

#[async_trait]
impl<T: PayloadService + ?Sized> PayloadService for Arc<T> {
    async fn withdrawal_data(&self, req: &WithdrawalRequest) -> Result<Value, RpcError> {
        (**self).withdrawal_data(req).await
    }

    async fn swap_data(&self, req: &SwapRequest) -> Result<Value, RpcError> {
        (**self).swap_data(req).await
    }

    async fn approve_data(&self, req: &ApproveRequest) -> Result<Value, RpcError> {
        (**self).approve_data(req).await
    }
}

#[async_trait]
impl<T: BroadcastService + ?Sized> BroadcastService for Arc<T> {
    async fn broadcast(&self, req: &BroadcastRequest) -> Result<BroadcastReceipt, RpcError> {
        (**self).broadcast(req).await
    }
}

// =============================================================================
// Parameters
// =============================================================================

/// Swap legs echoed to the broadcast service for display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwapLegs {
    pub from_address: Option<String>,
    pub to_address: Option<String>,
    pub from_qty: Option<String>,
    pub to_qty: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferParams {
    pub wallet_id: WalletId,
    pub variant: ChainVariant,
    pub chain_id: String,
    /// Token contract; `None` for the native asset.
    pub contract_address: Option<String>,
    pub to_address: String,
    pub qty: String,
    pub gas_limit: Option<String>,
    pub nonce: Option<u64>,
    pub member_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwapParams {
    pub wallet_id: WalletId,
    pub variant: ChainVariant,
    pub chain_id: String,
    pub from_token_address: String,
    pub to_token_address: String,
    pub amount: String,
    pub slippage: String,
    pub quote_response: Value,
    pub to_address: Option<String>,
    pub contract_address: Option<String>,
    pub qty: Option<String>,
    pub member_id: Option<String>,
    pub legs: SwapLegs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApproveParams {
    pub wallet_id: WalletId,
    pub variant: ChainVariant,
    pub chain_id: String,
    pub from_token_address: String,
    pub to_token_address: String,
    pub gas_limit: Option<String>,
    pub nonce: Option<u64>,
    pub to_address: Option<String>,
    pub member_id: Option<String>,
    pub legs: SwapLegs,
}

/// A broadcast transaction and what the service said about it.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionOutcome {
    pub signed: SignedPayload,
    pub receipt: BroadcastReceipt,
}

// =============================================================================
// Orchestrator
// =============================================================================

pub struct TransactionOrchestrator<V, P, B, A = AtomicIdAllocator> {
    wallets: Arc<WalletManager<V, A>>,
    payloads: P,
    broadcaster: B,
}

impl<V, P, B, A> TransactionOrchestrator<V, P, B, A>
where
    V: SecureVault,
    P: PayloadService,
    B: BroadcastService,
    A: IdAllocator,
{
    pub fn new(wallets: Arc<WalletManager<V, A>>, payloads: P, broadcaster: B) -> Self {
        Self {
            wallets,
            payloads,
            broadcaster,
        }
    }

    pub fn wallets(&self) -> &Arc<WalletManager<V, A>> {
        &self.wallets
    }

    /// Send native coin or tokens.
    pub async fn transfer(&self, params: &TransferParams) -> Result<TransactionOutcome, WalletError> {
        let (identity, signer) = self.resolve(params.wallet_id, params.variant).await?;

        let request = WithdrawalRequest {
            chain_id: params.chain_id.clone(),
            contract_address: params.contract_address.clone(),
            to_address: params.to_address.clone(),
            qty: params.qty.clone(),
            from_address: signer.address.clone(),
            gas_limit: params.gas_limit.clone(),
            nonce: params.nonce,
        };
        let response = self.payloads.withdrawal_data(&request).await?;
        let signed = self.sign(&signer, response).await?;

        let broadcast = BroadcastRequest {
            chain_id: params.chain_id.clone(),
            from_address: signer.address.clone(),
            to_address: Some(params.to_address.clone()),
            contract_address: params.contract_address.clone(),
            transaction_data: signed.raw.clone(),
            operation: OperationType::Send,
            qty: Some(params.qty.clone()),
            wallet_id: identity.display_index().to_string(),
            member_id: params.member_id.clone(),
            swap_from_address: None,
            swap_to_address: None,
            swap_from_qty: None,
            swap_to_qty: None,
        };
        self.submit(&broadcast, signed).await
    }

    /// Swap one token for another through the aggregator quote.
    pub async fn swap(&self, params: &SwapParams) -> Result<TransactionOutcome, WalletError> {
        let (identity, signer) = self.resolve(params.wallet_id, params.variant).await?;

        let request = SwapRequest {
            chain_id: params.chain_id.clone(),
            from_token_address: params.from_token_address.clone(),
            to_token_address: params.to_token_address.clone(),
            amount: params.amount.clone(),
            slippage: params.slippage.clone(),
            from_address: signer.address.clone(),
            quote_response: params.quote_response.clone(),
        };
        let response = self.payloads.swap_data(&request).await?;
        let signed = self.sign(&signer, response).await?;

        let broadcast = BroadcastRequest {
            chain_id: params.chain_id.clone(),
            from_address: signer.address.clone(),
            to_address: params.to_address.clone(),
            contract_address: params.contract_address.clone(),
            transaction_data: signed.raw.clone(),
            operation: OperationType::Swap,
            qty: params.qty.clone(),
            wallet_id: identity.display_index().to_string(),
            member_id: params.member_id.clone(),
            swap_from_address: params.legs.from_address.clone(),
            swap_to_address: params.legs.to_address.clone(),
            swap_from_qty: params.legs.from_qty.clone(),
            swap_to_qty: params.legs.to_qty.clone(),
        };
        self.submit(&broadcast, signed).await
    }

    /// Grant a spender allowance on a token.
    pub async fn approve(&self, params: &ApproveParams) -> Result<TransactionOutcome, WalletError> {
        let (identity, signer) = self.resolve(params.wallet_id, params.variant).await?;

        let request = ApproveRequest {
            chain_id: params.chain_id.clone(),
            from_token_address: params.from_token_address.clone(),
            to_token_address: params.to_token_address.clone(),
            from_address: Some(signer.address.clone()),
            gas_limit: params.gas_limit.clone(),
            nonce: params.nonce,
        };
        let response = self.payloads.approve_data(&request).await?;
        let signed = self.sign(&signer, response).await?;

        let broadcast = BroadcastRequest {
            chain_id: params.chain_id.clone(),
            from_address: signer.address.clone(),
            to_address: params.to_address.clone(),
            contract_address: None,
            transaction_data: signed.raw.clone(),
            operation: OperationType::Approve,
            qty: None,
            wallet_id: identity.display_index().to_string(),
            member_id: params.member_id.clone(),
            swap_from_address: params.legs.from_address.clone(),
            swap_to_address: params.legs.to_address.clone(),
            swap_from_qty: params.legs.from_qty.clone(),
            swap_to_qty: params.legs.to_qty.clone(),
        };
        self.submit(&broadcast, signed).await
    }

    async fn resolve(
        &self,
        id: WalletId,
        variant: ChainVariant,
    ) -> Result<(WalletIdentity, AddressEntry), WalletError> {
        let identity = self
            .wallets
            .identity(id)
            .await
            .ok_or(WalletError::UnknownWallet(id))?;
        let signer = self.wallets.signer(id, variant).await?;
        Ok((identity, signer))
    }

    async fn sign(
        &self,
        signer: &AddressEntry,
        response: Value,
    ) -> Result<SignedPayload, WalletError> {
        let payload = UnsignedPayload::from_response(signer.variant, response)
            .map_err(|e| WalletError::SigningFailure(format!("malformed payload: {e}")))?;
        let signed = self.wallets.sign(signer, payload).await?;
        debug!("signed {} payload for {}", signed.variant, signed.signer);
        Ok(signed)
    }

    async fn submit(
        &self,
        request: &BroadcastRequest,
        signed: SignedPayload,
    ) -> Result<TransactionOutcome, WalletError> {
        let receipt = self.broadcaster.broadcast(request).await?;
        info!(
            "{} from {} on chain {} accepted: {}",
            request.operation,
            request.from_address,
            request.chain_id,
            receipt.tx_hash.as_deref().unwrap_or("<no hash>")
        );
        Ok(TransactionOutcome { signed, receipt })
    }
}
