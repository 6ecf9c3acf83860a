//! Transfer, swap and approve workflows with stubbed services.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tessera_rpc::{
    ApproveRequest, BroadcastReceipt, BroadcastRequest, GatewayClient, GatewayConfig,
    OperationType, RpcError, SwapRequest, WithdrawalRequest,
};
use tessera_tx::solana::encode_compact_u16;
use tessera_wallet::{
    ApproveParams, AtomicIdAllocator, BroadcastService, ChainVariant, MemoryVault, PayloadService,
    PresenceGate, SwapLegs, SwapParams, TransactionOrchestrator, TransferParams, WalletConfig,
    WalletError, WalletId, WalletManager,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const JUNK: &str = "test test test test test test test test test test test junk";
const JUNK_EVM: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
const RECIPIENT: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ─── Stub services ──────────────────────────────────────────────────────────

/// Answers every payload request with the same response and records the
/// request bodies.
struct StubPayloads {
    response: Result<Value, (i64, String)>,
    requests: Mutex<Vec<Value>>,
}

impl StubPayloads {
    fn answering(response: Value) -> Self {
        Self {
            response: Ok(response),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn failing(code: i64, message: &str) -> Self {
        Self {
            response: Err((code, message.to_string())),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn reply(&self, endpoint: &str, body: Value) -> Result<Value, RpcError> {
        self.requests.lock().unwrap().push(body);
        match &self.response {
            Ok(value) => Ok(value.clone()),
            Err((code, message)) => Err(RpcError::Service {
                endpoint: endpoint.to_string(),
                code: *code,
                message: message.clone(),
            }),
        }
    }

    fn last_request(&self) -> Value {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl PayloadService for StubPayloads {
    async fn withdrawal_data(&self, req: &WithdrawalRequest) -> Result<Value, RpcError> {
        self.reply("withdrawalData", serde_json::to_value(req)?)
    }

    async fn swap_data(&self, req: &SwapRequest) -> Result<Value, RpcError> {
        self.reply("getSwapData", serde_json::to_value(req)?)
    }

    async fn approve_data(&self, req: &ApproveRequest) -> Result<Value, RpcError> {
        self.reply("approve", serde_json::to_value(req)?)
    }
}

#[derive(Default)]
struct RecordingBroadcaster {
    calls: AtomicUsize,
    seen: Mutex<Vec<BroadcastRequest>>,
}

impl RecordingBroadcaster {
    fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last(&self) -> BroadcastRequest {
        self.seen.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl BroadcastService for RecordingBroadcaster {
    async fn broadcast(&self, req: &BroadcastRequest) -> Result<BroadcastReceipt, RpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(req.clone());
        Ok(BroadcastReceipt {
            tx_hash: Some("0xfeed".into()),
            extra: Default::default(),
        })
    }
}

struct CancelGate;

#[async_trait]
impl PresenceGate for CancelGate {
    async fn confirm(&self, _key: &tessera_wallet::LogicalKey) -> bool {
        false
    }
}

type Orchestrator =
    TransactionOrchestrator<MemoryVault, Arc<StubPayloads>, Arc<RecordingBroadcaster>>;

async fn setup(
    vault: MemoryVault,
    payloads: StubPayloads,
) -> (Orchestrator, WalletId, Arc<StubPayloads>, Arc<RecordingBroadcaster>) {
    let wallets = Arc::new(WalletManager::new(vault));
    let identity = wallets.import_by_mnemonic(JUNK).await.unwrap();
    let payloads = Arc::new(payloads);
    let broadcaster = Arc::new(RecordingBroadcaster::default());
    let orchestrator = TransactionOrchestrator::new(wallets, payloads.clone(), broadcaster.clone());
    (orchestrator, identity.id(), payloads, broadcaster)
}

fn evm_payload(from: &str) -> Value {
    json!({
        "chainId": 56,
        "from": from,
        "to": RECIPIENT,
        "value": "1000000000000000",
        "maxFeePerGas": "0xb2d05e00",
        "maxPriorityFeePerGas": "0x3b9aca00",
        "gas": "0x5208",
        "nonce": "0x0",
        "data": "0x"
    })
}

fn transfer(wallet_id: WalletId) -> TransferParams {
    TransferParams {
        wallet_id,
        variant: ChainVariant::Evm,
        chain_id: "56".into(),
        contract_address: None,
        to_address: RECIPIENT.into(),
        qty: "0.001".into(),
        gas_limit: Some("21000".into()),
        nonce: None,
        member_id: Some("member-7".into()),
    }
}

fn v0_transfer(payer: &[u8; 32]) -> Vec<u8> {
    let mut msg = vec![0x80, 1, 0, 1];
    msg.extend(encode_compact_u16(3));
    msg.extend_from_slice(payer);
    msg.extend_from_slice(&[5u8; 32]);
    msg.extend_from_slice(&[0u8; 32]);
    msg.extend_from_slice(&[9u8; 32]);
    msg.extend_from_slice(&[1, 2, 2, 0, 1, 12, 2, 0, 0, 0]);
    msg.extend_from_slice(&1_000u64.to_le_bytes());
    msg.push(0);

    let mut tx = encode_compact_u16(1);
    tx.extend_from_slice(&[0u8; 64]);
    tx.extend_from_slice(&msg);
    tx
}

// ─── Workflows ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_transfer_signs_then_broadcasts() {
    init_logging();
    let (orchestrator, wallet_id, payloads, broadcaster) =
        setup(MemoryVault::new(), StubPayloads::answering(evm_payload(JUNK_EVM))).await;

    let outcome = orchestrator.transfer(&transfer(wallet_id)).await.unwrap();

    let request = payloads.last_request();
    assert_eq!(request["fromAddress"], JUNK_EVM);
    assert_eq!(request["toAddress"], RECIPIENT);
    assert_eq!(request["gasLimit"], "21000");

    assert_eq!(broadcaster.count(), 1);
    let sent = broadcaster.last();
    assert_eq!(sent.operation, OperationType::Send);
    assert_eq!(sent.transaction_data, outcome.signed.raw);
    assert!(sent.transaction_data.starts_with("0x02"));
    assert_eq!(sent.from_address, JUNK_EVM);
    assert_eq!(sent.qty.as_deref(), Some("0.001"));
    assert_eq!(sent.wallet_id, "1");
    assert_eq!(sent.member_id.as_deref(), Some("member-7"));
    assert_eq!(outcome.receipt.tx_hash.as_deref(), Some("0xfeed"));
}

#[tokio::test]
async fn test_swap_on_solana_echoes_legs() {
    let wallets = Arc::new(WalletManager::new(MemoryVault::new()));
    let identity = wallets.import_by_mnemonic(JUNK).await.unwrap();
    let sol = identity.address_for(ChainVariant::Solana).unwrap().address.clone();
    let payer = tessera_crypto::solana::decode_address(&sol).unwrap();

    let payloads = Arc::new(StubPayloads::answering(
        json!({ "solTransferData": BASE64.encode(v0_transfer(&payer)) }),
    ));
    let broadcaster = Arc::new(RecordingBroadcaster::default());
    let orchestrator = TransactionOrchestrator::new(wallets, payloads.clone(), broadcaster.clone());

    let params = SwapParams {
        wallet_id: identity.id(),
        variant: ChainVariant::Solana,
        chain_id: "solana".into(),
        from_token_address: "So11111111111111111111111111111111111111112".into(),
        to_token_address: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".into(),
        amount: "1000000".into(),
        slippage: "0.5".into(),
        quote_response: json!({ "outAmount": "170000" }),
        to_address: None,
        contract_address: None,
        qty: None,
        member_id: None,
        legs: SwapLegs {
            from_address: Some("So11111111111111111111111111111111111111112".into()),
            to_address: Some("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".into()),
            from_qty: Some("0.001".into()),
            to_qty: Some("0.17".into()),
        },
    };
    let outcome = orchestrator.swap(&params).await.unwrap();

    assert_eq!(payloads.last_request()["quoteResponse"]["outAmount"], "170000");
    assert_eq!(payloads.last_request()["fromAddress"], sol.as_str());

    let sent = broadcaster.last();
    assert_eq!(sent.operation, OperationType::Swap);
    assert_eq!(sent.from_address, sol);
    assert_eq!(sent.swap_to_qty.as_deref(), Some("0.17"));
    assert_eq!(sent.transaction_data, outcome.signed.raw);
    assert!(bs58::decode(&sent.transaction_data).into_vec().is_ok());
}

#[tokio::test]
async fn test_approve_uses_approve_tag() {
    let (orchestrator, wallet_id, payloads, broadcaster) =
        setup(MemoryVault::new(), StubPayloads::answering(evm_payload(JUNK_EVM))).await;

    let params = ApproveParams {
        wallet_id,
        variant: ChainVariant::Evm,
        chain_id: "56".into(),
        from_token_address: "0x55d398326f99059fF775485246999027B3197955".into(),
        to_token_address: "0x8AC76a51cc950d9822D68b83fE1Ad97B32Cd580d".into(),
        gas_limit: None,
        nonce: Some(3),
        to_address: None,
        member_id: None,
        legs: SwapLegs::default(),
    };
    orchestrator.approve(&params).await.unwrap();

    assert_eq!(payloads.last_request()["fromAddress"], JUNK_EVM);
    assert_eq!(payloads.last_request()["nonce"], 3);
    assert_eq!(broadcaster.last().operation, OperationType::Approve);
}

// ─── Failures never reach broadcast ─────────────────────────────────────────

#[tokio::test]
async fn test_signing_failure_is_not_broadcast() {
    init_logging();
    // The payload claims to come from another account.
    let (orchestrator, wallet_id, _, broadcaster) =
        setup(MemoryVault::new(), StubPayloads::answering(evm_payload(RECIPIENT))).await;

    let err = orchestrator.transfer(&transfer(wallet_id)).await.unwrap_err();
    assert!(matches!(err, WalletError::SigningFailure(_)), "{err}");
    assert_eq!(broadcaster.count(), 0);
}

#[tokio::test]
async fn test_malformed_payload_is_signing_failure() {
    // EVM body without nonce or fee fields.
    let (orchestrator, wallet_id, _, broadcaster) =
        setup(MemoryVault::new(), StubPayloads::answering(json!({ "chainId": 56 }))).await;

    let err = orchestrator.transfer(&transfer(wallet_id)).await.unwrap_err();
    assert!(matches!(err, WalletError::SigningFailure(_)), "{err}");
    assert!(!err.is_recoverable());
    assert_eq!(broadcaster.count(), 0);
}

#[tokio::test]
async fn test_solana_body_without_transaction_is_signing_failure() {
    let (orchestrator, wallet_id, _, broadcaster) = setup(
        MemoryVault::new(),
        StubPayloads::answering(json!({ "quote": "no transaction here" })),
    )
    .await;

    let mut params = transfer(wallet_id);
    params.variant = ChainVariant::Solana;
    params.chain_id = "solana".into();
    let err = orchestrator.transfer(&params).await.unwrap_err();
    assert!(matches!(err, WalletError::SigningFailure(_)), "{err}");
    assert_eq!(broadcaster.count(), 0);
}

#[tokio::test]
async fn test_payload_service_error_propagates() {
    let (orchestrator, wallet_id, _, broadcaster) =
        setup(MemoryVault::new(), StubPayloads::failing(500, "insufficient balance")).await;

    let err = orchestrator.transfer(&transfer(wallet_id)).await.unwrap_err();
    assert!(matches!(err, WalletError::Rpc(RpcError::Service { .. })), "{err}");
    assert_eq!(broadcaster.count(), 0);
}

#[tokio::test]
async fn test_denied_key_access_is_not_broadcast() {
    let (orchestrator, wallet_id, _, broadcaster) = setup(
        MemoryVault::with_gate(Arc::new(CancelGate)),
        StubPayloads::answering(evm_payload(JUNK_EVM)),
    )
    .await;

    let err = orchestrator.transfer(&transfer(wallet_id)).await.unwrap_err();
    assert!(matches!(err, WalletError::VaultAccessDenied { .. }), "{err}");
    assert!(err.is_recoverable());
    assert_eq!(broadcaster.count(), 0);
}

#[tokio::test]
async fn test_unknown_wallet_requests_nothing() {
    let (orchestrator, _, payloads, broadcaster) =
        setup(MemoryVault::new(), StubPayloads::answering(evm_payload(JUNK_EVM))).await;

    let err = orchestrator
        .transfer(&transfer(WalletId::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::UnknownWallet(_)));
    assert!(payloads.requests.lock().unwrap().is_empty());
    assert_eq!(broadcaster.count(), 0);
}

// ─── Over HTTP ──────────────────────────────────────────────────────────────

/// One-shot HTTP server answering each connection from `responses` in
/// order. Returns the base URL and the request bodies it saw.
async fn stub_gateway(responses: Vec<String>) -> (String, Arc<tokio::sync::Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let bodies = Arc::new(tokio::sync::Mutex::new(Vec::new()));
    let bodies_srv = bodies.clone();

    tokio::spawn(async move {
        for body in responses {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = stream.read(&mut chunk).await.unwrap_or(0);
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())?
                        })
                        .unwrap_or(0);
                    if buf.len() >= end + 4 + length {
                        bodies_srv.lock().await.push(text[end + 4..].to_string());
                        break;
                    }
                }
            }

            let reply = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = stream.write_all(reply.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });

    (format!("http://{}", addr), bodies)
}

#[tokio::test]
async fn test_transfer_through_gateway_client() {
    init_logging();
    let payload = json!({ "code": 0, "msg": "ok", "data": evm_payload(JUNK_EVM) });
    let receipt = json!({ "code": 0, "msg": "ok", "data": { "hash": "0xabc" } });
    let (url, bodies) = stub_gateway(vec![payload.to_string(), receipt.to_string()]).await;

    let gateway = Arc::new(
        GatewayClient::with_config(GatewayConfig {
            url,
            timeout: Duration::from_secs(5),
            retries: 0,
            ..GatewayConfig::default()
        })
        .unwrap(),
    );
    let config = WalletConfig {
        vault_timeout: Duration::from_secs(5),
        ..WalletConfig::default()
    };
    let wallets = Arc::new(WalletManager::with_config(
        MemoryVault::new(),
        AtomicIdAllocator::new(42),
        config,
    ));
    let identity = wallets.import_by_mnemonic(JUNK).await.unwrap();
    let orchestrator = TransactionOrchestrator::new(wallets, gateway.clone(), gateway);

    let outcome = orchestrator.transfer(&transfer(identity.id())).await.unwrap();
    assert_eq!(outcome.receipt.tx_hash.as_deref(), Some("0xabc"));

    let bodies = bodies.lock().await;
    assert_eq!(bodies.len(), 2);
    let broadcast: Value = serde_json::from_str(&bodies[1]).unwrap();
    assert_eq!(broadcast["type"], "Send");
    assert_eq!(broadcast["walletId"], "42");
    assert_eq!(broadcast["transactionData"], outcome.signed.raw.as_str());
}
