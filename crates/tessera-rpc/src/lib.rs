//! Tessera gateway client library.
//!
//! Provides an async HTTP client for the remote services that build
//! unsigned transactions and broadcast signed ones. The wallet core depends
//! on these services only through traits; this crate is the HTTP
//! implementation.
//!
//! # Example
//!
//! ```ignore
//! use tessera_rpc::{GatewayClient, WithdrawalRequest};
//!
//! #[tokio::main]
//! async fn main() {
//!     let gateway = GatewayClient::new("https://api.example.com").unwrap();
//!     let payload = gateway.withdrawal_data(&WithdrawalRequest::default()).await.unwrap();
//!     println!("{payload}");
//! }
//! ```

pub mod client;
pub mod error;
pub mod gateway;

pub use client::{GatewayClient, GatewayConfig};
pub use error::RpcError;
pub use gateway::{
    ApproveRequest, BroadcastReceipt, BroadcastRequest, OperationType, SwapRequest,
    WithdrawalRequest,
};
