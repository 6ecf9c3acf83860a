//! Transaction signing for Tessera.
//!
//! Pure transforms from a stored key and an unsigned payload to a signed,
//! broadcast-ready payload: EIP-1559 typed transactions for EVM chains and
//! versioned transactions for Solana. Nothing here touches the vault or
//! the network.

pub mod eip1559;
pub mod payload;
pub mod quantity;
pub mod solana;

pub use eip1559::{Eip1559Transaction, SignedEip1559};
pub use payload::{sign_with_secret, EvmPayload, SignedPayload, UnsignedPayload};
pub use solana::SolanaTransaction;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TxError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid transaction: {0}")]
    Invalid(String),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("signer mismatch: payload expects {expected}, key is {actual}")]
    SignerMismatch { expected: String, actual: String },

    #[error("invalid key: {0}")]
    Key(String),
}

impl From<tessera_crypto::CryptoError> for TxError {
    fn from(e: tessera_crypto::CryptoError) -> Self {
        TxError::Key(e.to_string())
    }
}
