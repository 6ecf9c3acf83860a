//! Wallet error types.

use std::fmt;
use tessera_types::{IdentityError, LogicalKey, MnemonicError, WalletId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(#[from] MnemonicError),

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("key derivation failed: {0}")]
    DerivationFailure(String),

    #[error("vault write failed for {key}: {reason}")]
    VaultWriteError { key: String, reason: String },

    #[error("no vault entry for {0}")]
    VaultNotFound(String),

    #[error("vault access denied for {key}: {reason}")]
    VaultAccessDenied { key: String, reason: String },

    #[error("vault corrupt: {0}")]
    VaultCorrupt(String),

    #[error("signing failed: {0}")]
    SigningFailure(String),

    #[error("wallet {0} has no mnemonic (imported by private key)")]
    NotHdWallet(WalletId),

    #[error(
        "partial vault write ({cause}): completed [{}], orphaned [{}]",
        KeyList(.completed),
        KeyList(.orphaned)
    )]
    PartialWriteInconsistency {
        /// Entries the operation managed to change before failing.
        completed: Vec<LogicalKey>,
        /// Entries that could not be cleaned up and are left behind.
        orphaned: Vec<LogicalKey>,
        cause: Box<WalletError>,
    },

    #[error("unknown wallet {0}")]
    UnknownWallet(WalletId),

    #[error("invalid wallet identity: {0}")]
    Identity(#[from] IdentityError),

    #[error("gateway error: {0}")]
    Rpc(#[from] tessera_rpc::RpcError),
}

impl WalletError {
    /// Whether the caller may retry or correct its input.
    ///
    /// Validation errors and denied vault access (including a user who
    /// cancelled the prompt) are recoverable. Derivation and signing
    /// failures on well-formed input are not.
    pub fn is_recoverable(&self) -> bool {
        match self {
            WalletError::InvalidMnemonic(_)
            | WalletError::InvalidPrivateKey(_)
            | WalletError::VaultAccessDenied { .. }
            | WalletError::UnknownWallet(_) => true,
            WalletError::Rpc(e) => e.is_transient(),
            _ => false,
        }
    }
}

struct KeyList<'a>(&'a [LogicalKey]);

impl fmt::Display for KeyList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", key)?;
        }
        Ok(())
    }
}
