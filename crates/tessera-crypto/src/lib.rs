//! Deterministic key derivation for the chains Tessera supports.
//!
//! EVM keys follow BIP-32 over secp256k1 and Solana keys follow SLIP-10
//! over ed25519. Every derivation is a pure function of
//! `(seed, variant, account_index)`.

use thiserror::Error;
use tiny_keccak::{Hasher, Keccak};

pub mod evm;
pub mod keypair;
pub mod slip10;
pub mod solana;

pub use keypair::{derive_all, deriver_for, ChainDeriver, ChainKeypair, EvmDeriver, SolanaDeriver};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid seed length: expected 64, got {0}")]
    InvalidSeedLength(usize),

    #[error("invalid derivation path: {0}")]
    InvalidPath(String),

    #[error("key derivation failed: {0}")]
    Derivation(String),

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),
}

impl CryptoError {
    /// True for every failure that happens while deriving from a seed.
    pub fn is_derivation(&self) -> bool {
        !matches!(self, CryptoError::InvalidPrivateKey(_))
    }
}

/// Keccak-256 (original Keccak padding, as used by Ethereum).
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut keccak = Keccak::v256();
    let mut output = [0u8; 32];
    keccak.update(data);
    keccak.finalize(&mut output);
    output
}

// ─── Helpers ────────────────────────────────────────────────────────────────

pub(crate) fn check_seed(seed: &[u8]) -> Result<(), CryptoError> {
    if seed.len() != tessera_types::constants::SEED_LEN {
        return Err(CryptoError::InvalidSeedLength(seed.len()));
    }
    Ok(())
}
