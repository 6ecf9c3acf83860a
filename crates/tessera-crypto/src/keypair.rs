//! Per-chain keypairs and the derivation dispatch over [`ChainVariant`].

use crate::{evm, solana, CryptoError};
use log::debug;
use std::fmt;
use tessera_types::ChainVariant;
use zeroize::Zeroizing;

/// A chain-native keypair in its vault encoding.
///
/// `Debug` prints the address and path, never the private key.
#[derive(Clone)]
pub struct ChainKeypair {
    variant: ChainVariant,
    derivation_path: Option<String>,
    private_key: Zeroizing<String>,
    address: String,
}

impl ChainKeypair {
    pub fn variant(&self) -> ChainVariant {
        self.variant
    }

    /// Path the key was derived along; `None` for imported keys.
    pub fn derivation_path(&self) -> Option<&str> {
        self.derivation_path.as_deref()
    }

    /// The vault encoding of the private key.
    pub fn private_key(&self) -> &str {
        &self.private_key
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl fmt::Debug for ChainKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainKeypair")
            .field("variant", &self.variant)
            .field("derivation_path", &self.derivation_path)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Seed-to-keypair derivation for one chain.
pub trait ChainDeriver: Send + Sync {
    fn variant(&self) -> ChainVariant;

    fn path(&self, account_index: u32) -> String {
        self.variant().derivation_path(account_index)
    }

    /// Derive the keypair at `account_index` from a 64-byte seed.
    fn derive(&self, seed: &[u8], account_index: u32) -> Result<ChainKeypair, CryptoError>;

    /// Validate a raw secret and recompute its address.
    fn import(&self, secret: &str) -> Result<ChainKeypair, CryptoError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EvmDeriver;

impl ChainDeriver for EvmDeriver {
    fn variant(&self) -> ChainVariant {
        ChainVariant::Evm
    }

    fn derive(&self, seed: &[u8], account_index: u32) -> Result<ChainKeypair, CryptoError> {
        let path = self.path(account_index);
        let key = evm::derive_signing_key(seed, &path)?;
        Ok(ChainKeypair {
            variant: ChainVariant::Evm,
            address: evm::address_of(key.verifying_key()),
            private_key: evm::encode_secret(&key),
            derivation_path: Some(path),
        })
    }

    fn import(&self, secret: &str) -> Result<ChainKeypair, CryptoError> {
        let key = evm::signing_key_from_hex(secret)?;
        Ok(ChainKeypair {
            variant: ChainVariant::Evm,
            address: evm::address_of(key.verifying_key()),
            private_key: evm::encode_secret(&key),
            derivation_path: None,
        })
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SolanaDeriver;

impl ChainDeriver for SolanaDeriver {
    fn variant(&self) -> ChainVariant {
        ChainVariant::Solana
    }

    fn derive(&self, seed: &[u8], account_index: u32) -> Result<ChainKeypair, CryptoError> {
        let path = self.path(account_index);
        let key = solana::derive_signing_key(seed, &path)?;
        Ok(ChainKeypair {
            variant: ChainVariant::Solana,
            address: solana::address_of(&key.verifying_key()),
            private_key: solana::encode_secret(&key),
            derivation_path: Some(path),
        })
    }

    fn import(&self, secret: &str) -> Result<ChainKeypair, CryptoError> {
        let key = solana::signing_key_from_base58(secret)?;
        Ok(ChainKeypair {
            variant: ChainVariant::Solana,
            address: solana::address_of(&key.verifying_key()),
            private_key: solana::encode_secret(&key),
            derivation_path: None,
        })
    }
}

static EVM: EvmDeriver = EvmDeriver;
static SOLANA: SolanaDeriver = SolanaDeriver;

/// The deriver for a chain variant.
pub fn deriver_for(variant: ChainVariant) -> &'static dyn ChainDeriver {
    match variant {
        ChainVariant::Evm => &EVM,
        ChainVariant::Solana => &SOLANA,
    }
}

/// Derive one keypair per supported chain, in [`ChainVariant::ALL`] order.
pub fn derive_all(seed: &[u8], account_index: u32) -> Result<Vec<ChainKeypair>, CryptoError> {
    ChainVariant::ALL
        .iter()
        .map(|&variant| {
            let keypair = deriver_for(variant).derive(seed, account_index)?;
            debug!("derived {} address {} at account {}", variant, keypair.address(), account_index);
            Ok(keypair)
        })
        .collect()
}
