//! Structured vault keys and access policies.
//!
//! Every secret lives under exactly one [`LogicalKey`]. The rendered forms
//! are `wallet:<id>` for a mnemonic and `address:<address>:chain:<tag>` for a
//! private key; both parse back losslessly.

use crate::constants::ChainVariant;
use crate::identity::WalletId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MNEMONIC_PREFIX: &str = "wallet:";
const ADDRESS_PREFIX: &str = "address:";
const CHAIN_SEPARATOR: &str = ":chain:";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogicalKeyError {
    #[error("unrecognised vault key: {0}")]
    Unrecognised(String),

    #[error("invalid wallet id in vault key: {0}")]
    InvalidWalletId(String),

    #[error("invalid chain tag in vault key: {0}")]
    InvalidChain(String),

    #[error("empty address in vault key")]
    EmptyAddress,
}

/// What kind of secret a vault entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SecretClass {
    Mnemonic,
    PrivateKey,
}

/// Gate the secure store enforces before releasing an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccessPolicy {
    /// Readable whenever the store is open.
    AlwaysAccessible,
    /// Readable while the device is unlocked.
    DeviceUnlocked,
    /// Requires biometric or device-passcode confirmation on every read.
    UserPresence,
}

impl AccessPolicy {
    pub fn requires_presence(&self) -> bool {
        matches!(self, AccessPolicy::UserPresence)
    }
}

/// Address of one secret in the vault.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum LogicalKey {
    /// The mnemonic of an HD wallet.
    Mnemonic(WalletId),
    /// The private key behind one chain address.
    PrivateKey { address: String, variant: ChainVariant },
}

impl LogicalKey {
    pub fn mnemonic(id: WalletId) -> Self {
        LogicalKey::Mnemonic(id)
    }

    pub fn private_key(address: impl Into<String>, variant: ChainVariant) -> Self {
        LogicalKey::PrivateKey {
            address: address.into(),
            variant,
        }
    }

    pub fn secret_class(&self) -> SecretClass {
        match self {
            LogicalKey::Mnemonic(_) => SecretClass::Mnemonic,
            LogicalKey::PrivateKey { .. } => SecretClass::PrivateKey,
        }
    }
}

impl fmt::Display for LogicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalKey::Mnemonic(id) => write!(f, "{MNEMONIC_PREFIX}{id}"),
            LogicalKey::PrivateKey { address, variant } => {
                write!(f, "{ADDRESS_PREFIX}{address}{CHAIN_SEPARATOR}{}", variant.tag())
            }
        }
    }
}

impl FromStr for LogicalKey {
    type Err = LogicalKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(id) = s.strip_prefix(MNEMONIC_PREFIX) {
            let id = id
                .parse::<WalletId>()
                .map_err(|_| LogicalKeyError::InvalidWalletId(id.to_string()))?;
            return Ok(LogicalKey::Mnemonic(id));
        }

        if let Some(rest) = s.strip_prefix(ADDRESS_PREFIX) {
            let (address, tag) = rest
                .rsplit_once(CHAIN_SEPARATOR)
                .ok_or_else(|| LogicalKeyError::Unrecognised(s.to_string()))?;
            if address.is_empty() {
                return Err(LogicalKeyError::EmptyAddress);
            }
            let variant = tag
                .parse::<ChainVariant>()
                .map_err(|_| LogicalKeyError::InvalidChain(tag.to_string()))?;
            return Ok(LogicalKey::private_key(address, variant));
        }

        Err(LogicalKeyError::Unrecognised(s.to_string()))
    }
}

impl From<LogicalKey> for String {
    fn from(key: LogicalKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for LogicalKey {
    type Error = LogicalKeyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
