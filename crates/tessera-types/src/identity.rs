//! Public shape of a wallet: its id, addresses, origin and backup state.
//!
//! A [`WalletIdentity`] never carries secret material. It is safe to hand
//! to the host application for persistence alongside name, avatar, and
//! balance metadata.

use crate::constants::ChainVariant;
use crate::vault_key::LogicalKey;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("wallet has no addresses")]
    NoAddresses,

    #[error("duplicate address {address} for {variant}")]
    DuplicateAddress { address: String, variant: ChainVariant },

    #[error("private-key wallet must hold exactly one address, got {0}")]
    ImportedKeyAddressCount(usize),

    #[error("backup state {state:?} is not valid for origin {origin:?}")]
    BackupStateMismatch { origin: WalletOrigin, state: BackupState },
}

/// Process-unique, stable wallet identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletId(Uuid);

impl WalletId {
    /// A fresh random (v4) id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WalletId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for WalletId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// How the wallet came into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WalletOrigin {
    Generated,
    ImportedMnemonic,
    ImportedPrivateKey,
}

impl WalletOrigin {
    /// Whether the wallet has a mnemonic in the vault.
    pub fn is_hd(&self) -> bool {
        !matches!(self, WalletOrigin::ImportedPrivateKey)
    }
}

/// Whether the user has confirmed a backup of the secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BackupState {
    NotBackedUp,
    BackedUp,
    Imported,
}

/// One chain address exposed by a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressEntry {
    pub variant: ChainVariant,
    pub address: String,
}

impl AddressEntry {
    pub fn new(variant: ChainVariant, address: impl Into<String>) -> Self {
        Self {
            variant,
            address: address.into(),
        }
    }

    /// Vault key of the private key behind this address.
    pub fn logical_key(&self) -> LogicalKey {
        LogicalKey::private_key(self.address.clone(), self.variant)
    }
}

/// A logical wallet: one or more chain addresses and their secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawIdentity")]
pub struct WalletIdentity {
    id: WalletId,
    display_index: u64,
    addresses: Vec<AddressEntry>,
    origin: WalletOrigin,
    backup_state: BackupState,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawIdentity {
    id: WalletId,
    display_index: u64,
    addresses: Vec<AddressEntry>,
    origin: WalletOrigin,
    backup_state: BackupState,
}

impl TryFrom<RawIdentity> for WalletIdentity {
    type Error = IdentityError;

    fn try_from(raw: RawIdentity) -> Result<Self, Self::Error> {
        WalletIdentity::new(
            raw.id,
            raw.display_index,
            raw.addresses,
            raw.origin,
            raw.backup_state,
        )
    }
}

impl WalletIdentity {
    /// Build an identity, checking the address-set invariants.
    pub fn new(
        id: WalletId,
        display_index: u64,
        addresses: Vec<AddressEntry>,
        origin: WalletOrigin,
        backup_state: BackupState,
    ) -> Result<Self, IdentityError> {
        if addresses.is_empty() {
            return Err(IdentityError::NoAddresses);
        }

        let mut seen = HashSet::new();
        for entry in &addresses {
            if !seen.insert((&entry.address, entry.variant)) {
                return Err(IdentityError::DuplicateAddress {
                    address: entry.address.clone(),
                    variant: entry.variant,
                });
            }
        }

        if origin == WalletOrigin::ImportedPrivateKey && addresses.len() != 1 {
            return Err(IdentityError::ImportedKeyAddressCount(addresses.len()));
        }

        let state_ok = match origin {
            WalletOrigin::Generated => backup_state != BackupState::Imported,
            WalletOrigin::ImportedMnemonic | WalletOrigin::ImportedPrivateKey => {
                backup_state == BackupState::Imported
            }
        };
        if !state_ok {
            return Err(IdentityError::BackupStateMismatch {
                origin,
                state: backup_state,
            });
        }

        Ok(Self {
            id,
            display_index,
            addresses,
            origin,
            backup_state,
        })
    }

    pub fn id(&self) -> WalletId {
        self.id
    }

    pub fn display_index(&self) -> u64 {
        self.display_index
    }

    /// Default display name, e.g. `Wallet 3`.
    pub fn name(&self) -> String {
        format!("Wallet {}", self.display_index)
    }

    pub fn addresses(&self) -> &[AddressEntry] {
        &self.addresses
    }

    pub fn origin(&self) -> WalletOrigin {
        self.origin
    }

    pub fn backup_state(&self) -> BackupState {
        self.backup_state
    }

    /// The address this wallet holds for a chain, if any.
    pub fn address_for(&self, variant: ChainVariant) -> Option<&AddressEntry> {
        self.addresses.iter().find(|e| e.variant == variant)
    }

    /// Whether this wallet owns the given address on the given chain.
    pub fn owns(&self, address: &str, variant: ChainVariant) -> bool {
        self.addresses
            .iter()
            .any(|e| e.variant == variant && e.address == address)
    }

    /// Vault key of the mnemonic, for HD wallets.
    pub fn mnemonic_key(&self) -> Option<LogicalKey> {
        self.origin.is_hd().then(|| LogicalKey::mnemonic(self.id))
    }

    /// Every vault key that belongs to this wallet.
    pub fn vault_keys(&self) -> Vec<LogicalKey> {
        self.mnemonic_key()
            .into_iter()
            .chain(self.addresses.iter().map(AddressEntry::logical_key))
            .collect()
    }

    /// Record that the user backed up the mnemonic.
    ///
    /// Only generated wallets move between backup states; imports stay
    /// `Imported`. Returns whether the state changed.
    pub fn mark_backed_up(&mut self) -> bool {
        if self.backup_state == BackupState::NotBackedUp {
            self.backup_state = BackupState::BackedUp;
            true
        } else {
            false
        }
    }
}
