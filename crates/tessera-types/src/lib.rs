//! Core types for the Tessera wallet.
//!
//! This crate provides the foundational types used across all Tessera crates:
//! supported chain variants and their derivation paths, BIP-39 mnemonic
//! handling, structured vault keys with their access policies, and the
//! public shape of a wallet identity.

pub mod constants;
pub mod duration_ms;
pub mod identity;
pub mod mnemonic;
pub mod vault_key;

pub use constants::ChainVariant;
pub use identity::{AddressEntry, BackupState, IdentityError, WalletId, WalletIdentity, WalletOrigin};
pub use mnemonic::{EntropySource, FixedEntropy, Mnemonic, MnemonicError, OsEntropy, Seed};
pub use vault_key::{AccessPolicy, LogicalKey, LogicalKeyError, SecretClass};
