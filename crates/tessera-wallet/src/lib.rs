//! Tessera wallet core.
//!
//! Provides the secure-vault contract (in-memory and encrypted-file
//! implementations), the wallet lifecycle, the signing state machine and
//! the transfer/swap/approve workflows.

pub mod config;
pub mod encryption;
pub mod error;
pub mod file_vault;
pub mod orchestrator;
pub mod signing;
pub mod vault;
pub mod wallet;

pub use config::{KdfParams, VaultPolicies, WalletConfig};
pub use error::WalletError;
pub use file_vault::FileVault;
pub use orchestrator::{
    ApproveParams, BroadcastService, PayloadService, SwapLegs, SwapParams, TransactionOrchestrator,
    TransactionOutcome, TransferParams,
};
pub use signing::{SigningRequest, SigningState};
pub use vault::{AlwaysPresent, MemoryVault, PresenceGate, PutOutcome, Secret, SecureVault, VaultError};
pub use wallet::{AtomicIdAllocator, IdAllocator, WalletManager};

// Re-export the public types hosts need alongside the manager.
pub use tessera_types::{
    AccessPolicy, AddressEntry, BackupState, ChainVariant, LogicalKey, Mnemonic, WalletId,
    WalletIdentity, WalletOrigin,
};
