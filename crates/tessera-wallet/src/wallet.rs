//! Wallet lifecycle: create, import, delete, reveal.
//!
//! The manager owns the vault and an in-memory registry of the identities
//! it has created, imported or been handed back by the host. Identities
//! carry only public data; every secret stays in the vault.

use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};
use tessera_crypto::{derive_all, deriver_for, evm};
use tessera_tx::{SignedPayload, UnsignedPayload};
use tessera_types::mnemonic::{generate_mnemonic_with, mnemonic_to_seed};
use tessera_types::{
    AddressEntry, BackupState, ChainVariant, EntropySource, LogicalKey, Mnemonic, OsEntropy,
    WalletId, WalletIdentity, WalletOrigin,
};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use zeroize::Zeroizing;

use crate::config::WalletConfig;
use crate::error::WalletError;
use crate::signing::SigningRequest;
use crate::vault::{with_timeout, PutOutcome, Secret, SecureVault};

// ─── Display identifiers ────────────────────────────────────────────────────

/// Source of the human-facing wallet numbers (`Wallet 1`, `Wallet 2`, ...).
///
/// Implementations must hand out distinct values under concurrent calls.
pub trait IdAllocator: Send + Sync {
    fn next_display_index(&self) -> u64;
}

/// In-process counter. Hosts with durable storage seed it with the next
/// unused number at start-up.
#[derive(Debug)]
pub struct AtomicIdAllocator(AtomicU64);

impl AtomicIdAllocator {
    pub fn new(start: u64) -> Self {
        Self(AtomicU64::new(start))
    }
}

impl Default for AtomicIdAllocator {
    fn default() -> Self {
        Self::new(1)
    }
}

impl IdAllocator for AtomicIdAllocator {
    fn next_display_index(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

// ─── Per-key critical sections ──────────────────────────────────────────────

#[derive(Default)]
struct KeyLocks {
    locks: std::sync::Mutex<HashMap<LogicalKey, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    /// Lock every key in `keys`. Keys are taken in sorted order so two
    /// overlapping operations cannot deadlock.
    async fn acquire(&self, keys: &[LogicalKey]) -> Vec<OwnedMutexGuard<()>> {
        let mut keys = keys.to_vec();
        keys.sort();
        keys.dedup();

        let mutexes: Vec<_> = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, m| Arc::strong_count(m) > 1);
            keys.into_iter()
                .map(|k| Arc::clone(locks.entry(k).or_default()))
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }
        guards
    }
}

// ─── Manager ────────────────────────────────────────────────────────────────

pub struct WalletManager<V, A = AtomicIdAllocator> {
    vault: V,
    allocator: A,
    config: WalletConfig,
    registry: RwLock<HashMap<WalletId, WalletIdentity>>,
    locks: KeyLocks,
}

impl<V: SecureVault> WalletManager<V> {
    pub fn new(vault: V) -> Self {
        Self::with_config(vault, AtomicIdAllocator::default(), WalletConfig::default())
    }
}

impl<V: SecureVault, A: IdAllocator> WalletManager<V, A> {
    pub fn with_config(vault: V, allocator: A, config: WalletConfig) -> Self {
        Self {
            vault,
            allocator,
            config,
            registry: RwLock::new(HashMap::new()),
            locks: KeyLocks::default(),
        }
    }

    pub fn vault(&self) -> &V {
        &self.vault
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    // ── Create / import ──

    /// Create a wallet from a fresh 12-word mnemonic.
    pub async fn create_wallet(&self) -> Result<WalletIdentity, WalletError> {
        self.create_wallet_with(&mut OsEntropy).await
    }

    /// Create a wallet with mnemonic entropy from `source`.
    pub async fn create_wallet_with(
        &self,
        source: &mut impl EntropySource,
    ) -> Result<WalletIdentity, WalletError> {
        let mnemonic = generate_mnemonic_with(source)?;
        self.persist_hd(&mnemonic, WalletOrigin::Generated).await
    }

    /// Restore a wallet from an existing phrase.
    pub async fn import_by_mnemonic(&self, phrase: &str) -> Result<WalletIdentity, WalletError> {
        let mnemonic = Mnemonic::parse(phrase)?;
        self.persist_hd(&mnemonic, WalletOrigin::ImportedMnemonic)
            .await
    }

    /// Import a single raw private key: 64 hex digits for EVM, base58
    /// keypair bytes for Solana.
    pub async fn import_by_private_key(
        &self,
        secret: &str,
        variant: ChainVariant,
    ) -> Result<WalletIdentity, WalletError> {
        let keypair = deriver_for(variant)
            .import(secret.trim())
            .map_err(|e| WalletError::InvalidPrivateKey(e.to_string()))?;

        let identity = WalletIdentity::new(
            WalletId::new(),
            self.allocator.next_display_index(),
            vec![AddressEntry::new(variant, keypair.address())],
            WalletOrigin::ImportedPrivateKey,
            BackupState::Imported,
        )?;
        let writes = vec![(
            LogicalKey::private_key(keypair.address(), variant),
            Zeroizing::new(keypair.private_key().as_bytes().to_vec()),
        )];

        self.store(identity, writes).await
    }

    async fn persist_hd(
        &self,
        mnemonic: &Mnemonic,
        origin: WalletOrigin,
    ) -> Result<WalletIdentity, WalletError> {
        let seed = mnemonic_to_seed(mnemonic);
        let keypairs = derive_all(seed.as_bytes(), self.config.account_index)
            .map_err(|e| WalletError::DerivationFailure(e.to_string()))?;

        let backup_state = match origin {
            WalletOrigin::Generated => BackupState::NotBackedUp,
            _ => BackupState::Imported,
        };
        let id = WalletId::new();
        let identity = WalletIdentity::new(
            id,
            self.allocator.next_display_index(),
            keypairs
                .iter()
                .map(|kp| AddressEntry::new(kp.variant(), kp.address()))
                .collect(),
            origin,
            backup_state,
        )?;

        let mut writes: Vec<(LogicalKey, Secret)> = vec![(
            LogicalKey::mnemonic(id),
            Zeroizing::new(mnemonic.phrase().as_bytes().to_vec()),
        )];
        writes.extend(keypairs.iter().map(|kp| {
            (
                LogicalKey::private_key(kp.address(), kp.variant()),
                Zeroizing::new(kp.private_key().as_bytes().to_vec()),
            )
        }));

        self.store(identity, writes).await
    }

    /// Write `writes` and register `identity`, all under the keys' locks.
    async fn store(
        &self,
        identity: WalletIdentity,
        writes: Vec<(LogicalKey, Secret)>,
    ) -> Result<WalletIdentity, WalletError> {
        let keys: Vec<_> = writes.iter().map(|(k, _)| k.clone()).collect();
        let _guards = self.locks.acquire(&keys).await;

        let mut created = Vec::new();
        for (key, secret) in &writes {
            let policy = self.config.policies.for_class(key.secret_class());
            let put = self.vault.put(key, secret, policy);
            match with_timeout(self.config.vault_timeout, key, put).await {
                Ok(PutOutcome::Created) => created.push(key.clone()),
                Ok(PutOutcome::Unchanged) => debug!("{} already stored", key),
                Err(cause) => return Err(self.roll_back(created, cause).await),
            }
        }

        self.registry
            .write()
            .await
            .insert(identity.id(), identity.clone());
        info!(
            "{} {} ({:?}) with {} address(es)",
            identity.name(),
            identity.id(),
            identity.origin(),
            identity.addresses().len()
        );
        Ok(identity)
    }

    /// Undo the entries an operation created before `cause` stopped it.
    async fn roll_back(&self, created: Vec<LogicalKey>, cause: WalletError) -> WalletError {
        if created.is_empty() {
            return cause;
        }

        let mut orphaned = Vec::new();
        for key in &created {
            let remove = self.vault.remove(key);
            if let Err(e) = with_timeout(self.config.vault_timeout, key, remove).await {
                warn!("could not roll back {}: {}", key, e);
                orphaned.push(key.clone());
            }
        }
        warn!(
            "write failed after {} entries ({} orphaned): {}",
            created.len(),
            orphaned.len(),
            cause
        );
        WalletError::PartialWriteInconsistency {
            completed: created,
            orphaned,
            cause: Box::new(cause),
        }
    }

    // ── Delete ──

    /// Erase a wallet's secrets and forget it.
    ///
    /// Address entries that another registered wallet also owns are kept.
    /// If a removal fails part way, the wallet stays registered so the
    /// delete can be retried.
    pub async fn delete_wallet(&self, id: WalletId) -> Result<(), WalletError> {
        let keys = self
            .identity(id)
            .await
            .ok_or(WalletError::UnknownWallet(id))?
            .vault_keys();
        let _guards = self.locks.acquire(&keys).await;

        // Re-read under the locks; a concurrent delete may have won.
        let (identity, shared) = {
            let registry = self.registry.read().await;
            let identity = registry
                .get(&id)
                .cloned()
                .ok_or(WalletError::UnknownWallet(id))?;
            let shared: HashSet<LogicalKey> = registry
                .values()
                .filter(|other| other.id() != id)
                .flat_map(WalletIdentity::vault_keys)
                .collect();
            (identity, shared)
        };

        let (retained, to_remove): (Vec<_>, Vec<_>) = identity
            .vault_keys()
            .into_iter()
            .partition(|key| shared.contains(key));
        for key in &retained {
            debug!("keeping {}: still owned by another wallet", key);
        }

        let mut removed = Vec::new();
        for (i, key) in to_remove.iter().enumerate() {
            let remove = self.vault.remove(key);
            if let Err(cause) = with_timeout(self.config.vault_timeout, key, remove).await {
                if removed.is_empty() {
                    return Err(cause);
                }
                warn!("delete of {} stopped after {} entries: {}", id, removed.len(), cause);
                return Err(WalletError::PartialWriteInconsistency {
                    completed: removed,
                    orphaned: to_remove[i..].to_vec(),
                    cause: Box::new(cause),
                });
            }
            removed.push(key.clone());
        }

        self.registry.write().await.remove(&id);
        info!("deleted {} {}", identity.name(), id);
        Ok(())
    }

    // ── Reveal ──

    /// The wallet's mnemonic. Fails with [`WalletError::NotHdWallet`] for
    /// private-key imports.
    pub async fn reveal_mnemonic(&self, id: WalletId) -> Result<Mnemonic, WalletError> {
        let identity = self
            .identity(id)
            .await
            .ok_or(WalletError::UnknownWallet(id))?;
        let key = identity
            .mnemonic_key()
            .ok_or(WalletError::NotHdWallet(id))?;

        let secret = with_timeout(self.config.vault_timeout, &key, self.vault.get(&key)).await?;
        let phrase = std::str::from_utf8(&secret)
            .map_err(|_| WalletError::VaultCorrupt(format!("{key} is not UTF-8")))?;
        Mnemonic::parse(phrase)
            .map_err(|e| WalletError::VaultCorrupt(format!("{key} holds an invalid mnemonic: {e}")))
    }

    /// The private key behind an address, in its import encoding.
    pub async fn reveal_private_key(
        &self,
        address: &str,
        variant: ChainVariant,
    ) -> Result<Zeroizing<String>, WalletError> {
        let key = LogicalKey::private_key(canonical_address(address, variant), variant);
        let secret = with_timeout(self.config.vault_timeout, &key, self.vault.get(&key)).await?;
        String::from_utf8(secret.to_vec())
            .map(Zeroizing::new)
            .map_err(|_| WalletError::VaultCorrupt(format!("{key} is not UTF-8")))
    }

    // ── Registry ──

    /// Re-attach an identity persisted by the host, e.g. after a restart.
    /// Every vault entry it names must exist.
    pub async fn register(&self, identity: WalletIdentity) -> Result<(), WalletError> {
        let keys = identity.vault_keys();
        let _guards = self.locks.acquire(&keys).await;

        for key in &keys {
            let present =
                with_timeout(self.config.vault_timeout, key, self.vault.contains(key)).await?;
            if !present {
                return Err(WalletError::VaultNotFound(key.to_string()));
            }
        }

        debug!("registered {} {}", identity.name(), identity.id());
        self.registry.write().await.insert(identity.id(), identity);
        Ok(())
    }

    pub async fn identity(&self, id: WalletId) -> Option<WalletIdentity> {
        self.registry.read().await.get(&id).cloned()
    }

    /// All registered identities, by display index.
    pub async fn identities(&self) -> Vec<WalletIdentity> {
        let mut all: Vec<_> = self.registry.read().await.values().cloned().collect();
        all.sort_by_key(WalletIdentity::display_index);
        all
    }

    /// Record that the user has written down the mnemonic. Returns the
    /// updated identity.
    pub async fn mark_backed_up(&self, id: WalletId) -> Result<WalletIdentity, WalletError> {
        let mut registry = self.registry.write().await;
        let identity = registry
            .get_mut(&id)
            .ok_or(WalletError::UnknownWallet(id))?;
        if identity.mark_backed_up() {
            info!("{} {} backed up", identity.name(), id);
        }
        Ok(identity.clone())
    }

    // ── Signing ──

    /// The address a wallet signs with on `variant`.
    pub async fn signer(
        &self,
        id: WalletId,
        variant: ChainVariant,
    ) -> Result<AddressEntry, WalletError> {
        let identity = self
            .identity(id)
            .await
            .ok_or(WalletError::UnknownWallet(id))?;
        identity.address_for(variant).cloned().ok_or_else(|| {
            WalletError::SigningFailure(format!("wallet {id} has no {variant} address"))
        })
    }

    /// Sign `payload` with the key stored for `signer`.
    pub async fn sign(
        &self,
        signer: &AddressEntry,
        payload: UnsignedPayload,
    ) -> Result<SignedPayload, WalletError> {
        SigningRequest::new(signer.clone(), payload)?
            .run(&self.vault, self.config.vault_timeout)
            .await
    }
}

/// EVM addresses are stored in checksum form; accept any casing.
fn canonical_address(address: &str, variant: ChainVariant) -> String {
    let address = address.trim();
    match variant {
        ChainVariant::Evm => evm::normalize_address(address).unwrap_or_else(|| address.to_string()),
        ChainVariant::Solana => address.to_string(),
    }
}
