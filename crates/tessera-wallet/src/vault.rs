//! The secure-vault contract and an in-memory implementation.
//!
//! The vault is the only place secrets live. Callers address entries by
//! [`LogicalKey`] and never see the storage layout. Every operation may
//! suspend on user interaction (biometric or passcode prompt), so the
//! contract is async.

use async_trait::async_trait;
use log::{debug, warn};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tessera_types::{AccessPolicy, LogicalKey};
use thiserror::Error;
use tokio::sync::RwLock;
use zeroize::Zeroizing;

use crate::error::WalletError;

/// Secret bytes released by the vault, zeroized on drop.
pub type Secret = Zeroizing<Vec<u8>>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VaultError {
    #[error("{0} already holds a different secret")]
    Conflict(LogicalKey),

    #[error("write to {key} rejected: {reason}")]
    WriteRejected { key: LogicalKey, reason: String },

    #[error("no entry for {0}")]
    NotFound(LogicalKey),

    #[error("access to {key} denied: {reason}")]
    AccessDenied { key: LogicalKey, reason: String },

    #[error("vault locked: {0}")]
    Locked(String),

    #[error("vault storage corrupt: {0}")]
    Corrupt(String),
}

impl From<VaultError> for WalletError {
    fn from(e: VaultError) -> Self {
        match e {
            VaultError::Conflict(key) => WalletError::VaultWriteError {
                key: key.to_string(),
                reason: "entry already holds a different secret".into(),
            },
            VaultError::WriteRejected { key, reason } => WalletError::VaultWriteError {
                key: key.to_string(),
                reason,
            },
            VaultError::NotFound(key) => WalletError::VaultNotFound(key.to_string()),
            VaultError::AccessDenied { key, reason } => WalletError::VaultAccessDenied {
                key: key.to_string(),
                reason,
            },
            VaultError::Locked(reason) => WalletError::VaultAccessDenied {
                key: "vault".into(),
                reason,
            },
            VaultError::Corrupt(reason) => WalletError::VaultCorrupt(reason),
        }
    }
}

/// Result of a successful [`SecureVault::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The entry did not exist and was written.
    Created,
    /// The entry already held exactly this secret; nothing changed.
    Unchanged,
}

/// Encrypted key-value store for secrets.
#[async_trait]
pub trait SecureVault: Send + Sync {
    /// Store `secret` under `key`. Never overwrites a different value.
    async fn put(
        &self,
        key: &LogicalKey,
        secret: &[u8],
        policy: AccessPolicy,
    ) -> Result<PutOutcome, VaultError>;

    /// Release a secret, enforcing the policy it was stored with.
    async fn get(&self, key: &LogicalKey) -> Result<Secret, VaultError>;

    /// Erase an entry. Absent keys are not an error.
    async fn remove(&self, key: &LogicalKey) -> Result<(), VaultError>;

    /// Whether an entry exists. Does not prompt the user.
    async fn contains(&self, key: &LogicalKey) -> Result<bool, VaultError>;
}

#[async_trait]
impl<T: SecureVault + ?Sized> SecureVault for Arc<T> {
    async fn put(
        &self,
        key: &LogicalKey,
        secret: &[u8],
        policy: AccessPolicy,
    ) -> Result<PutOutcome, VaultError> {
        (**self).put(key, secret, policy).await
    }

    async fn get(&self, key: &LogicalKey) -> Result<Secret, VaultError> {
        (**self).get(key).await
    }

    async fn remove(&self, key: &LogicalKey) -> Result<(), VaultError> {
        (**self).remove(key).await
    }

    async fn contains(&self, key: &LogicalKey) -> Result<bool, VaultError> {
        (**self).contains(key).await
    }
}

/// User-presence check (biometric or device passcode) for gated entries.
#[async_trait]
pub trait PresenceGate: Send + Sync {
    /// Ask the user to confirm access to `key`. `false` means denied or
    /// cancelled.
    async fn confirm(&self, key: &LogicalKey) -> bool;
}

/// Gate that always confirms. For hosts that enforce presence elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysPresent;

#[async_trait]
impl PresenceGate for AlwaysPresent {
    async fn confirm(&self, _key: &LogicalKey) -> bool {
        true
    }
}

/// Check `policy` against the gate before releasing `key`.
pub(crate) async fn enforce_policy(
    gate: &dyn PresenceGate,
    key: &LogicalKey,
    policy: AccessPolicy,
) -> Result<(), VaultError> {
    if policy.requires_presence() && !gate.confirm(key).await {
        return Err(VaultError::AccessDenied {
            key: key.clone(),
            reason: "user presence not confirmed".into(),
        });
    }
    Ok(())
}

/// Run one vault call under `limit`. Expiry is reported as denied access
/// to `key`, the same as a cancelled prompt.
pub(crate) async fn with_timeout<T>(
    limit: Duration,
    key: &LogicalKey,
    call: impl Future<Output = Result<T, VaultError>>,
) -> Result<T, WalletError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(WalletError::from),
        Err(_) => {
            warn!("vault call for {} timed out after {:?}", key, limit);
            Err(WalletError::VaultAccessDenied {
                key: key.to_string(),
                reason: format!("no response within {:?}", limit),
            })
        }
    }
}

struct MemoryEntry {
    secret: Secret,
    policy: AccessPolicy,
}

/// Process-local vault. Secrets vanish with the process.
pub struct MemoryVault {
    entries: RwLock<HashMap<LogicalKey, MemoryEntry>>,
    gate: Arc<dyn PresenceGate>,
}

impl Default for MemoryVault {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::with_gate(Arc::new(AlwaysPresent))
    }

    pub fn with_gate(gate: Arc<dyn PresenceGate>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            gate,
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// All keys currently stored, sorted.
    pub async fn keys(&self) -> Vec<LogicalKey> {
        let mut keys: Vec<_> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Policy an entry was stored with.
    pub async fn policy_of(&self, key: &LogicalKey) -> Option<AccessPolicy> {
        self.entries.read().await.get(key).map(|e| e.policy)
    }
}

#[async_trait]
impl SecureVault for MemoryVault {
    async fn put(
        &self,
        key: &LogicalKey,
        secret: &[u8],
        policy: AccessPolicy,
    ) -> Result<PutOutcome, VaultError> {
        let mut entries = self.entries.write().await;
        if let Some(existing) = entries.get(key) {
            return if existing.secret.as_slice() == secret {
                Ok(PutOutcome::Unchanged)
            } else {
                Err(VaultError::Conflict(key.clone()))
            };
        }
        entries.insert(
            key.clone(),
            MemoryEntry {
                secret: Zeroizing::new(secret.to_vec()),
                policy,
            },
        );
        debug!("vault put {}", key);
        Ok(PutOutcome::Created)
    }

    async fn get(&self, key: &LogicalKey) -> Result<Secret, VaultError> {
        let policy = self
            .entries
            .read()
            .await
            .get(key)
            .map(|e| e.policy)
            .ok_or_else(|| VaultError::NotFound(key.clone()))?;

        enforce_policy(self.gate.as_ref(), key, policy).await?;

        // Re-read: the entry may have been removed while the prompt was up.
        self.entries
            .read()
            .await
            .get(key)
            .map(|e| e.secret.clone())
            .ok_or_else(|| VaultError::NotFound(key.clone()))
    }

    async fn remove(&self, key: &LogicalKey) -> Result<(), VaultError> {
        if self.entries.write().await.remove(key).is_some() {
            debug!("vault remove {}", key);
        }
        Ok(())
    }

    async fn contains(&self, key: &LogicalKey) -> Result<bool, VaultError> {
        Ok(self.entries.read().await.contains_key(key))
    }
}
