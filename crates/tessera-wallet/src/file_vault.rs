//! Password-encrypted, file-backed vault.
//!
//! The whole entry map is serialized to JSON, sealed with
//! [`encryption::seal`](crate::encryption::seal) and written atomically
//! (temp file + rename) after every mutation. The AES key is derived once
//! at open time and kept in zeroizing memory. Argon2 and file I/O run on
//! the blocking thread pool.

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tessera_types::{AccessPolicy, LogicalKey};
use tokio::sync::Mutex;
use tokio::task::{self, JoinError};
use zeroize::{Zeroize, Zeroizing};

use crate::config::KdfParams;
use crate::encryption::{self, EncryptionError, KEY_LEN, SALT_LEN};
use crate::vault::{enforce_policy, PresenceGate, PutOutcome, Secret, SecureVault, VaultError};

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    policy: AccessPolicy,
    /// Hex of the secret bytes.
    secret: String,
}

impl Drop for StoredEntry {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

type Entries = BTreeMap<String, StoredEntry>;

/// Key material and contents read at open time. `entries` is `None` when
/// no vault file exists yet.
struct Loaded {
    key: Zeroizing<[u8; KEY_LEN]>,
    salt: [u8; SALT_LEN],
    entries: Option<Entries>,
}

pub struct FileVault {
    path: PathBuf,
    key: Zeroizing<[u8; KEY_LEN]>,
    salt: [u8; SALT_LEN],
    entries: Mutex<Entries>,
    gate: Arc<dyn PresenceGate>,
}

impl FileVault {
    /// Open the vault at `path`, creating an empty one if the file does not
    /// exist yet. A wrong password yields [`VaultError::Locked`].
    pub async fn open(
        path: impl AsRef<Path>,
        password: &[u8],
        kdf: KdfParams,
        gate: Arc<dyn PresenceGate>,
    ) -> Result<Self, VaultError> {
        let path = path.as_ref().to_path_buf();
        let password = Zeroizing::new(password.to_vec());
        let load_path = path.clone();
        let loaded = task::spawn_blocking(move || load(&load_path, &password, &kdf))
            .await
            .map_err(join_error)??;

        let created = loaded.entries.is_none();
        let vault = Self {
            path,
            key: loaded.key,
            salt: loaded.salt,
            entries: Mutex::new(loaded.entries.unwrap_or_default()),
            gate,
        };
        if created {
            vault.persist(&Entries::new()).await?;
            info!("created vault at {}", vault.path.display());
        } else {
            debug!(
                "opened vault at {} ({} entries)",
                vault.path.display(),
                vault.len().await
            );
        }
        Ok(vault)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    async fn persist(&self, entries: &Entries) -> Result<(), VaultError> {
        let json = Zeroizing::new(
            serde_json::to_vec(entries).map_err(|e| VaultError::Corrupt(e.to_string()))?,
        );
        let sealed = encryption::seal(&self.key, &self.salt, &json)
            .map_err(|e| VaultError::Corrupt(e.to_string()))?;

        let path = self.path.clone();
        task::spawn_blocking(move || write_atomic(&path, &sealed))
            .await
            .map_err(join_error)?
    }
}

fn load(path: &Path, password: &[u8], kdf: &KdfParams) -> Result<Loaded, VaultError> {
    if !path.exists() {
        let salt = encryption::random_salt();
        let key = encryption::derive_key(password, &salt, kdf).map_err(kdf_error)?;
        return Ok(Loaded {
            key,
            salt,
            entries: None,
        });
    }

    let data = std::fs::read(path)
        .map_err(|e| VaultError::Corrupt(format!("read {}: {e}", path.display())))?;
    let salt = encryption::read_salt(&data).map_err(|e| VaultError::Corrupt(e.to_string()))?;
    let key = encryption::derive_key(password, &salt, kdf).map_err(kdf_error)?;
    let plaintext = encryption::open(&key, &data).map_err(|e| match e {
        EncryptionError::DecryptionFailed => VaultError::Locked(e.to_string()),
        other => VaultError::Corrupt(other.to_string()),
    })?;
    let entries: Entries = serde_json::from_slice(&plaintext)
        .map_err(|e| VaultError::Corrupt(format!("vault contents: {e}")))?;
    Ok(Loaded {
        key,
        salt,
        entries: Some(entries),
    })
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<(), VaultError> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, data)
        .and_then(|()| std::fs::rename(&tmp, path))
        .map_err(|e| {
            warn!("vault write to {} failed: {}", path.display(), e);
            if let Err(cleanup) = std::fs::remove_file(&tmp) {
                if cleanup.kind() != ErrorKind::NotFound {
                    warn!("could not remove {}: {}", tmp.display(), cleanup);
                }
            }
            VaultError::Corrupt(e.to_string())
        })
}

fn join_error(e: JoinError) -> VaultError {
    VaultError::Corrupt(format!("vault task failed: {e}"))
}

fn kdf_error(e: EncryptionError) -> VaultError {
    VaultError::Locked(e.to_string())
}

fn write_rejected(key: &LogicalKey, e: VaultError) -> VaultError {
    VaultError::WriteRejected {
        key: key.clone(),
        reason: e.to_string(),
    }
}

#[async_trait]
impl SecureVault for FileVault {
    async fn put(
        &self,
        key: &LogicalKey,
        secret: &[u8],
        policy: AccessPolicy,
    ) -> Result<PutOutcome, VaultError> {
        let name = key.to_string();
        let encoded = Zeroizing::new(hex::encode(secret));
        let mut entries = self.entries.lock().await;

        if let Some(existing) = entries.get(&name) {
            return if existing.secret == *encoded {
                Ok(PutOutcome::Unchanged)
            } else {
                Err(VaultError::Conflict(key.clone()))
            };
        }

        entries.insert(
            name.clone(),
            StoredEntry {
                policy,
                secret: encoded.to_string(),
            },
        );
        if let Err(e) = self.persist(&entries).await {
            entries.remove(&name);
            return Err(write_rejected(key, e));
        }
        debug!("vault put {}", key);
        Ok(PutOutcome::Created)
    }

    async fn get(&self, key: &LogicalKey) -> Result<Secret, VaultError> {
        let name = key.to_string();
        let policy = self
            .entries
            .lock()
            .await
            .get(&name)
            .map(|e| e.policy)
            .ok_or_else(|| VaultError::NotFound(key.clone()))?;

        enforce_policy(self.gate.as_ref(), key, policy).await?;

        let entries = self.entries.lock().await;
        let entry = entries
            .get(&name)
            .ok_or_else(|| VaultError::NotFound(key.clone()))?;
        hex::decode(&entry.secret)
            .map(Zeroizing::new)
            .map_err(|e| VaultError::Corrupt(format!("{key}: {e}")))
    }

    async fn remove(&self, key: &LogicalKey) -> Result<(), VaultError> {
        let name = key.to_string();
        let mut entries = self.entries.lock().await;
        let Some(removed) = entries.remove(&name) else {
            return Ok(());
        };
        if let Err(e) = self.persist(&entries).await {
            entries.insert(name, removed);
            return Err(write_rejected(key, e));
        }
        debug!("vault remove {}", key);
        Ok(())
    }

    async fn contains(&self, key: &LogicalKey) -> Result<bool, VaultError> {
        Ok(self.entries.lock().await.contains_key(&key.to_string()))
    }
}
