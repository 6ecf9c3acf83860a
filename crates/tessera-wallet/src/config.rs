//! Wallet configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tessera_types::constants::DEFAULT_ACCOUNT_INDEX;
use tessera_types::{AccessPolicy, SecretClass};

/// Access policy for each secret class.
///
/// Both classes require user presence unless the host opts out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VaultPolicies {
    pub mnemonic: AccessPolicy,
    pub private_key: AccessPolicy,
}

impl Default for VaultPolicies {
    fn default() -> Self {
        Self {
            mnemonic: AccessPolicy::UserPresence,
            private_key: AccessPolicy::UserPresence,
        }
    }
}

impl VaultPolicies {
    pub fn for_class(&self, class: SecretClass) -> AccessPolicy {
        match class {
            SecretClass::Mnemonic => self.mnemonic,
            SecretClass::PrivateKey => self.private_key,
        }
    }
}

/// Configuration for a [`WalletManager`](crate::WalletManager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WalletConfig {
    /// BIP-44 account index for created and imported wallets.
    pub account_index: u32,
    /// Upper bound on any single vault call, user prompts included.
    #[serde(with = "tessera_types::duration_ms")]
    pub vault_timeout: Duration,
    pub policies: VaultPolicies,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            account_index: DEFAULT_ACCOUNT_INDEX,
            vault_timeout: Duration::from_secs(120),
            policies: VaultPolicies::default(),
        }
    }
}

/// Argon2id cost parameters for [`FileVault`](crate::FileVault).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KdfParams {
    pub t_cost: u32,
    /// Memory in KiB.
    pub m_cost: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    /// OWASP recommended minimums.
    fn default() -> Self {
        Self {
            t_cost: 3,
            m_cost: 65536, // 64 MiB
            parallelism: 4,
        }
    }
}
