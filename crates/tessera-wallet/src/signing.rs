//! Signing state machine.
//!
//! A [`SigningRequest`] moves `Unsigned -> KeyResolved -> Signed`, or to
//! `Failed` from any step. The private key exists in memory only between
//! resolution and signing, and the signed output is handed back to the
//! caller without being stored anywhere.

use log::{debug, warn};
use std::time::Duration;
use tessera_tx::{sign_with_secret, SignedPayload, UnsignedPayload};
use tessera_types::AddressEntry;
use zeroize::Zeroizing;

use crate::error::WalletError;
use crate::vault::{with_timeout, SecureVault};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningState {
    Unsigned,
    KeyResolved,
    Signed,
    Failed,
}

pub struct SigningRequest {
    signer: AddressEntry,
    payload: UnsignedPayload,
    state: SigningState,
    key: Option<Zeroizing<String>>,
}

impl SigningRequest {
    /// Pair a payload with the address expected to sign it.
    pub fn new(signer: AddressEntry, payload: UnsignedPayload) -> Result<Self, WalletError> {
        if payload.variant() != signer.variant {
            return Err(WalletError::SigningFailure(format!(
                "{} payload cannot be signed by {} address {}",
                payload.variant(),
                signer.variant,
                signer.address
            )));
        }
        Ok(Self {
            signer,
            payload,
            state: SigningState::Unsigned,
            key: None,
        })
    }

    pub fn state(&self) -> SigningState {
        self.state
    }

    pub fn signer(&self) -> &AddressEntry {
        &self.signer
    }

    pub fn payload(&self) -> &UnsignedPayload {
        &self.payload
    }

    /// Fetch the signer's key from the vault.
    ///
    /// Denied or timed-out access stays [`WalletError::VaultAccessDenied`]
    /// so the caller can ask again; any other retrieval problem is a
    /// signing failure.
    pub async fn resolve_key<V: SecureVault + ?Sized>(
        &mut self,
        vault: &V,
        timeout: Duration,
    ) -> Result<(), WalletError> {
        self.expect_state(SigningState::Unsigned, "resolve_key")?;

        let key = self.signer.logical_key();
        let secret = match with_timeout(timeout, &key, vault.get(&key)).await {
            Ok(secret) => secret,
            Err(e) => return Err(self.fail(e)),
        };
        let encoded = match std::str::from_utf8(&secret) {
            Ok(text) => Zeroizing::new(text.to_string()),
            Err(_) => {
                return Err(self.fail(WalletError::VaultCorrupt(format!(
                    "{key} does not hold a text-encoded key"
                ))))
            }
        };

        self.key = Some(encoded);
        self.state = SigningState::KeyResolved;
        debug!("resolved {} key for {}", self.signer.variant, self.signer.address);
        Ok(())
    }

    /// Sign the payload with the resolved key. The key is dropped whatever
    /// the outcome.
    pub fn sign(&mut self) -> Result<SignedPayload, WalletError> {
        self.expect_state(SigningState::KeyResolved, "sign")?;
        let Some(key) = self.key.take() else {
            return Err(self.fail(WalletError::SigningFailure("no resolved key".into())));
        };

        match sign_with_secret(&self.payload, &key, &self.signer.address) {
            Ok(signed) => {
                self.state = SigningState::Signed;
                Ok(signed)
            }
            Err(e) => Err(self.fail(WalletError::SigningFailure(e.to_string()))),
        }
    }

    /// Resolve and sign in one go.
    pub async fn run<V: SecureVault + ?Sized>(
        mut self,
        vault: &V,
        timeout: Duration,
    ) -> Result<SignedPayload, WalletError> {
        self.resolve_key(vault, timeout).await?;
        self.sign()
    }

    fn expect_state(&mut self, wanted: SigningState, step: &str) -> Result<(), WalletError> {
        if self.state == wanted {
            return Ok(());
        }
        let err = WalletError::SigningFailure(format!(
            "{step} called in state {:?}, expected {:?}",
            self.state, wanted
        ));
        Err(self.fail(err))
    }

    fn fail(&mut self, err: WalletError) -> WalletError {
        self.key = None;
        self.state = SigningState::Failed;
        let err = if matches!(
            err,
            WalletError::VaultAccessDenied { .. } | WalletError::SigningFailure(_)
        ) {
            err
        } else {
            WalletError::SigningFailure(err.to_string())
        };
        warn!("signing for {} failed: {}", self.signer.address, err);
        err
    }
}
