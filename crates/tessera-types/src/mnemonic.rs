//! BIP-39 mnemonic phrases and seed expansion.
//!
//! New wallets get 12 English words (128 bits of entropy). Imports accept
//! any BIP-39 length. The seed is the standard PBKDF2-HMAC-SHA512 stretch
//! (2048 rounds, salt `"mnemonic" || passphrase`), 64 bytes.

use crate::constants::SEED_LEN;
use bip39::Language;
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

/// Entropy for a 12-word mnemonic.
const GENERATED_ENTROPY_LEN: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MnemonicError {
    #[error("expected 12, 15, 18, 21 or 24 words, got {0}")]
    WrongWordCount(usize),

    #[error("unknown word \"{word}\" at position {position}")]
    UnknownWord { word: String, position: usize },

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("invalid entropy length: {0} bits")]
    InvalidEntropy(usize),

    #[error("{0}")]
    Other(String),
}

/// Source of the random bytes behind a new mnemonic.
pub trait EntropySource {
    fn fill(&mut self, dest: &mut [u8]);
}

/// Operating-system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&mut self, dest: &mut [u8]) {
        OsRng.fill_bytes(dest);
    }
}

/// Replays fixed bytes. For fixtures and reproducible tests only.
#[derive(Clone)]
pub struct FixedEntropy(Zeroizing<Vec<u8>>);

impl FixedEntropy {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Zeroizing::new(bytes.into()))
    }

    /// Entropy that regenerates an existing mnemonic.
    pub fn of(mnemonic: &Mnemonic) -> Self {
        Self::new(mnemonic.inner.to_entropy())
    }
}

impl EntropySource for FixedEntropy {
    fn fill(&mut self, dest: &mut [u8]) {
        for (i, byte) in dest.iter_mut().enumerate() {
            *byte = self.0.get(i).copied().unwrap_or(0);
        }
    }
}

/// A validated English BIP-39 mnemonic.
///
/// `Debug` never prints the words.
#[derive(Clone)]
pub struct Mnemonic {
    inner: bip39::Mnemonic,
    phrase: Zeroizing<String>,
}

impl Mnemonic {
    /// Parse and validate a phrase.
    ///
    /// Whitespace is collapsed and words are lower-cased before the
    /// wordlist and checksum checks.
    pub fn parse(phrase: &str) -> Result<Self, MnemonicError> {
        let normalized = Zeroizing::new(
            phrase
                .split_whitespace()
                .map(str::to_lowercase)
                .collect::<Vec<_>>()
                .join(" "),
        );

        let inner = bip39::Mnemonic::parse_in_normalized(Language::English, &normalized)
            .map_err(|e| map_bip39_error(e, &normalized))?;

        Ok(Self {
            phrase: Zeroizing::new(inner.to_string()),
            inner,
        })
    }

    /// Build a mnemonic from raw entropy (16..=32 bytes, multiple of 4).
    pub fn from_entropy(entropy: &[u8]) -> Result<Self, MnemonicError> {
        let inner = bip39::Mnemonic::from_entropy_in(Language::English, entropy)
            .map_err(|e| map_bip39_error(e, ""))?;
        Ok(Self {
            phrase: Zeroizing::new(inner.to_string()),
            inner,
        })
    }

    /// The space-separated words.
    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    pub fn word_count(&self) -> usize {
        self.inner.word_count()
    }
}

impl fmt::Debug for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mnemonic({} words)", self.word_count())
    }
}

impl PartialEq for Mnemonic {
    fn eq(&self, other: &Self) -> bool {
        *self.phrase == *other.phrase
    }
}

impl Eq for Mnemonic {}

fn map_bip39_error(err: bip39::Error, normalized: &str) -> MnemonicError {
    match err {
        bip39::Error::BadWordCount(n) => MnemonicError::WrongWordCount(n),
        bip39::Error::UnknownWord(position) => MnemonicError::UnknownWord {
            word: normalized
                .split(' ')
                .nth(position)
                .unwrap_or_default()
                .to_string(),
            position,
        },
        bip39::Error::BadEntropyBitCount(bits) => MnemonicError::InvalidEntropy(bits),
        bip39::Error::InvalidChecksum => MnemonicError::ChecksumMismatch,
        other => MnemonicError::Other(other.to_string()),
    }
}

/// A 64-byte BIP-39 seed, zeroized on drop.
pub struct Seed([u8; SEED_LEN]);

impl Seed {
    pub fn from_bytes(bytes: [u8; SEED_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Drop for Seed {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Seed(..)")
    }
}

/// Generate a fresh 12-word mnemonic from the OS CSPRNG.
pub fn generate_mnemonic() -> Result<Mnemonic, MnemonicError> {
    generate_mnemonic_with(&mut OsEntropy)
}

/// Generate a 12-word mnemonic from the given entropy source.
pub fn generate_mnemonic_with(source: &mut impl EntropySource) -> Result<Mnemonic, MnemonicError> {
    let mut entropy = Zeroizing::new([0u8; GENERATED_ENTROPY_LEN]);
    source.fill(&mut entropy[..]);
    Mnemonic::from_entropy(&entropy[..])
}

/// Stretch a mnemonic into its seed with an empty passphrase.
pub fn mnemonic_to_seed(mnemonic: &Mnemonic) -> Seed {
    mnemonic_to_seed_with_passphrase(mnemonic, "")
}

/// Stretch a mnemonic into its seed with a BIP-39 passphrase.
pub fn mnemonic_to_seed_with_passphrase(mnemonic: &Mnemonic, passphrase: &str) -> Seed {
    Seed(mnemonic.inner.to_seed(passphrase))
}

/// Validate a phrase and stretch it in one step.
pub fn phrase_to_seed(phrase: &str) -> Result<Seed, MnemonicError> {
    Ok(mnemonic_to_seed(&Mnemonic::parse(phrase)?))
}
