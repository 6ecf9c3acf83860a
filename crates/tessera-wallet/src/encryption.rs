//! Vault file encryption.
//!
//! Encrypts vault contents using Argon2id key derivation + AES-256-GCM.
//! The encrypted format is self-contained with all parameters needed for
//! decryption (except the password and KDF costs):
//!
//!   magic "TSVT" (4) | version (1) | salt (32) | nonce (12) | ciphertext

use crate::config::KdfParams;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroizing;

/// Magic bytes identifying a Tessera vault file.
pub const MAGIC: &[u8; 4] = b"TSVT";

/// Current vault file format version.
pub const VERSION: u8 = 1;

pub const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Header size: 4 (magic) + 1 (version) + 32 (salt) + 12 (nonce) = 49 bytes.
pub const HEADER_SIZE: usize = 4 + 1 + SALT_LEN + NONCE_LEN;

pub const KEY_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncryptionError {
    #[error("invalid vault file: {0}")]
    InvalidFile(String),

    #[error("decryption failed (wrong password or corrupted data)")]
    DecryptionFailed,

    #[error("key derivation failed: {0}")]
    Kdf(String),

    #[error("encryption failed: {0}")]
    Encryption(String),
}

/// Fresh random salt.
pub fn random_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Derive the AES key from a password via Argon2id.
pub fn derive_key(
    password: &[u8],
    salt: &[u8],
    kdf: &KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>, EncryptionError> {
    let params = Params::new(kdf.m_cost, kdf.t_cost, kdf.parallelism, Some(KEY_LEN))
        .map_err(|e| EncryptionError::Kdf(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(password, salt, &mut key[..])
        .map_err(|e| EncryptionError::Kdf(e.to_string()))?;
    Ok(key)
}

/// Encrypt with an already derived key. A fresh nonce is drawn per call.
///
/// Returns the complete file contents (header + ciphertext).
#[allow(deprecated)] // aes-gcm 0.10 uses generic-array 0.x
pub fn seal(
    key: &[u8; KEY_LEN],
    salt: &[u8; SALT_LEN],
    plaintext: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| EncryptionError::Encryption(e.to_string()))?;

    let mut output = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
    output.extend_from_slice(MAGIC);
    output.push(VERSION);
    output.extend_from_slice(salt);
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

/// Read the salt out of a vault file header, validating magic and version.
pub fn read_salt(data: &[u8]) -> Result<[u8; SALT_LEN], EncryptionError> {
    if data.len() < HEADER_SIZE {
        return Err(EncryptionError::InvalidFile("file too short".into()));
    }
    if &data[0..4] != MAGIC {
        return Err(EncryptionError::InvalidFile("invalid magic bytes".into()));
    }
    let version = data[4];
    if version != VERSION {
        return Err(EncryptionError::InvalidFile(format!(
            "unsupported version: {}",
            version
        )));
    }
    let mut salt = [0u8; SALT_LEN];
    salt.copy_from_slice(&data[5..5 + SALT_LEN]);
    Ok(salt)
}

/// Decrypt a vault file with an already derived key.
#[allow(deprecated)] // aes-gcm 0.10 uses generic-array 0.x
pub fn open(key: &[u8; KEY_LEN], data: &[u8]) -> Result<Zeroizing<Vec<u8>>, EncryptionError> {
    read_salt(data)?;
    let nonce_bytes = &data[5 + SALT_LEN..HEADER_SIZE];
    let ciphertext = &data[HEADER_SIZE..];
    if ciphertext.is_empty() {
        return Err(EncryptionError::InvalidFile("no ciphertext".into()));
    }

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| EncryptionError::DecryptionFailed)
}

/// Check if data looks like a vault file (has TSVT magic).
pub fn is_vault_file(data: &[u8]) -> bool {
    data.len() >= HEADER_SIZE && &data[0..4] == MAGIC
}
