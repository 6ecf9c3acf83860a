//! EVM (secp256k1) keys and addresses.
//!
//! The vault encoding of an EVM private key is 64 lowercase hex characters
//! with no `0x` prefix. Addresses are EIP-55 checksummed.

use crate::{check_seed, keccak256, CryptoError};
use bip32::{DerivationPath, XPrv};
use k256::ecdsa::{SigningKey, VerifyingKey};
use std::str::FromStr;
use zeroize::Zeroizing;

/// Derive the secp256k1 signing key at a BIP-32 path.
pub fn derive_signing_key(seed: &[u8], path: &str) -> Result<SigningKey, CryptoError> {
    check_seed(seed)?;
    let path = DerivationPath::from_str(path)
        .map_err(|e| CryptoError::InvalidPath(format!("{path}: {e}")))?;
    let xprv = XPrv::derive_from_path(seed, &path)
        .map_err(|e| CryptoError::Derivation(e.to_string()))?;
    Ok(xprv.private_key().clone())
}

/// Parse the vault/import form of a private key.
///
/// Accepts 64 hex characters with an optional `0x` prefix. The scalar must
/// be a valid non-zero secp256k1 key.
pub fn signing_key_from_hex(secret: &str) -> Result<SigningKey, CryptoError> {
    let trimmed = secret.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.len() != 64 {
        return Err(CryptoError::InvalidPrivateKey(format!(
            "expected 64 hex characters, got {}",
            digits.len()
        )));
    }
    let bytes = Zeroizing::new(
        hex::decode(digits).map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?,
    );
    SigningKey::from_slice(&bytes)
        .map_err(|_| CryptoError::InvalidPrivateKey("scalar out of range".into()))
}

/// Vault encoding of a signing key.
pub fn encode_secret(key: &SigningKey) -> Zeroizing<String> {
    Zeroizing::new(hex::encode(key.to_bytes()))
}

/// EIP-55 address of a public key.
pub fn address_of(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    to_checksum_address(&hash[12..])
}

/// EIP-55 checksum encoding of a 20-byte address.
pub fn to_checksum_address(address: &[u8]) -> String {
    let lower = hex::encode(address);
    let hash = keccak256(lower.as_bytes());

    let mut out = String::with_capacity(2 + lower.len());
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Normalise any-case `0x` address text to its EIP-55 form.
pub fn normalize_address(address: &str) -> Option<String> {
    let digits = address.strip_prefix("0x").or_else(|| address.strip_prefix("0X"))?;
    if digits.len() != 40 {
        return None;
    }
    let bytes = hex::decode(digits).ok()?;
    Some(to_checksum_address(&bytes))
}
