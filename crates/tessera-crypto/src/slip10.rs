//! SLIP-10 hierarchical derivation for ed25519.
//!
//! ed25519 only supports hardened children. The master key is
//! `HMAC-SHA512("ed25519 seed", seed)` and each child is
//! `HMAC-SHA512(chain_code, 0x00 || key || ser32(index | 2^31))`;
//! the left half is the key, the right half the next chain code.

use crate::CryptoError;
use hmac::{Hmac, Mac};
use sha2::Sha512;
use zeroize::{Zeroize, Zeroizing};

type HmacSha512 = Hmac<Sha512>;

const ED25519_CURVE_KEY: &[u8] = b"ed25519 seed";
const HARDENED_OFFSET: u32 = 0x8000_0000;

/// A SLIP-10 node: 32-byte private key and chain code.
pub struct ExtendedKey {
    key: Zeroizing<[u8; 32]>,
    chain_code: [u8; 32],
}

impl ExtendedKey {
    /// Master node for a seed. Any seed length is accepted here; callers
    /// that need BIP-39 seeds check the length themselves.
    pub fn master(seed: &[u8]) -> Result<Self, CryptoError> {
        hmac_split(ED25519_CURVE_KEY, &[seed])
    }

    /// Hardened child. `index` is the unhardened index; the hardened bit
    /// is set here.
    pub fn child(&self, index: u32) -> Result<Self, CryptoError> {
        if index >= HARDENED_OFFSET {
            return Err(CryptoError::InvalidPath(format!("index {index} out of range")));
        }
        let ser = (index | HARDENED_OFFSET).to_be_bytes();
        hmac_split(&self.chain_code, &[&[0u8], &self.key[..], &ser])
    }

    pub fn key(&self) -> &[u8; 32] {
        &self.key
    }

    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }
}

fn hmac_split(key: &[u8], parts: &[&[u8]]) -> Result<ExtendedKey, CryptoError> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|e| CryptoError::Derivation(e.to_string()))?;
    for part in parts {
        mac.update(part);
    }
    let mut out = mac.finalize().into_bytes();

    let mut node = ExtendedKey {
        key: Zeroizing::new([0u8; 32]),
        chain_code: [0u8; 32],
    };
    node.key.copy_from_slice(&out[..32]);
    node.chain_code.copy_from_slice(&out[32..]);
    out.as_mut_slice().zeroize();
    Ok(node)
}

/// Parse a path like `m/44'/501'/0'/0'` into unhardened indices.
///
/// Every segment must be hardened (`'` or `h` suffix).
pub fn parse_hardened_path(path: &str) -> Result<Vec<u32>, CryptoError> {
    let mut segments = path.split('/');
    if segments.next() != Some("m") {
        return Err(CryptoError::InvalidPath(path.to_string()));
    }

    segments
        .map(|seg| {
            let digits = seg
                .strip_suffix('\'')
                .or_else(|| seg.strip_suffix('h'))
                .ok_or_else(|| {
                    CryptoError::InvalidPath(format!("{path}: segment {seg} is not hardened"))
                })?;
            let index: u32 = digits
                .parse()
                .map_err(|_| CryptoError::InvalidPath(format!("{path}: bad segment {seg}")))?;
            if index >= HARDENED_OFFSET {
                return Err(CryptoError::InvalidPath(format!("{path}: index {index} out of range")));
            }
            Ok(index)
        })
        .collect()
}

/// Derive the node at `path` from `seed`.
pub fn derive_path(seed: &[u8], path: &str) -> Result<ExtendedKey, CryptoError> {
    let indices = parse_hardened_path(path)?;
    let mut node = ExtendedKey::master(seed)?;
    for index in indices {
        node = node.child(index)?;
    }
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    // SLIP-10 test vector 1 for ed25519.
    const VECTOR1_SEED: &str = "000102030405060708090a0b0c0d0e0f";

    #[test]
    fn test_vector1_master() {
        let seed = hex::decode(VECTOR1_SEED).unwrap();
        let master = ExtendedKey::master(&seed).unwrap();
        assert_eq!(
            hex::encode(master.key()),
            "2b4be7f19ee27bbf30c667b642d5f4aa69fd169872f8fc3059c08ebae2eb19e7"
        );
        assert_eq!(
            hex::encode(master.chain_code()),
            "90046a93de5380a72b5e45010748567d5ea02bbf6522f979e05c0d8d8ca9fffb"
        );
    }

    #[test]
    fn test_vector1_deep_path() {
        let seed = hex::decode(VECTOR1_SEED).unwrap();
        let node = derive_path(&seed, "m/0'/1'/2'/2'/1000000000'").unwrap();
        assert_eq!(
            hex::encode(node.key()),
            "8f94d394a8e8fd6b1bc2f3f49f5c47e385281d5c17e65324b0f62483e37e8793"
        );
    }

    #[test]
    fn test_parse_path() {
        assert_eq!(parse_hardened_path("m/44'/501'/0'/0'").unwrap(), vec![44, 501, 0, 0]);
        assert_eq!(parse_hardened_path("m/44h/501h").unwrap(), vec![44, 501]);
        assert_eq!(parse_hardened_path("m").unwrap(), Vec::<u32>::new());
    }

    #[test]
    fn test_parse_path_rejects_soft_and_garbage() {
        assert!(parse_hardened_path("m/44'/501'/0'/0").is_err());
        assert!(parse_hardened_path("44'/501'").is_err());
        assert!(parse_hardened_path("m/x'").is_err());
        assert!(parse_hardened_path("m/2147483648'").is_err());
    }
}
