//! Solana (ed25519) keys and addresses.
//!
//! Addresses are the base58 public key. The vault encoding of a Solana
//! private key is base58 of the 64-byte `secret || public` keypair, the
//! format Solana wallets and `solana-keygen` exchange.

use crate::{check_seed, slip10, CryptoError};
use ed25519_dalek::{SigningKey, VerifyingKey, KEYPAIR_LENGTH, SECRET_KEY_LENGTH};
use zeroize::Zeroizing;

/// Derive the ed25519 signing key at a fully hardened SLIP-10 path.
pub fn derive_signing_key(seed: &[u8], path: &str) -> Result<SigningKey, CryptoError> {
    check_seed(seed)?;
    let node = slip10::derive_path(seed, path)?;
    Ok(SigningKey::from_bytes(node.key()))
}

/// Parse a base58 secret: a 64-byte keypair or a 32-byte secret seed.
///
/// For keypairs the public half must match the secret half.
pub fn signing_key_from_base58(secret: &str) -> Result<SigningKey, CryptoError> {
    let bytes = Zeroizing::new(
        bs58::decode(secret.trim())
            .into_vec()
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?,
    );

    match bytes.len() {
        KEYPAIR_LENGTH => {
            let mut keypair = Zeroizing::new([0u8; KEYPAIR_LENGTH]);
            keypair.copy_from_slice(&bytes);
            SigningKey::from_keypair_bytes(&keypair).map_err(|_| {
                CryptoError::InvalidPrivateKey("public key does not match secret key".into())
            })
        }
        SECRET_KEY_LENGTH => {
            let mut secret = Zeroizing::new([0u8; SECRET_KEY_LENGTH]);
            secret.copy_from_slice(&bytes);
            Ok(SigningKey::from_bytes(&secret))
        }
        n => Err(CryptoError::InvalidPrivateKey(format!(
            "expected 32 or 64 bytes, got {n}"
        ))),
    }
}

/// Vault encoding of a signing key.
pub fn encode_secret(key: &SigningKey) -> Zeroizing<String> {
    let keypair = Zeroizing::new(key.to_keypair_bytes());
    Zeroizing::new(bs58::encode(&keypair[..]).into_string())
}

/// Base58 address of a public key.
pub fn address_of(key: &VerifyingKey) -> String {
    bs58::encode(key.as_bytes()).into_string()
}

/// Decode a base58 address back to its 32 public-key bytes.
pub fn decode_address(address: &str) -> Option<[u8; 32]> {
    let bytes = bs58::decode(address).into_vec().ok()?;
    bytes.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_types::mnemonic::phrase_to_seed;

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon \
                           abandon abandon abandon abandon abandon about";

    #[test]
    fn test_derive_abandon_account_zero() {
        let seed = phrase_to_seed(ABANDON).unwrap();
        let key = derive_signing_key(seed.as_bytes(), "m/44'/501'/0'/0'").unwrap();
        assert_eq!(
            address_of(&key.verifying_key()),
            "HAgk14JpMQLgt6rVgv7cBQFJWFto5Dqxi472uT3DKpqk"
        );
    }

    #[test]
    fn test_soft_path_rejected() {
        let seed = [1u8; 64];
        assert!(matches!(
            derive_signing_key(&seed, "m/44'/501'/0'/0"),
            Err(CryptoError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_secret_encoding_round_trip() {
        let key = SigningKey::from_bytes(&[9u8; 32]);
        let encoded = encode_secret(&key);
        assert_eq!(bs58::decode(encoded.as_str()).into_vec().unwrap().len(), 64);

        let parsed = signing_key_from_base58(&encoded).unwrap();
        assert_eq!(parsed.to_bytes(), key.to_bytes());

        let seed_only = bs58::encode([9u8; 32]).into_string();
        let parsed = signing_key_from_base58(&seed_only).unwrap();
        assert_eq!(parsed.verifying_key(), key.verifying_key());
    }

    #[test]
    fn test_mismatched_keypair_rejected() {
        let a = SigningKey::from_bytes(&[1u8; 32]);
        let b = SigningKey::from_bytes(&[2u8; 32]);
        let mut forged = [0u8; 64];
        forged[..32].copy_from_slice(&a.to_bytes());
        forged[32..].copy_from_slice(b.verifying_key().as_bytes());
        let encoded = bs58::encode(forged).into_string();
        assert!(matches!(
            signing_key_from_base58(&encoded),
            Err(CryptoError::InvalidPrivateKey(_))
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(signing_key_from_base58("0OIl").is_err());
        assert!(signing_key_from_base58(&bs58::encode([1u8; 20]).into_string()).is_err());
    }

    #[test]
    fn test_address_decodes() {
        let key = SigningKey::from_bytes(&[3u8; 32]);
        let addr = address_of(&key.verifying_key());
        assert_eq!(decode_address(&addr).unwrap(), key.verifying_key().to_bytes());
        assert!(decode_address("short").is_none());
    }
}
