//! Derivation against published BIP-44 vectors.

use tessera_crypto::{derive_all, deriver_for, ChainDeriver, CryptoError, EvmDeriver, SolanaDeriver};
use tessera_types::mnemonic::phrase_to_seed;
use tessera_types::ChainVariant;

const ABANDON: &str = "abandon abandon abandon abandon abandon abandon \
                       abandon abandon abandon abandon abandon about";
const TEST_JUNK: &str = "test test test test test test test test test test test junk";

#[test]
fn test_abandon_vectors() {
    let seed = phrase_to_seed(ABANDON).unwrap();
    let all = derive_all(seed.as_bytes(), 0).unwrap();
    assert_eq!(all[0].address(), "0x9858EfFD232B4033E47d90003D41EC34EcaEda94");
    assert_eq!(all[0].derivation_path(), Some("m/44'/60'/0'/0/0"));
    assert_eq!(all[1].address(), "HAgk14JpMQLgt6rVgv7cBQFJWFto5Dqxi472uT3DKpqk");
    assert_eq!(all[1].derivation_path(), Some("m/44'/501'/0'/0'"));
}

#[test]
fn test_hardhat_accounts() {
    let seed = phrase_to_seed(TEST_JUNK).unwrap();

    let first = EvmDeriver.derive(seed.as_bytes(), 0).unwrap();
    assert_eq!(first.address(), "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

    let second = EvmDeriver.derive(seed.as_bytes(), 1).unwrap();
    assert_eq!(second.address(), "0x70997970C51812dc3A010C7d01b50e0d17dc79C8");
    assert_eq!(
        second.private_key(),
        "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d"
    );

    let sol = SolanaDeriver.derive(seed.as_bytes(), 0).unwrap();
    assert_eq!(sol.address(), "oeYf6KAJkLYhBuR8CiGc6L4D4Xtfepr85fuDgA9kq96");
}

#[test]
fn test_derivation_is_deterministic() {
    let seed = phrase_to_seed(TEST_JUNK).unwrap();
    for variant in ChainVariant::ALL {
        for index in [0, 1, 42] {
            let a = deriver_for(variant).derive(seed.as_bytes(), index).unwrap();
            let b = deriver_for(variant).derive(seed.as_bytes(), index).unwrap();
            assert_eq!(a.address(), b.address());
            assert_eq!(a.private_key(), b.private_key());
        }
    }
}

#[test]
fn test_account_indices_differ() {
    let seed = phrase_to_seed(ABANDON).unwrap();
    let a = SolanaDeriver.derive(seed.as_bytes(), 0).unwrap();
    let b = SolanaDeriver.derive(seed.as_bytes(), 1).unwrap();
    assert_ne!(a.address(), b.address());
}

#[test]
fn test_import_recovers_derived_address() {
    let seed = phrase_to_seed(ABANDON).unwrap();
    for keypair in derive_all(seed.as_bytes(), 0).unwrap() {
        let imported = deriver_for(keypair.variant()).import(keypair.private_key()).unwrap();
        assert_eq!(imported.address(), keypair.address());
    }
}

#[test]
fn test_short_seed_is_a_derivation_failure() {
    for variant in ChainVariant::ALL {
        let err = deriver_for(variant).derive(&[0u8; 32], 0).unwrap_err();
        assert_eq!(err, CryptoError::InvalidSeedLength(32));
        assert!(err.is_derivation());
    }
}

#[test]
fn test_cross_chain_import_rejected() {
    let seed = phrase_to_seed(ABANDON).unwrap();
    let sol = SolanaDeriver.derive(seed.as_bytes(), 0).unwrap();
    assert!(matches!(
        EvmDeriver.import(sol.private_key()),
        Err(CryptoError::InvalidPrivateKey(_))
    ));
}
