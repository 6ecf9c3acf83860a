//! Chain variants and derivation constants.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// SLIP-44 coin type for Ethereum and EVM-compatible chains.
pub const EVM_COIN_TYPE: u32 = 60;

/// SLIP-44 coin type for Solana.
pub const SOLANA_COIN_TYPE: u32 = 501;

/// Length of a BIP-39 seed in bytes.
pub const SEED_LEN: usize = 64;

/// Account index used when a wallet is created or imported.
pub const DEFAULT_ACCOUNT_INDEX: u32 = 0;

/// Blockchain account model a key belongs to.
///
/// The set is closed: every workflow matches on it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChainVariant {
    #[serde(rename = "EVM", alias = "evm", alias = "Evm")]
    Evm,
    #[serde(rename = "Solana", alias = "solana", alias = "SOLANA")]
    Solana,
}

impl ChainVariant {
    /// All supported variants, in the order addresses are listed in a wallet.
    pub const ALL: [ChainVariant; 2] = [ChainVariant::Evm, ChainVariant::Solana];

    /// Tag used in vault keys and service payloads.
    pub fn tag(&self) -> &'static str {
        match self {
            ChainVariant::Evm => "EVM",
            ChainVariant::Solana => "Solana",
        }
    }

    /// SLIP-44 coin type.
    pub fn coin_type(&self) -> u32 {
        match self {
            ChainVariant::Evm => EVM_COIN_TYPE,
            ChainVariant::Solana => SOLANA_COIN_TYPE,
        }
    }

    /// BIP-44 derivation path for an account index.
    ///
    /// EVM: `m/44'/60'/0'/0/{i}`. Solana: `m/44'/501'/{i}'/0'`.
    pub fn derivation_path(&self, account_index: u32) -> String {
        match self {
            ChainVariant::Evm => format!("m/44'/{}'/0'/0/{}", EVM_COIN_TYPE, account_index),
            ChainVariant::Solana => {
                format!("m/44'/{}'/{}'/0'", SOLANA_COIN_TYPE, account_index)
            }
        }
    }
}

impl fmt::Display for ChainVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ChainVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "evm" => Ok(ChainVariant::Evm),
            "solana" => Ok(ChainVariant::Solana),
            _ => Err(format!("unknown chain variant: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_paths() {
        assert_eq!(ChainVariant::Evm.derivation_path(0), "m/44'/60'/0'/0/0");
        assert_eq!(ChainVariant::Evm.derivation_path(7), "m/44'/60'/0'/0/7");
        assert_eq!(ChainVariant::Solana.derivation_path(0), "m/44'/501'/0'/0'");
        assert_eq!(ChainVariant::Solana.derivation_path(3), "m/44'/501'/3'/0'");
    }

    #[test]
    fn test_tags_round_trip() {
        for variant in ChainVariant::ALL {
            assert_eq!(variant.tag().parse::<ChainVariant>().unwrap(), variant);
        }
        assert!("bitcoin".parse::<ChainVariant>().is_err());
    }

    #[test]
    fn test_serde_tags() {
        assert_eq!(serde_json::to_string(&ChainVariant::Evm).unwrap(), "\"EVM\"");
        assert_eq!(serde_json::to_string(&ChainVariant::Solana).unwrap(), "\"Solana\"");
        let parsed: ChainVariant = serde_json::from_str("\"evm\"").unwrap();
        assert_eq!(parsed, ChainVariant::Evm);
    }
}
