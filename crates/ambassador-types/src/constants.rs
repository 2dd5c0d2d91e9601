//! Network identifiers and protocol-level constants.

use serde::{Deserialize, Serialize};

// =============================================================================
// Network Types
// =============================================================================

/// Cardano network the program is deployed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Preprod,
    Preview,
}

impl Network {
    /// Network id carried in the low nibble of every Shelley address header.
    pub fn network_id(&self) -> u8 {
        match self {
            Network::Mainnet => 1,
            Network::Preprod | Network::Preview => 0,
        }
    }

    /// Human-readable part for payment addresses.
    pub fn address_hrp(&self) -> &'static str {
        match self {
            Network::Mainnet => "addr",
            Network::Preprod | Network::Preview => "addr_test",
        }
    }

    /// Human-readable part for reward (stake) addresses.
    pub fn stake_hrp(&self) -> &'static str {
        match self {
            Network::Mainnet => "stake",
            Network::Preprod | Network::Preview => "stake_test",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Preprod => "preprod",
            Network::Preview => "preview",
        }
    }
}

impl std::str::FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" => Ok(Network::Mainnet),
            "preprod" => Ok(Network::Preprod),
            "preview" => Ok(Network::Preview),
            _ => Err(format!("unknown network: {} (use mainnet, preprod, or preview)", s)),
        }
    }
}

// =============================================================================
// Sizes and Units
// =============================================================================

/// Unit string for ada, as used by chain providers.
pub const LOVELACE: &str = "lovelace";

/// Lovelace per ada.
pub const LOVELACE_PER_ADA: u64 = 1_000_000;

/// Size of a verification-key or script hash (blake2b-224).
pub const CREDENTIAL_HASH_SIZE: usize = 28;

/// Size of a minting policy id in bytes.
pub const POLICY_ID_SIZE: usize = 28;

/// Size of a transaction hash (blake2b-256).
pub const TX_HASH_SIZE: usize = 32;

/// Longest byte string a single Plutus data leaf may hold.
pub const MAX_BYTES_CHUNK: usize = 64;

/// Longest asset name allowed by the ledger.
pub const MAX_ASSET_NAME_SIZE: usize = 32;

/// Lovelace kept aside on top of a withdrawal so the change output is
/// never below the minimum UTxO value.
pub const MIN_UTXO_BUFFER_LOVELACE: u64 = 2 * LOVELACE_PER_ADA;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_ids() {
        assert_eq!(Network::Mainnet.network_id(), 1);
        assert_eq!(Network::Preprod.network_id(), 0);
        assert_eq!(Network::Preview.network_id(), 0);
    }

    #[test]
    fn test_network_from_str() {
        assert_eq!("Preprod".parse::<Network>().unwrap(), Network::Preprod);
        assert_eq!("main".parse::<Network>().unwrap(), Network::Mainnet);
        assert!("devnet".parse::<Network>().is_err());
    }

    #[test]
    fn test_network_serde() {
        let json = serde_json::to_string(&Network::Preview).unwrap();
        assert_eq!(json, "\"preview\"");
    }
}
