//! Core types for the ambassador program off-chain layer.
//!
//! This crate provides the foundational types used across all ambassador
//! crates: network configuration, Shelley address encoding/decoding,
//! hashes and asset names, multi-asset values, UTxO records as returned by
//! chain providers, and small text helpers used for token names.

pub mod address;
pub mod constants;
pub mod hash;
pub mod text;
pub mod utxo;
pub mod value;

pub use address::{Credential, ParsedAddress, StakeReference};
pub use constants::Network;
pub use hash::{AssetName, Hash28, HexError, KeyHash, PolicyId, ScriptHash};
pub use utxo::{TxInRef, TxOutput, UTxO};
pub use value::{Asset, Value, ValueError};
