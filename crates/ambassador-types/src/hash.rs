//! Fixed-size hashes and asset names, hex-encoded at every boundary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::constants::{CREDENTIAL_HASH_SIZE, MAX_ASSET_NAME_SIZE};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HexError {
    #[error("invalid hex: {0}")]
    Hex(String),

    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("asset name longer than {max} bytes: {actual}")]
    AssetNameTooLong { max: usize, actual: usize },
}

/// A blake2b-224 hash: verification-key hashes, script hashes, policy ids.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash28(pub [u8; CREDENTIAL_HASH_SIZE]);

pub type KeyHash = Hash28;
pub type ScriptHash = Hash28;
pub type PolicyId = Hash28;

impl Hash28 {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, HexError> {
        if bytes.len() != CREDENTIAL_HASH_SIZE {
            return Err(HexError::Length {
                expected: CREDENTIAL_HASH_SIZE,
                actual: bytes.len(),
            });
        }
        let mut out = [0u8; CREDENTIAL_HASH_SIZE];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }

    pub fn as_bytes(&self) -> &[u8; CREDENTIAL_HASH_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Hash28 {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, HexError> {
        let bytes = hex::decode(s.trim()).map_err(|e| HexError::Hex(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Display for Hash28 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash28 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash28({})", self.to_hex())
    }
}

impl Serialize for Hash28 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash28 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A token's asset name (0 to 32 raw bytes).
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetName(Vec<u8>);

impl AssetName {
    pub fn new(bytes: Vec<u8>) -> Result<Self, HexError> {
        if bytes.len() > MAX_ASSET_NAME_SIZE {
            return Err(HexError::AssetNameTooLong {
                max: MAX_ASSET_NAME_SIZE,
                actual: bytes.len(),
            });
        }
        Ok(Self(bytes))
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl FromStr for AssetName {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, HexError> {
        let bytes = hex::decode(s.trim()).map_err(|e| HexError::Hex(e.to_string()))?;
        Self::new(bytes)
    }
}

impl fmt::Display for AssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for AssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetName({})", self.to_hex())
    }
}

impl Serialize for AssetName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AssetName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
