//! Shelley address parsing, validation, and creation.
//!
//! Supports base, pointer, and enterprise payment addresses (key or script
//! payment part) plus reward addresses. Parsing and re-encoding are lossless
//! for every valid bech32 payment address.

use bech32::{FromBase32, ToBase32, Variant};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{Network, CREDENTIAL_HASH_SIZE};

#[derive(Debug, Error)]
pub enum AddressError {
    #[error("address must be a non-empty string")]
    Empty,

    #[error("bech32 decode error: {0}")]
    Bech32(#[from] bech32::Error),

    #[error("address must use bech32, not bech32m")]
    WrongVariant,

    #[error("unexpected human-readable part: {0}")]
    UnknownHrp(String),

    #[error("unsupported address header type: {0}")]
    UnsupportedHeader(u8),

    #[error("invalid address payload length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("network id {header} in header does not match prefix {hrp}")]
    NetworkMismatch { header: u8, hrp: String },

    #[error("malformed pointer: {0}")]
    BadPointer(String),

    #[error("invalid credential hash: {0}")]
    BadCredential(String),
}

/// A payment or staking credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Credential {
    /// Blake2b-224 hash of a verification key.
    Key([u8; CREDENTIAL_HASH_SIZE]),
    /// Blake2b-224 hash of a script.
    Script([u8; CREDENTIAL_HASH_SIZE]),
}

impl Credential {
    pub fn hash(&self) -> &[u8; CREDENTIAL_HASH_SIZE] {
        match self {
            Credential::Key(h) | Credential::Script(h) => h,
        }
    }

    pub fn is_script(&self) -> bool {
        matches!(self, Credential::Script(_))
    }

    /// Build a key credential from a hex public-key hash.
    pub fn key_from_hex(h: &str) -> Result<Self, AddressError> {
        Ok(Credential::Key(hash_from_hex(h)?))
    }

    /// Build a script credential from a hex script hash.
    pub fn script_from_hex(h: &str) -> Result<Self, AddressError> {
        Ok(Credential::Script(hash_from_hex(h)?))
    }
}

/// Delegation part of a payment address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StakeReference {
    Credential(Credential),
    Pointer { slot: u64, tx_index: u64, cert_index: u64 },
}

/// Result of parsing a payment address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAddress {
    pub network_id: u8,
    pub payment: Credential,
    pub stake: Option<StakeReference>,
}

impl ParsedAddress {
    /// Re-encode this parsed address back to a bech32 string.
    pub fn to_bech32(&self) -> Result<String, AddressError> {
        let hrp = if self.network_id == 1 { "addr" } else { "addr_test" };
        let bytes = self.to_bytes();
        Ok(bech32::encode(hrp, bytes.to_base32(), Variant::Bech32)?)
    }

    /// Raw address bytes (header followed by payload).
    pub fn to_bytes(&self) -> Vec<u8> {
        let payment_script = self.payment.is_script();
        let header_type: u8 = match &self.stake {
            Some(StakeReference::Credential(stake)) => {
                match (payment_script, stake.is_script()) {
                    (false, false) => 0,
                    (true, false) => 1,
                    (false, true) => 2,
                    (true, true) => 3,
                }
            }
            Some(StakeReference::Pointer { .. }) => {
                if payment_script { 5 } else { 4 }
            }
            None => {
                if payment_script { 7 } else { 6 }
            }
        };

        let mut out = Vec::with_capacity(1 + CREDENTIAL_HASH_SIZE * 2);
        out.push((header_type << 4) | (self.network_id & 0x0f));
        out.extend_from_slice(self.payment.hash());
        match &self.stake {
            Some(StakeReference::Credential(stake)) => out.extend_from_slice(stake.hash()),
            Some(StakeReference::Pointer { slot, tx_index, cert_index }) => {
                write_natural(&mut out, *slot);
                write_natural(&mut out, *tx_index);
                write_natural(&mut out, *cert_index);
            }
            None => {}
        }
        out
    }
}

/// Parse and validate a bech32 Shelley payment address.
pub fn parse_address(address: &str) -> Result<ParsedAddress, AddressError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(AddressError::Empty);
    }

    let (hrp, data, variant) = bech32::decode(address)?;
    if variant != Variant::Bech32 {
        return Err(AddressError::WrongVariant);
    }
    if hrp != "addr" && hrp != "addr_test" {
        return Err(AddressError::UnknownHrp(hrp));
    }

    let bytes = Vec::<u8>::from_base32(&data)?;
    let parsed = parse_address_bytes(&bytes)?;

    let expected_network = if hrp == "addr" { 1 } else { 0 };
    if parsed.network_id != expected_network {
        return Err(AddressError::NetworkMismatch {
            header: parsed.network_id,
            hrp,
        });
    }
    Ok(parsed)
}

/// Parse raw payment address bytes.
pub fn parse_address_bytes(bytes: &[u8]) -> Result<ParsedAddress, AddressError> {
    if bytes.is_empty() {
        return Err(AddressError::Empty);
    }
    let header = bytes[0];
    let header_type = header >> 4;
    let network_id = header & 0x0f;
    let payload = &bytes[1..];

    let take_hash = |slice: &[u8]| -> [u8; CREDENTIAL_HASH_SIZE] {
        let mut h = [0u8; CREDENTIAL_HASH_SIZE];
        h.copy_from_slice(&slice[..CREDENTIAL_HASH_SIZE]);
        h
    };

    match header_type {
        0..=3 => {
            expect_len(payload, CREDENTIAL_HASH_SIZE * 2)?;
            let payment_hash = take_hash(payload);
            let stake_hash = take_hash(&payload[CREDENTIAL_HASH_SIZE..]);
            let payment = if header_type & 0b01 == 0 {
                Credential::Key(payment_hash)
            } else {
                Credential::Script(payment_hash)
            };
            let stake = if header_type & 0b10 == 0 {
                Credential::Key(stake_hash)
            } else {
                Credential::Script(stake_hash)
            };
            Ok(ParsedAddress {
                network_id,
                payment,
                stake: Some(StakeReference::Credential(stake)),
            })
        }
        4 | 5 => {
            if payload.len() <= CREDENTIAL_HASH_SIZE {
                return Err(AddressError::InvalidLength {
                    expected: CREDENTIAL_HASH_SIZE + 3,
                    actual: payload.len(),
                });
            }
            let payment_hash = take_hash(payload);
            let mut rest = &payload[CREDENTIAL_HASH_SIZE..];
            let slot = read_natural(&mut rest)?;
            let tx_index = read_natural(&mut rest)?;
            let cert_index = read_natural(&mut rest)?;
            if !rest.is_empty() {
                return Err(AddressError::BadPointer(format!(
                    "{} trailing bytes",
                    rest.len()
                )));
            }
            let payment = if header_type == 4 {
                Credential::Key(payment_hash)
            } else {
                Credential::Script(payment_hash)
            };
            Ok(ParsedAddress {
                network_id,
                payment,
                stake: Some(StakeReference::Pointer { slot, tx_index, cert_index }),
            })
        }
        6 | 7 => {
            expect_len(payload, CREDENTIAL_HASH_SIZE)?;
            let payment_hash = take_hash(payload);
            let payment = if header_type == 6 {
                Credential::Key(payment_hash)
            } else {
                Credential::Script(payment_hash)
            };
            Ok(ParsedAddress {
                network_id,
                payment,
                stake: None,
            })
        }
        other => Err(AddressError::UnsupportedHeader(other)),
    }
}

/// Validate a payment address string.
pub fn is_valid_address(address: &str) -> bool {
    parse_address(address).is_ok()
}

/// Build an enterprise (no delegation) script address.
pub fn script_address(script_hash: &str, network: Network) -> Result<String, AddressError> {
    ParsedAddress {
        network_id: network.network_id(),
        payment: Credential::script_from_hex(script_hash)?,
        stake: None,
    }
    .to_bech32()
}

/// Build the reward address of a credential.
pub fn reward_address(credential: &Credential, network: Network) -> Result<String, AddressError> {
    let header_type: u8 = if credential.is_script() { 0x0f } else { 0x0e };
    let mut bytes = Vec::with_capacity(1 + CREDENTIAL_HASH_SIZE);
    bytes.push((header_type << 4) | network.network_id());
    bytes.extend_from_slice(credential.hash());
    Ok(bech32::encode(network.stake_hrp(), bytes.to_base32(), Variant::Bech32)?)
}

/// Parse a reward address back into its credential and network id.
pub fn parse_reward_address(address: &str) -> Result<(u8, Credential), AddressError> {
    let (hrp, data, variant) = bech32::decode(address.trim())?;
    if variant != Variant::Bech32 {
        return Err(AddressError::WrongVariant);
    }
    if hrp != "stake" && hrp != "stake_test" {
        return Err(AddressError::UnknownHrp(hrp));
    }
    let bytes = Vec::<u8>::from_base32(&data)?;
    if bytes.is_empty() {
        return Err(AddressError::Empty);
    }
    expect_len(&bytes[1..], CREDENTIAL_HASH_SIZE)?;
    let mut hash = [0u8; CREDENTIAL_HASH_SIZE];
    hash.copy_from_slice(&bytes[1..]);
    let credential = match bytes[0] >> 4 {
        0x0e => Credential::Key(hash),
        0x0f => Credential::Script(hash),
        other => return Err(AddressError::UnsupportedHeader(other)),
    };
    Ok((bytes[0] & 0x0f, credential))
}

fn hash_from_hex(h: &str) -> Result<[u8; CREDENTIAL_HASH_SIZE], AddressError> {
    let bytes = hex::decode(h).map_err(|e| AddressError::BadCredential(e.to_string()))?;
    if bytes.len() != CREDENTIAL_HASH_SIZE {
        return Err(AddressError::BadCredential(format!(
            "expected {} bytes, got {}",
            CREDENTIAL_HASH_SIZE,
            bytes.len()
        )));
    }
    let mut out = [0u8; CREDENTIAL_HASH_SIZE];
    out.copy_from_slice(&bytes);
    Ok(out)
}

fn expect_len(payload: &[u8], expected: usize) -> Result<(), AddressError> {
    if payload.len() != expected {
        return Err(AddressError::InvalidLength {
            expected,
            actual: payload.len(),
        });
    }
    Ok(())
}

/// Pointer components are base-128 big-endian with a continuation bit.
fn write_natural(out: &mut Vec<u8>, mut value: u64) {
    let mut groups = vec![(value & 0x7f) as u8];
    value >>= 7;
    while value > 0 {
        groups.push(((value & 0x7f) as u8) | 0x80);
        value >>= 7;
    }
    groups.reverse();
    out.extend_from_slice(&groups);
}

fn read_natural(data: &mut &[u8]) -> Result<u64, AddressError> {
    let mut value: u64 = 0;
    loop {
        let (&byte, rest) = data
            .split_first()
            .ok_or_else(|| AddressError::BadPointer("unexpected end of pointer".into()))?;
        *data = rest;
        if value > (u64::MAX >> 7) {
            return Err(AddressError::BadPointer("pointer component overflows u64".into()));
        }
        value = (value << 7) | u64::from(byte & 0x7f);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
}
