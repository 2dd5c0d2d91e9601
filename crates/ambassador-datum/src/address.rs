//! Addresses as Plutus data.
//!
//! ```text
//! Address    = Constr 0 [payment: Credential, stake: Option<Referenced>]
//! Credential = Constr 0 [vkey_hash] | Constr 1 [script_hash]
//! Referenced = Constr 0 [Credential] | Constr 1 [slot, tx_index, cert_index]
//! Option     = Constr 0 [x] (Some) | Constr 1 [] (None)
//! ```
//!
//! The network id is not part of the data form, so conversion back to
//! bech32 takes the deployment's network.

use ambassador_types::address::{parse_address, ParsedAddress};
use ambassador_types::constants::{Network, CREDENTIAL_HASH_SIZE};
use ambassador_types::{Credential, StakeReference};

use crate::plutus::{Fields, PlutusData, PlutusDataExt};
use crate::{DatumError, PlutusCodec};

const ENTITY: &str = "Address";

/// A payment address without its network tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlutusAddress {
    pub payment: Credential,
    pub stake: Option<StakeReference>,
}

impl PlutusAddress {
    pub fn from_bech32(address: &str) -> Result<Self, DatumError> {
        let parsed = parse_address(address)?;
        Ok(Self {
            payment: parsed.payment,
            stake: parsed.stake,
        })
    }

    pub fn to_bech32(&self, network: Network) -> Result<String, DatumError> {
        Ok(ParsedAddress {
            network_id: network.network_id(),
            payment: self.payment,
            stake: self.stake,
        }
        .to_bech32()?)
    }

    /// Public-key hash of the payment part, if it is a key credential.
    pub fn payment_key_hash(&self) -> Option<String> {
        match self.payment {
            Credential::Key(h) => Some(hex::encode(h)),
            Credential::Script(_) => None,
        }
    }
}

fn credential_to_data(c: &Credential) -> PlutusData {
    match c {
        Credential::Key(h) => PlutusData::constr(0, vec![PlutusData::bytes(h.to_vec())]),
        Credential::Script(h) => PlutusData::constr(1, vec![PlutusData::bytes(h.to_vec())]),
    }
}

fn credential_from_data(data: &PlutusData) -> Result<Credential, DatumError> {
    let (tag, fields) = data.as_constr(ENTITY)?;
    let mut f = Fields::new(ENTITY, fields);
    let bytes = f.next_bytes()?;
    f.finish()?;
    if bytes.len() != CREDENTIAL_HASH_SIZE {
        return Err(DatumError::Shape {
            entity: ENTITY,
            expected: "28-byte credential hash",
            got: "bytes of another length",
        });
    }
    let mut h = [0u8; CREDENTIAL_HASH_SIZE];
    h.copy_from_slice(bytes);
    match tag {
        0 => Ok(Credential::Key(h)),
        1 => Ok(Credential::Script(h)),
        other => Err(DatumError::UnknownVariant { entity: ENTITY, index: other }),
    }
}

impl PlutusCodec for PlutusAddress {
    fn to_data(&self) -> PlutusData {
        let stake = match &self.stake {
            None => PlutusData::unit(1),
            Some(StakeReference::Credential(c)) => PlutusData::constr(
                0,
                vec![PlutusData::constr(0, vec![credential_to_data(c)])],
            ),
            Some(StakeReference::Pointer { slot, tx_index, cert_index }) => PlutusData::constr(
                0,
                vec![PlutusData::constr(
                    1,
                    vec![
                        PlutusData::int(*slot),
                        PlutusData::int(*tx_index),
                        PlutusData::int(*cert_index),
                    ],
                )],
            ),
        };
        PlutusData::constr(0, vec![credential_to_data(&self.payment), stake])
    }

    fn from_data(data: &PlutusData) -> Result<Self, DatumError> {
        let mut f = Fields::new(ENTITY, data.expect_constr(ENTITY, 0)?);
        let payment = credential_from_data(f.next()?)?;
        let stake_opt = f.next()?;
        f.finish()?;

        let stake = match stake_opt.as_constr(ENTITY)? {
            (1, []) => None,
            (0, [referenced]) => match referenced.as_constr(ENTITY)? {
                (0, [cred]) => Some(StakeReference::Credential(credential_from_data(cred)?)),
                (1, [slot, tx_index, cert_index]) => Some(StakeReference::Pointer {
                    slot: slot.as_u64(ENTITY)?,
                    tx_index: tx_index.as_u64(ENTITY)?,
                    cert_index: cert_index.as_u64(ENTITY)?,
                }),
                (tag, _) => return Err(DatumError::UnknownVariant { entity: ENTITY, index: tag }),
            },
            (tag, _) => return Err(DatumError::UnknownVariant { entity: ENTITY, index: tag }),
        };
        Ok(Self { payment, stake })
    }
}
