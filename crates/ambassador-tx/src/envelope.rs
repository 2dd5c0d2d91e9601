//! Serialized transaction envelope.
//!
//! A transaction is `[body, witness_set, is_valid, auxiliary_data]`. The
//! body bytes are kept exactly as received so the transaction hash never
//! changes when witnesses are added. Only the verification-key witnesses
//! (witness-set key 0) are decoded; every other witness-set entry is kept
//! as raw CBOR.

use std::fmt::Display;

use pallas_codec::minicbor::{data::Type, Decoder, Encoder};
use pallas_codec::utils::Bytes;
use pallas_primitives::alonzo;

use ambassador_datum::hash::blake2b_256;
use ambassador_types::{Hash28, KeyHash, TxInRef};

use crate::TxError;

const WITNESS_VKEYS: u64 = 0;
const BODY_INPUTS: u64 = 0;
const BODY_REQUIRED_SIGNERS: u64 = 14;

/// Header of CBOR tag 258, the Conway set marker.
const SET_TAG: [u8; 3] = [0xd9, 0x01, 0x02];

fn invalid(e: impl Display) -> TxError {
    TxError::Invalid(e.to_string())
}

/// One ed25519 signature with its verification key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VKeyWitness {
    pub vkey: [u8; 32],
    pub signature: [u8; 64],
}

impl TryFrom<alonzo::VKeyWitness> for VKeyWitness {
    type Error = TxError;

    fn try_from(w: alonzo::VKeyWitness) -> Result<Self, TxError> {
        Ok(Self {
            vkey: fixed::<32>(&w.vkey)?,
            signature: fixed::<64>(&w.signature)?,
        })
    }
}

impl From<&VKeyWitness> for alonzo::VKeyWitness {
    fn from(w: &VKeyWitness) -> Self {
        alonzo::VKeyWitness {
            vkey: Bytes::from(w.vkey.to_vec()),
            signature: Bytes::from(w.signature.to_vec()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WitnessSet {
    pub vkeys: Vec<VKeyWitness>,
    /// Whether the vkey list was written as a tagged set.
    set_tagged: bool,
    /// Other witness-set entries, key and raw value.
    other: Vec<(u64, Vec<u8>)>,
}

impl WitnessSet {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TxError> {
        let mut d = Decoder::new(bytes);
        let ws = Self::decode(&mut d)?;
        if d.position() != bytes.len() {
            return Err(TxError::Invalid("trailing bytes after witness set".into()));
        }
        Ok(ws)
    }

    fn decode(d: &mut Decoder<'_>) -> Result<Self, TxError> {
        let mut ws = WitnessSet::default();
        let len = d.map().map_err(invalid)?;
        let mut read = 0u64;
        loop {
            match len {
                Some(n) if read == n => break,
                None if d.datatype().map_err(invalid)? == Type::Break => {
                    d.set_position(d.position() + 1);
                    break;
                }
                _ => read += 1,
            }
            let key = d.u64().map_err(invalid)?;
            if key == WITNESS_VKEYS {
                ws.set_tagged = skip_set_tag(d)?;
                let witnesses: Vec<alonzo::VKeyWitness> = d.decode().map_err(invalid)?;
                ws.vkeys = witnesses
                    .into_iter()
                    .map(VKeyWitness::try_from)
                    .collect::<Result<_, _>>()?;
            } else {
                ws.other.push((key, raw_item(d)?.to_vec()));
            }
        }
        Ok(ws)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TxError> {
        let mut entries: Vec<(u64, Vec<u8>)> = self.other.clone();
        if !self.vkeys.is_empty() {
            let mut v = Vec::new();
            if self.set_tagged {
                v.extend_from_slice(&SET_TAG);
            }
            let witnesses: Vec<alonzo::VKeyWitness> = self.vkeys.iter().map(Into::into).collect();
            Encoder::new(&mut v).encode(&witnesses).map_err(invalid)?;
            entries.push((WITNESS_VKEYS, v));
        }
        entries.sort_by_key(|(k, _)| *k);

        let mut out = Vec::new();
        let mut e = Encoder::new(&mut out);
        e.map(entries.len() as u64).map_err(invalid)?;
        for (k, v) in entries {
            e.u64(k).map_err(invalid)?;
            e.writer_mut().extend_from_slice(&v);
        }
        Ok(out)
    }

    /// Add `w` unless a witness for the same key is present. Returns whether
    /// it was added.
    pub fn add_vkey(&mut self, w: VKeyWitness) -> bool {
        if self.vkeys.iter().any(|x| x.vkey == w.vkey) {
            return false;
        }
        self.vkeys.push(w);
        true
    }
}

/// A parsed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxEnvelope {
    body: Vec<u8>,
    pub witness_set: WitnessSet,
    /// Raw `is_valid` and auxiliary data items.
    tail: Vec<Vec<u8>>,
}

impl TxEnvelope {
    /// Unsigned transaction from raw body bytes.
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body,
            witness_set: WitnessSet::default(),
            tail: vec![vec![0xf5], vec![0xf6]],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TxError> {
        let mut d = Decoder::new(bytes);
        let n = match d.array().map_err(invalid)? {
            Some(n) if (2..=4).contains(&n) => n,
            _ => return Err(TxError::Invalid("transaction must be an array of 2 to 4 items".into())),
        };
        let body = raw_item(&mut d)?.to_vec();
        let witness_set = WitnessSet::decode(&mut d)?;
        let mut tail = Vec::new();
        for _ in 2..n {
            tail.push(raw_item(&mut d)?.to_vec());
        }
        if d.position() != bytes.len() {
            return Err(TxError::Invalid("trailing bytes after transaction".into()));
        }
        Ok(Self {
            body,
            witness_set,
            tail,
        })
    }

    pub fn from_hex(tx_hex: &str) -> Result<Self, TxError> {
        let bytes = hex::decode(tx_hex.trim()).map_err(invalid)?;
        Self::from_bytes(&bytes)
    }

    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    /// blake2b-256 of the body: the transaction id and the signed message.
    pub fn body_hash(&self) -> [u8; 32] {
        blake2b_256(&self.body)
    }

    pub fn tx_hash(&self) -> String {
        hex::encode(self.body_hash())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TxError> {
        let witness_set = self.witness_set.to_bytes()?;
        let mut out = Vec::new();
        let mut e = Encoder::new(&mut out);
        e.array(2 + self.tail.len() as u64).map_err(invalid)?;
        let w = e.writer_mut();
        w.extend_from_slice(&self.body);
        w.extend_from_slice(&witness_set);
        for item in &self.tail {
            w.extend_from_slice(item);
        }
        Ok(out)
    }

    pub fn to_hex(&self) -> Result<String, TxError> {
        Ok(hex::encode(self.to_bytes()?))
    }

    /// Spent inputs listed in the body.
    pub fn inputs(&self) -> Result<Vec<TxInRef>, TxError> {
        let Some(raw) = body_field(&self.body, BODY_INPUTS)? else {
            return Ok(Vec::new());
        };
        let mut d = Decoder::new(raw);
        skip_set_tag(&mut d)?;
        let inputs: Vec<(Bytes, u64)> = d.decode().map_err(invalid)?;
        inputs
            .into_iter()
            .map(|(tx_hash, index)| {
                let index = u32::try_from(index).map_err(|_| invalid("input index overflow"))?;
                Ok(TxInRef::new(hex::encode(tx_hash.as_slice()), index))
            })
            .collect()
    }

    /// Key hashes the body requires signatures from.
    pub fn required_signers(&self) -> Result<Vec<KeyHash>, TxError> {
        let Some(raw) = body_field(&self.body, BODY_REQUIRED_SIGNERS)? else {
            return Ok(Vec::new());
        };
        let mut d = Decoder::new(raw);
        skip_set_tag(&mut d)?;
        let signers: Vec<Bytes> = d.decode().map_err(invalid)?;
        signers
            .iter()
            .map(|s| Hash28::from_slice(s.as_slice()).map_err(invalid))
            .collect()
    }
}

/// Raw bytes of the next item.
fn raw_item<'b>(d: &mut Decoder<'b>) -> Result<&'b [u8], TxError> {
    let input = d.input();
    let start = d.position();
    d.skip().map_err(invalid)?;
    Ok(&input[start..d.position()])
}

/// Raw value of `key` in the body map.
fn body_field(body: &[u8], key: u64) -> Result<Option<&[u8]>, TxError> {
    let mut d = Decoder::new(body);
    let Some(n) = d.map().map_err(invalid)? else {
        return Err(TxError::Invalid("transaction body must be a definite map".into()));
    };
    for _ in 0..n {
        let k = d.u64().map_err(invalid)?;
        let value = raw_item(&mut d)?;
        if k == key {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

/// Step over a set tag if one is present, returning whether it was.
fn skip_set_tag(d: &mut Decoder<'_>) -> Result<bool, TxError> {
    if d.datatype().map_err(invalid)? != Type::Tag {
        return Ok(false);
    }
    let pos = d.position();
    if !d.input()[pos..].starts_with(&SET_TAG) {
        return Err(TxError::Invalid("unexpected tag where a set was expected".into()));
    }
    d.set_position(pos + SET_TAG.len());
    Ok(true)
}

fn fixed<const N: usize>(bytes: &[u8]) -> Result<[u8; N], TxError> {
    bytes
        .try_into()
        .map_err(|_| TxError::Invalid(format!("expected {} bytes, got {}", N, bytes.len())))
}
