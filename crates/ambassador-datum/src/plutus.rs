//! The Plutus data tree.
//!
//! The tree itself is `pallas_primitives::alonzo::PlutusData`, which owns
//! the CBOR wire format (constructor tags, bignums, chunked byte strings).
//! [`PlutusDataExt`] adds the constructors and accessors the datum
//! schemas are written against, the detailed JSON schema used by
//! off-chain tooling, and [`Fields`], the positional reader used by every
//! datum decoder.

use pallas_codec::minicbor::{self, Decoder};
use pallas_codec::utils::{Int, KeyValuePairs, MaybeIndefArray};
use pallas_primitives::alonzo::{BigInt, BoundedBytes, Constr};
use serde_json::{json, Map as JsonMap, Value as Json};

use ambassador_types::{AssetName, Hash28};

use crate::DatumError;

pub use pallas_primitives::alonzo::PlutusData;

/// Schema-level helpers over [`PlutusData`].
pub trait PlutusDataExt: Sized {
    /// Constructor by index, mapped to the compact CBOR tag range where
    /// one exists.
    fn constr(index: u64, fields: Vec<PlutusData>) -> Self;

    /// Constructor with no fields, the usual shape of unit redeemers.
    fn unit(index: u64) -> Self {
        Self::constr(index, Vec::new())
    }

    fn int(v: impl Into<i128>) -> Self;

    fn bytes(b: impl Into<Vec<u8>>) -> Self;

    fn hash28(h: &Hash28) -> Self {
        Self::bytes(h.as_bytes().to_vec())
    }

    fn asset_name(name: &AssetName) -> Self {
        Self::bytes(name.as_bytes().to_vec())
    }

    /// Byte string from hex. Callers pass hashes and policy ids that were
    /// already validated, so bad hex is reported rather than swallowed.
    fn bytes_from_hex(h: &str) -> Result<Self, DatumError> {
        Ok(Self::bytes(hex::decode(h)?))
    }

    fn list(items: Vec<PlutusData>) -> Self;

    fn map(entries: Vec<(PlutusData, PlutusData)>) -> Self;

    /// Short name of the variant, used in error messages.
    fn kind(&self) -> &'static str;

    fn to_cbor(&self) -> Result<Vec<u8>, DatumError>;

    fn to_cbor_hex(&self) -> Result<String, DatumError> {
        Ok(hex::encode(self.to_cbor()?))
    }

    /// Decodes exactly one data item; trailing bytes are an error.
    fn from_cbor(bytes: &[u8]) -> Result<Self, DatumError>;

    fn from_cbor_hex(h: &str) -> Result<Self, DatumError> {
        let bytes = hex::decode(h.trim())?;
        Self::from_cbor(&bytes)
    }

    /// Detailed-schema JSON (`{"constructor":0,"fields":[..]}` and friends).
    fn to_json(&self) -> Result<Json, DatumError>;

    fn from_json(value: &Json) -> Result<Self, DatumError>;

    /// Fields of a constructor with the expected index.
    fn expect_constr(&self, entity: &'static str, expected: u64)
        -> Result<&[PlutusData], DatumError>;

    /// Index and fields of any constructor.
    fn as_constr(&self, entity: &'static str) -> Result<(u64, &[PlutusData]), DatumError>;

    fn as_bytes(&self, entity: &'static str) -> Result<&[u8], DatumError>;

    fn as_int(&self, entity: &'static str) -> Result<i128, DatumError>;

    fn as_u64(&self, entity: &'static str) -> Result<u64, DatumError> {
        u64::try_from(self.as_int(entity)?).map_err(|_| DatumError::IntRange { entity })
    }

    fn as_list(&self, entity: &'static str) -> Result<&[PlutusData], DatumError>;

    fn as_map(&self, entity: &'static str) -> Result<&[(PlutusData, PlutusData)], DatumError>;
}

// Non-empty lists are written indefinite-length, empty ones definite,
// matching what the Plutus serialiser produces.
fn array(items: Vec<PlutusData>) -> MaybeIndefArray<PlutusData> {
    if items.is_empty() {
        MaybeIndefArray::Def(items)
    } else {
        MaybeIndefArray::Indef(items)
    }
}

fn items(array: &MaybeIndefArray<PlutusData>) -> &[PlutusData] {
    match array {
        MaybeIndefArray::Def(v) | MaybeIndefArray::Indef(v) => v,
    }
}

fn constr_index(c: &Constr<PlutusData>) -> Result<u64, DatumError> {
    match c.tag {
        121..=127 => Ok(c.tag - 121),
        1280..=1400 => Ok(c.tag - 1280 + 7),
        102 => c
            .any_constructor
            .ok_or_else(|| DatumError::Cbor("general constructor without an index".into())),
        other => Err(DatumError::Cbor(format!("unsupported constructor tag {}", other))),
    }
}

fn magnitude(entity: &'static str, bytes: &[u8]) -> Result<i128, DatumError> {
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    let digits = &bytes[first..];
    if digits.len() > 16 {
        return Err(DatumError::IntRange { entity });
    }
    let mut buf = [0u8; 16];
    buf[16 - digits.len()..].copy_from_slice(digits);
    i128::try_from(u128::from_be_bytes(buf)).map_err(|_| DatumError::IntRange { entity })
}

fn big_bytes(v: u128) -> BoundedBytes {
    let raw = v.to_be_bytes();
    let first = raw.iter().position(|b| *b != 0).unwrap_or(raw.len() - 1);
    BoundedBytes::from(raw[first..].to_vec())
}

impl PlutusDataExt for PlutusData {
    fn constr(index: u64, fields: Vec<PlutusData>) -> Self {
        let fields = array(fields);
        let (tag, any_constructor) = match index {
            0..=6 => (121 + index, None),
            7..=127 => (1280 + index - 7, None),
            _ => (102, Some(index)),
        };
        PlutusData::Constr(Constr {
            tag,
            any_constructor,
            fields,
        })
    }

    fn int(v: impl Into<i128>) -> Self {
        let v: i128 = v.into();
        let big = match i64::try_from(v) {
            Ok(small) => BigInt::Int(Int::from(small)),
            Err(_) if v > 0 => BigInt::BigUInt(big_bytes(v.unsigned_abs())),
            Err(_) => BigInt::BigNInt(big_bytes((-1 - v).unsigned_abs())),
        };
        PlutusData::BigInt(big)
    }

    fn bytes(b: impl Into<Vec<u8>>) -> Self {
        PlutusData::BoundedBytes(BoundedBytes::from(b.into()))
    }

    fn list(items: Vec<PlutusData>) -> Self {
        PlutusData::Array(array(items))
    }

    fn map(entries: Vec<(PlutusData, PlutusData)>) -> Self {
        PlutusData::Map(KeyValuePairs::Def(entries))
    }

    fn kind(&self) -> &'static str {
        match self {
            PlutusData::Constr(_) => "constructor",
            PlutusData::Map(_) => "map",
            PlutusData::Array(_) => "list",
            PlutusData::BigInt(_) => "integer",
            PlutusData::BoundedBytes(_) => "bytes",
        }
    }

    fn to_cbor(&self) -> Result<Vec<u8>, DatumError> {
        minicbor::to_vec(self).map_err(|e| DatumError::Cbor(e.to_string()))
    }

    fn from_cbor(bytes: &[u8]) -> Result<Self, DatumError> {
        let mut d = Decoder::new(bytes);
        let data: PlutusData = d.decode().map_err(|e| DatumError::Cbor(e.to_string()))?;
        if d.position() != bytes.len() {
            return Err(DatumError::Cbor(format!(
                "{} trailing bytes after data item",
                bytes.len() - d.position()
            )));
        }
        Ok(data)
    }

    fn to_json(&self) -> Result<Json, DatumError> {
        Ok(match self {
            PlutusData::Constr(c) => {
                let fields = items(&c.fields)
                    .iter()
                    .map(PlutusData::to_json)
                    .collect::<Result<Vec<_>, _>>()?;
                json!({ "constructor": constr_index(c)?, "fields": fields })
            }
            PlutusData::Map(entries) => {
                let mut out = Vec::with_capacity(entries.len());
                for (k, v) in entries.iter() {
                    out.push(json!({ "k": k.to_json()?, "v": v.to_json()? }));
                }
                json!({ "map": out })
            }
            PlutusData::Array(list) => {
                let list = items(list)
                    .iter()
                    .map(PlutusData::to_json)
                    .collect::<Result<Vec<_>, _>>()?;
                json!({ "list": list })
            }
            PlutusData::BigInt(_) => {
                let i = self.as_int("json")?;
                let n = if let Ok(v) = i64::try_from(i) {
                    Json::from(v)
                } else if let Ok(v) = u64::try_from(i) {
                    Json::from(v)
                } else {
                    return Err(DatumError::Json(format!(
                        "integer {} does not fit a JSON number",
                        i
                    )));
                };
                json!({ "int": n })
            }
            PlutusData::BoundedBytes(b) => json!({ "bytes": hex::encode(b.as_slice()) }),
        })
    }

    fn from_json(value: &Json) -> Result<Self, DatumError> {
        let obj: &JsonMap<String, Json> = value
            .as_object()
            .ok_or_else(|| DatumError::Json("expected a JSON object".into()))?;

        if let Some(index) = obj.get("constructor") {
            let index = index
                .as_u64()
                .ok_or_else(|| DatumError::Json("constructor must be a non-negative integer".into()))?;
            let fields = obj
                .get("fields")
                .and_then(Json::as_array)
                .ok_or_else(|| DatumError::Json("constructor without fields array".into()))?;
            let fields = fields
                .iter()
                .map(PlutusData::from_json)
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(PlutusData::constr(index, fields));
        }
        if let Some(n) = obj.get("int") {
            let i = if let Some(v) = n.as_i64() {
                i128::from(v)
            } else if let Some(v) = n.as_u64() {
                i128::from(v)
            } else {
                return Err(DatumError::Json("int must be an integer".into()));
            };
            return Ok(PlutusData::int(i));
        }
        if let Some(b) = obj.get("bytes") {
            let s = b
                .as_str()
                .ok_or_else(|| DatumError::Json("bytes must be a hex string".into()))?;
            return Ok(PlutusData::bytes(hex::decode(s)?));
        }
        if let Some(list) = obj.get("list") {
            let list = list
                .as_array()
                .ok_or_else(|| DatumError::Json("list must be an array".into()))?;
            let list = list
                .iter()
                .map(PlutusData::from_json)
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(PlutusData::list(list));
        }
        if let Some(entries) = obj.get("map") {
            let entries = entries
                .as_array()
                .ok_or_else(|| DatumError::Json("map must be an array".into()))?;
            let mut out = Vec::with_capacity(entries.len());
            for entry in entries {
                let k = entry
                    .get("k")
                    .ok_or_else(|| DatumError::Json("map entry without k".into()))?;
                let v = entry
                    .get("v")
                    .ok_or_else(|| DatumError::Json("map entry without v".into()))?;
                out.push((PlutusData::from_json(k)?, PlutusData::from_json(v)?));
            }
            return Ok(PlutusData::map(out));
        }
        Err(DatumError::Json("unrecognised Plutus data object".into()))
    }

    fn expect_constr(
        &self,
        entity: &'static str,
        expected: u64,
    ) -> Result<&[PlutusData], DatumError> {
        let (index, fields) = self.as_constr(entity)?;
        if index != expected {
            return Err(DatumError::Constructor {
                entity,
                expected,
                got: index,
            });
        }
        Ok(fields)
    }

    fn as_constr(&self, entity: &'static str) -> Result<(u64, &[PlutusData]), DatumError> {
        match self {
            PlutusData::Constr(c) => Ok((constr_index(c)?, items(&c.fields))),
            other => Err(shape(entity, "constructor", other)),
        }
    }

    fn as_bytes(&self, entity: &'static str) -> Result<&[u8], DatumError> {
        match self {
            PlutusData::BoundedBytes(b) => Ok(b.as_slice()),
            other => Err(shape(entity, "bytes", other)),
        }
    }

    fn as_int(&self, entity: &'static str) -> Result<i128, DatumError> {
        match self {
            PlutusData::BigInt(BigInt::Int(i)) => Ok(i128::from(*i)),
            PlutusData::BigInt(BigInt::BigUInt(b)) => magnitude(entity, b.as_slice()),
            PlutusData::BigInt(BigInt::BigNInt(b)) => Ok(-1 - magnitude(entity, b.as_slice())?),
            other => Err(shape(entity, "integer", other)),
        }
    }

    fn as_list(&self, entity: &'static str) -> Result<&[PlutusData], DatumError> {
        match self {
            PlutusData::Array(list) => Ok(items(list)),
            other => Err(shape(entity, "list", other)),
        }
    }

    fn as_map(&self, entity: &'static str) -> Result<&[(PlutusData, PlutusData)], DatumError> {
        match self {
            PlutusData::Map(entries) => Ok(entries.as_slice()),
            other => Err(shape(entity, "map", other)),
        }
    }
}

pub(crate) fn shape(entity: &'static str, expected: &'static str, got: &PlutusData) -> DatumError {
    DatumError::Shape {
        entity,
        expected,
        got: got.kind(),
    }
}

/// Positional reader over constructor fields.
///
/// `next` fails with `MissingField` when the datum is shorter than the
/// schema, and `finish` fails when it is longer, so a datum written by a
/// different schema version never decodes into the wrong fields.
pub struct Fields<'a> {
    entity: &'static str,
    items: &'a [PlutusData],
    pos: usize,
}

impl<'a> Fields<'a> {
    pub fn new(entity: &'static str, items: &'a [PlutusData]) -> Self {
        Self { entity, items, pos: 0 }
    }

    pub fn entity(&self) -> &'static str {
        self.entity
    }

    pub fn next(&mut self) -> Result<&'a PlutusData, DatumError> {
        let item = self.items.get(self.pos).ok_or(DatumError::MissingField {
            entity: self.entity,
            index: self.pos,
        })?;
        self.pos += 1;
        Ok(item)
    }

    /// Next field if present; `None` once the list is exhausted.
    pub fn next_optional(&mut self) -> Option<&'a PlutusData> {
        let item = self.items.get(self.pos)?;
        self.pos += 1;
        Some(item)
    }

    pub fn next_bytes(&mut self) -> Result<&'a [u8], DatumError> {
        let entity = self.entity;
        self.next()?.as_bytes(entity)
    }

    pub fn next_hex(&mut self) -> Result<String, DatumError> {
        Ok(hex::encode(self.next_bytes()?))
    }

    pub fn next_hash28(&mut self) -> Result<Hash28, DatumError> {
        Ok(Hash28::from_slice(self.next_bytes()?)?)
    }

    pub fn next_asset_name(&mut self) -> Result<AssetName, DatumError> {
        Ok(AssetName::new(self.next_bytes()?.to_vec())?)
    }

    pub fn next_u64(&mut self) -> Result<u64, DatumError> {
        let entity = self.entity;
        self.next()?.as_u64(entity)
    }

    pub fn finish(self) -> Result<(), DatumError> {
        if self.pos != self.items.len() {
            return Err(DatumError::FieldCount {
                entity: self.entity,
                expected: self.pos,
                got: self.items.len(),
            });
        }
        Ok(())
    }
}
