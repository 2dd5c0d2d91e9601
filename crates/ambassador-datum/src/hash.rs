//! Blake2b hashing for datums, keys, and token names.

use blake2::digest::consts::{U28, U32};
use blake2::{Blake2b, Digest};

use crate::plutus::{PlutusData, PlutusDataExt};

type Blake2b224 = Blake2b<U28>;
type Blake2b256 = Blake2b<U32>;

/// Compute a 224-bit Blake2b hash (credential hashes, policy ids).
pub fn blake2b_224(data: &[u8]) -> [u8; 28] {
    let mut hasher = Blake2b224::new();
    hasher.update(data);
    let mut output = [0u8; 28];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// Compute a 256-bit Blake2b hash (transaction bodies, datums).
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// Hash of a datum as the ledger computes it.
pub fn hash_datum(data: &PlutusData) -> Result<String, crate::DatumError> {
    Ok(hex::encode(blake2b_256(&data.to_cbor()?)))
}

/// Public-key hash of a 32-byte ed25519 verification key.
pub fn hash_key(vkey: &[u8]) -> String {
    hex::encode(blake2b_224(vkey))
}

/// Token name derived from a consumed output reference: blake2b-256 of
/// the CBOR of `OutputReference { transaction_id, output_index }`.
pub fn output_reference_token_name(tx_hash: &str, output_index: u32) -> Result<String, crate::DatumError> {
    let reference = PlutusData::constr(
        0,
        vec![
            PlutusData::bytes_from_hex(tx_hash)?,
            PlutusData::int(output_index),
        ],
    );
    Ok(hex::encode(blake2b_256(&reference.to_cbor()?)))
}
