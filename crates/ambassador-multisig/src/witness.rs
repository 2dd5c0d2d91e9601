//! Verification and merging of vkey witnesses.
//!
//! A signature counts only after it verifies against the blake2b-256 hash
//! of the transaction body. Merging never touches the body bytes, so the
//! transaction id is stable across signing rounds.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use log::{debug, warn};

use ambassador_datum::hash::blake2b_224;
use ambassador_tx::envelope::{TxEnvelope, VKeyWitness, WitnessSet};
use ambassador_types::{Hash28, KeyHash};

use crate::MultisigError;

/// Public-key hash of the witness's verification key.
pub fn key_hash(witness: &VKeyWitness) -> KeyHash {
    Hash28(blake2b_224(&witness.vkey))
}

pub fn verify(body_hash: &[u8; 32], witness: &VKeyWitness) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(&witness.vkey) else {
        return false;
    };
    key.verify(body_hash, &Signature::from_bytes(&witness.signature))
        .is_ok()
}

/// Distinct key hashes whose witnesses verify, in witness order.
/// Witnesses that fail verification are skipped.
pub fn signers(tx: &TxEnvelope) -> Vec<KeyHash> {
    let body_hash = tx.body_hash();
    let mut out: Vec<KeyHash> = Vec::new();
    for w in &tx.witness_set.vkeys {
        let hash = key_hash(w);
        if !verify(&body_hash, w) {
            warn!("ignoring witness by {} that does not verify", hash);
            continue;
        }
        if !out.contains(&hash) {
            out.push(hash);
        }
    }
    out
}

/// Signatures returned by a wallet: a whole transaction or a bare witness set.
#[derive(Debug, Clone)]
pub enum Signed {
    Transaction(TxEnvelope),
    Witnesses(WitnessSet),
}

impl Signed {
    pub fn from_hex(signed_hex: &str) -> Result<Self, MultisigError> {
        if let Ok(tx) = TxEnvelope::from_hex(signed_hex) {
            return Ok(Signed::Transaction(tx));
        }
        let bytes = hex::decode(signed_hex.trim())
            .map_err(|e| ambassador_tx::TxError::Invalid(e.to_string()))?;
        Ok(Signed::Witnesses(WitnessSet::from_bytes(&bytes)?))
    }

    fn vkeys(&self) -> &[VKeyWitness] {
        match self {
            Signed::Transaction(tx) => &tx.witness_set.vkeys,
            Signed::Witnesses(ws) => &ws.vkeys,
        }
    }
}

/// Merge the vkey witnesses of `incoming` into `base`.
///
/// Every incoming signature must verify against `base`'s body, and a
/// whole transaction must have the same id as `base`. Returns the key
/// hashes that were not already present.
pub fn merge(base: &mut TxEnvelope, incoming: &Signed) -> Result<Vec<KeyHash>, MultisigError> {
    if let Signed::Transaction(tx) = incoming {
        if tx.tx_hash() != base.tx_hash() {
            return Err(MultisigError::WrongTransaction {
                expected: base.tx_hash(),
                got: tx.tx_hash(),
            });
        }
    }
    let body_hash = base.body_hash();
    for w in incoming.vkeys() {
        if !verify(&body_hash, w) {
            return Err(MultisigError::BadSignature(key_hash(w)));
        }
    }
    let mut added = Vec::new();
    for w in incoming.vkeys() {
        if base.witness_set.add_vkey(*w) {
            added.push(key_hash(w));
        }
    }
    debug!("merged {} new witnesses into {}", added.len(), base.tx_hash());
    Ok(added)
}
