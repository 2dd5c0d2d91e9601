//! Pending decisions and their state.
//!
//! A decision moves through
//! `NoDecision -> Decided -> QuorumMet -> Submitted`. Only `NoDecision`
//! and `Submitted` are stored transitions; `Decided` and `QuorumMet` are
//! computed from the verified witnesses of the stored transaction.

use serde::{Deserialize, Serialize};

use ambassador_tx::envelope::TxEnvelope;
use ambassador_tx::TxError;
use ambassador_types::{KeyHash, TxInRef};

use crate::witness::signers;
use crate::MultisigError;

/// Store key of the decision about the entity at `utxo`.
pub fn decision_key(utxo: &TxInRef) -> String {
    utxo.to_string()
}

/// What is persisted between signing sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRecord {
    /// The admin decision this transaction enacts, e.g. `"approve"`.
    pub decision: String,
    /// Transaction with every witness collected so far.
    pub tx_hex: String,
    pub tx_hash: String,
    /// Admins fixed as required signers when the transaction was built.
    pub selected: Vec<KeyHash>,
    pub threshold: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionState {
    NoDecision,
    Decided {
        decision: String,
        signed: Vec<KeyHash>,
        pending: Vec<KeyHash>,
    },
    QuorumMet {
        decision: String,
        signed: Vec<KeyHash>,
    },
    Submitted {
        decision: String,
        tx_hash: String,
    },
}

impl DecisionState {
    pub fn is_submittable(&self) -> bool {
        matches!(self, DecisionState::QuorumMet { .. })
    }
}

impl DecisionRecord {
    /// Record for a freshly built transaction.
    ///
    /// The selection must be distinct, reach `threshold`, and equal the
    /// transaction's required signers when the body lists any.
    pub fn new(
        decision: impl Into<String>,
        tx: &TxEnvelope,
        selected: Vec<KeyHash>,
        threshold: u64,
    ) -> Result<Self, MultisigError> {
        let mut sorted = selected.clone();
        sorted.sort();
        sorted.dedup();
        if sorted.len() != selected.len() {
            return Err(TxError::Invalid("selected admins must be distinct".into()).into());
        }
        if threshold == 0 || (selected.len() as u64) < threshold {
            return Err(TxError::Invalid(format!(
                "{} admins selected, threshold is {}",
                selected.len(),
                threshold
            ))
            .into());
        }
        let mut required = tx.required_signers()?;
        if !required.is_empty() {
            required.sort();
            required.dedup();
            if required != sorted {
                return Err(TxError::Invalid(
                    "selected admins differ from the transaction's required signers".into(),
                )
                .into());
            }
        }
        Ok(Self {
            decision: decision.into(),
            tx_hex: tx.to_hex()?,
            tx_hash: tx.tx_hash(),
            selected,
            threshold,
            submitted: None,
        })
    }

    pub fn envelope(&self) -> Result<TxEnvelope, MultisigError> {
        Ok(TxEnvelope::from_hex(&self.tx_hex)?)
    }

    /// Distinct selected signatures needed before submission.
    ///
    /// The selection is the body's required-signer set and the ledger
    /// rejects the transaction while any of it is missing, so a selection
    /// larger than the threshold needs every selected signature.
    pub fn required(&self) -> usize {
        (self.threshold as usize).max(self.selected.len())
    }

    /// Selected admins whose witnesses verify.
    pub fn signed(&self) -> Result<Vec<KeyHash>, MultisigError> {
        Ok(signers(&self.envelope()?)
            .into_iter()
            .filter(|k| self.selected.contains(k))
            .collect())
    }

    pub fn state(&self) -> Result<DecisionState, MultisigError> {
        if let Some(tx_hash) = &self.submitted {
            return Ok(DecisionState::Submitted {
                decision: self.decision.clone(),
                tx_hash: tx_hash.clone(),
            });
        }
        let signed = self.signed()?;
        if signed.len() >= self.required() {
            return Ok(DecisionState::QuorumMet {
                decision: self.decision.clone(),
                signed,
            });
        }
        let pending = self
            .selected
            .iter()
            .filter(|k| !signed.contains(k))
            .copied()
            .collect();
        Ok(DecisionState::Decided {
            decision: self.decision.clone(),
            signed,
            pending,
        })
    }

    pub fn to_json(&self) -> Result<String, MultisigError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, MultisigError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ambassador_tx::envelope::VKeyWitness;
    use ambassador_types::Hash28;
    use ed25519_dalek::{Signer, SigningKey};

    fn key(seed: u8) -> SigningKey {
        SigningKey::from_bytes(&[seed; 32])
    }

    fn hash_of(seed: u8) -> KeyHash {
        Hash28(ambassador_datum::hash::blake2b_224(key(seed).verifying_key().as_bytes()))
    }

    fn sign(record: &mut DecisionRecord, seed: u8) {
        let mut tx = record.envelope().unwrap();
        let k = key(seed);
        tx.witness_set.add_vkey(VKeyWitness {
            vkey: k.verifying_key().to_bytes(),
            signature: k.sign(&tx.body_hash()).to_bytes(),
        });
        record.tx_hex = tx.to_hex().unwrap();
    }

    fn unsigned() -> TxEnvelope {
        TxEnvelope::new(vec![0xa2, 0x00, 0x80, 0x02, 0x00])
    }

    #[test]
    fn test_quorum_counts_distinct_selected_signers() {
        let mut record = DecisionRecord::new("approve", &unsigned(), vec![hash_of(1), hash_of(2)], 2).unwrap();
        assert!(matches!(record.state().unwrap(), DecisionState::Decided { ref pending, .. } if pending.len() == 2));

        sign(&mut record, 1);
        sign(&mut record, 1);
        // An outsider's valid signature does not count.
        sign(&mut record, 9);
        let state = record.state().unwrap();
        assert!(!state.is_submittable());
        assert!(matches!(state, DecisionState::Decided { ref signed, .. } if signed == &vec![hash_of(1)]));

        sign(&mut record, 2);
        assert!(record.state().unwrap().is_submittable());

        record.submitted = Some(record.tx_hash.clone());
        assert!(matches!(record.state().unwrap(), DecisionState::Submitted { .. }));
    }

    #[test]
    fn test_selection_above_threshold_needs_every_signer() {
        let selected = vec![hash_of(1), hash_of(2), hash_of(3)];
        let mut record = DecisionRecord::new("approve", &unsigned(), selected, 2).unwrap();
        assert_eq!(record.required(), 3);
        sign(&mut record, 3);
        sign(&mut record, 1);
        // Threshold reached, but hash_of(2) is still a required signer.
        let state = record.state().unwrap();
        assert!(!state.is_submittable());
        assert!(matches!(state, DecisionState::Decided { ref pending, .. } if pending == &vec![hash_of(2)]));

        sign(&mut record, 2);
        assert!(matches!(record.state().unwrap(), DecisionState::QuorumMet { ref signed, .. } if signed.len() == 3));
    }

    #[test]
    fn test_required_signers_in_body_must_match_selection() {
        // {0: [], 2: 0, 14: [h'..']} listing only hash_of(1)
        let mut body = vec![0xa3, 0x00, 0x80, 0x02, 0x00, 0x0e, 0x81, 0x58, 0x1c];
        body.extend_from_slice(hash_of(1).as_bytes());
        let tx = TxEnvelope::new(body);
        assert!(DecisionRecord::new("x", &tx, vec![hash_of(1), hash_of(2)], 1).is_err());
        let record = DecisionRecord::new("x", &tx, vec![hash_of(1)], 1).unwrap();
        assert_eq!(record.required(), 1);
    }

    #[test]
    fn test_new_rejects_bad_selection() {
        let tx = unsigned();
        assert!(DecisionRecord::new("x", &tx, vec![hash_of(1)], 2).is_err());
        assert!(DecisionRecord::new("x", &tx, vec![hash_of(1), hash_of(1)], 1).is_err());
        assert!(DecisionRecord::new("x", &tx, vec![], 0).is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let record = DecisionRecord::new("reject", &unsigned(), vec![hash_of(1)], 1).unwrap();
        let json = record.to_json().unwrap();
        assert!(json.contains("\"txHash\""));
        assert_eq!(DecisionRecord::from_json(&json).unwrap(), record);
    }
}
