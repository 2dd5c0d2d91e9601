//! Transaction plans.
//!
//! A `TxPlan` is everything a builder decides: which UTxOs are spent and
//! with which redeemers, what is minted or burned, which outputs are
//! created with which inline datums, withdrawals, certificates, and
//! required signers. Fees, change balancing, and execution units are left
//! to the [`TxCompleter`](crate::TxCompleter).

use std::collections::HashSet;

use ambassador_datum::{DatumError, PlutusData, PlutusDataExt};
use ambassador_types::{AssetName, Credential, KeyHash, PolicyId, ScriptHash, TxInRef, UTxO, Value};

use crate::TxError;

/// How a script witness is supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    /// Script published in an earlier output, referenced by input.
    Reference {
        tx_in: TxInRef,
        script_hash: ScriptHash,
        size: Option<u64>,
    },
    /// Script bytecode embedded in the witness set.
    Provided { script_hash: ScriptHash, cbor: String },
}

impl ScriptSource {
    pub fn script_hash(&self) -> &ScriptHash {
        match self {
            ScriptSource::Reference { script_hash, .. } | ScriptSource::Provided { script_hash, .. } => {
                script_hash
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputWitness {
    PubKey,
    /// Spent by a validator; the datum is read inline from the UTxO.
    Script { script: ScriptSource, redeemer: PlutusData },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedInput {
    pub utxo: UTxO,
    pub witness: InputWitness,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMint {
    pub policy_id: PolicyId,
    pub asset_name: AssetName,
    /// Positive to mint, negative to burn.
    pub quantity: i64,
    pub script: ScriptSource,
    pub redeemer: PlutusData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputDatum {
    Inline(PlutusData),
    /// Inline datum copied verbatim from a spent UTxO (hex CBOR).
    InlineCbor(String),
}

impl OutputDatum {
    pub fn to_cbor_hex(&self) -> Result<String, DatumError> {
        match self {
            OutputDatum::Inline(d) => d.to_cbor_hex(),
            OutputDatum::InlineCbor(h) => Ok(h.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedOutput {
    pub address: String,
    /// Lovelace may be zero; the completer then raises it to the minimum
    /// UTxO value.
    pub value: Value,
    pub datum: Option<OutputDatum>,
    /// Script bytecode (hex) attached as a reference script.
    pub reference_script: Option<String>,
}

impl PlannedOutput {
    pub fn new(address: impl Into<String>, value: Value) -> Self {
        Self {
            address: address.into(),
            value,
            datum: None,
            reference_script: None,
        }
    }

    pub fn with_datum(mut self, datum: OutputDatum) -> Self {
        self.datum = Some(datum);
        self
    }

    pub fn with_reference_script(mut self, cbor: impl Into<String>) -> Self {
        self.reference_script = Some(cbor.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedWithdrawal {
    pub reward_address: String,
    pub amount: u64,
    pub script: ScriptSource,
    pub redeemer: PlutusData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Certificate {
    StakeRegistration(Credential),
}

/// A draft transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxPlan {
    pub inputs: Vec<PlannedInput>,
    pub reference_inputs: Vec<UTxO>,
    pub mints: Vec<PlannedMint>,
    pub outputs: Vec<PlannedOutput>,
    pub withdrawals: Vec<PlannedWithdrawal>,
    pub certificates: Vec<Certificate>,
    pub required_signers: Vec<KeyHash>,
    pub collateral: Option<UTxO>,
    pub change_address: String,
    /// Wallet UTxOs the completer may add to cover fees and deposits.
    pub wallet_utxos: Vec<UTxO>,
}

impl TxPlan {
    pub fn new(change_address: impl Into<String>, wallet_utxos: Vec<UTxO>) -> Self {
        Self {
            change_address: change_address.into(),
            wallet_utxos,
            ..Self::default()
        }
    }

    pub fn spend_pubkey(&mut self, utxo: UTxO) -> &mut Self {
        self.inputs.push(PlannedInput {
            utxo,
            witness: InputWitness::PubKey,
        });
        self
    }

    pub fn spend_script(&mut self, utxo: UTxO, script: ScriptSource, redeemer: PlutusData) -> &mut Self {
        self.inputs.push(PlannedInput {
            utxo,
            witness: InputWitness::Script { script, redeemer },
        });
        self
    }

    pub fn read_only(&mut self, utxo: UTxO) -> &mut Self {
        self.reference_inputs.push(utxo);
        self
    }

    pub fn mint(
        &mut self,
        policy_id: PolicyId,
        asset_name: AssetName,
        quantity: i64,
        script: ScriptSource,
        redeemer: PlutusData,
    ) -> &mut Self {
        self.mints.push(PlannedMint {
            policy_id,
            asset_name,
            quantity,
            script,
            redeemer,
        });
        self
    }

    /// Append an output and return its index.
    pub fn pay(&mut self, output: PlannedOutput) -> u32 {
        self.outputs.push(output);
        (self.outputs.len() - 1) as u32
    }

    pub fn withdraw(
        &mut self,
        reward_address: impl Into<String>,
        amount: u64,
        script: ScriptSource,
        redeemer: PlutusData,
    ) -> &mut Self {
        self.withdrawals.push(PlannedWithdrawal {
            reward_address: reward_address.into(),
            amount,
            script,
            redeemer,
        });
        self
    }

    pub fn certificate(&mut self, cert: Certificate) -> &mut Self {
        self.certificates.push(cert);
        self
    }

    pub fn require_signers(&mut self, signers: &[KeyHash]) -> &mut Self {
        for s in signers {
            if !self.required_signers.contains(s) {
                self.required_signers.push(*s);
            }
        }
        self
    }

    pub fn with_collateral(&mut self, utxo: UTxO) -> &mut Self {
        self.collateral = Some(utxo);
        self
    }

    /// Whether any input, mint, or withdrawal runs a script.
    pub fn runs_scripts(&self) -> bool {
        self.inputs
            .iter()
            .any(|i| matches!(i.witness, InputWitness::Script { .. }))
            || !self.mints.is_empty()
            || !self.withdrawals.is_empty()
    }

    /// Sum of the values of every planned input.
    pub fn input_value(&self) -> Result<Value, TxError> {
        let mut total = Value::new();
        for input in &self.inputs {
            total = total.checked_add(&input.utxo.value()?)?;
        }
        Ok(total)
    }

    /// Structural checks that hold for every well-formed plan.
    pub fn validate(&self) -> Result<(), TxError> {
        if self.inputs.is_empty() && self.wallet_utxos.is_empty() {
            return Err(TxError::Invalid("plan has no inputs".into()));
        }
        let mut seen = HashSet::new();
        for input in &self.inputs {
            if !seen.insert(&input.utxo.input) {
                return Err(TxError::Invalid(format!(
                    "input {} is spent twice",
                    input.utxo.input
                )));
            }
        }
        for reference in &self.reference_inputs {
            if seen.contains(&reference.input) {
                return Err(TxError::Invalid(format!(
                    "{} is both spent and referenced",
                    reference.input
                )));
            }
        }
        if self.mints.iter().any(|m| m.quantity == 0) {
            return Err(TxError::Invalid("zero-quantity mint".into()));
        }
        if self.runs_scripts() && self.collateral.is_none() {
            return Err(TxError::NoCollateral);
        }
        if self.change_address.is_empty() {
            return Err(TxError::Invalid("no change address".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ambassador_types::{Asset, Hash28, TxOutput};

    fn utxo(hash: &str, idx: u32, lovelace: u64) -> UTxO {
        UTxO {
            input: TxInRef::new(hash, idx),
            output: TxOutput {
                address: "addr_test1".into(),
                amount: vec![Asset::lovelace(lovelace)],
                plutus_data: None,
                data_hash: None,
                script_hash: None,
            },
        }
    }

    fn source() -> ScriptSource {
        ScriptSource::Provided {
            script_hash: Hash28([1; 28]),
            cbor: "00".into(),
        }
    }

    #[test]
    fn test_output_indices() {
        let mut plan = TxPlan::new("addr_test1change", vec![]);
        assert_eq!(plan.pay(PlannedOutput::new("a", Value::from_lovelace(1))), 0);
        assert_eq!(plan.pay(PlannedOutput::new("b", Value::from_lovelace(2))), 1);
    }

    #[test]
    fn test_script_spend_needs_collateral() {
        let mut plan = TxPlan::new("addr_test1change", vec![]);
        plan.spend_script(utxo("aa", 0, 5), source(), PlutusData::unit(0));
        assert!(matches!(plan.validate(), Err(TxError::NoCollateral)));
        plan.with_collateral(utxo("cc", 0, 5_000_000));
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_double_spend_rejected() {
        let mut plan = TxPlan::new("addr_test1change", vec![]);
        plan.spend_pubkey(utxo("aa", 0, 5)).spend_pubkey(utxo("aa", 0, 5));
        assert!(matches!(plan.validate(), Err(TxError::Invalid(_))));

        let mut plan = TxPlan::new("addr_test1change", vec![]);
        plan.spend_pubkey(utxo("aa", 0, 5)).read_only(utxo("aa", 0, 5));
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_required_signers_dedup() {
        let mut plan = TxPlan::new("x", vec![]);
        plan.require_signers(&[Hash28([1; 28]), Hash28([2; 28])])
            .require_signers(&[Hash28([1; 28])]);
        assert_eq!(plan.required_signers.len(), 2);
    }

    #[test]
    fn test_input_value() {
        let mut plan = TxPlan::new("x", vec![]);
        plan.spend_pubkey(utxo("aa", 0, 5)).spend_pubkey(utxo("bb", 1, 7));
        assert_eq!(plan.input_value().unwrap().lovelace(), 12);
    }
}
