//! In-memory collaborators for exercising builders end-to-end.
//!
//! [`MockChain`] is a UTxO set with submission semantics: a transaction
//! whose inputs are not all unspent is rejected as consumed, otherwise its
//! inputs are removed and its outputs become spendable. [`RecordingCompleter`]
//! encodes a minimal transaction body from a plan and tells the chain what
//! the transaction will create. [`MockWallet`] signs with a real ed25519 key.
//! [`Deployment`] wires all three around a deployed oracle and counter.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use pallas_codec::minicbor::Encoder;

use ambassador_datum::hash::blake2b_224;
use ambassador_datum::oracle::EntityScript;
use ambassador_datum::{
    CounterDatum, OracleDatum, PlutusAddress, PlutusCodec, PlutusData, PlutusDataExt,
};
use ambassador_types::address::script_address;
use ambassador_types::value::token_unit;
use ambassador_types::{
    AssetName, Credential, Hash28, KeyHash, Network, TxInRef, TxOutput, UTxO, Value,
};

use crate::builder::BuilderContext;
use crate::config::{AppConfig, PollConfig, ScriptInfo, ScriptRegistry};
use crate::envelope::{TxEnvelope, VKeyWitness};
use crate::plan::{PlannedOutput, TxPlan};
use crate::provider::{ChainProvider, ProviderError, TxCompleter, Wallet};

/// Lovelace a zero-lovelace output is raised to, standing in for min-UTxO.
pub const MOCK_MIN_UTXO: u64 = 1_000_000;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// Chain
// =============================================================================

#[derive(Default)]
struct ChainState {
    utxos: Vec<UTxO>,
    /// Outputs announced by the completer, created when the tx is submitted.
    pending: HashMap<String, Vec<TxOutput>>,
    submitted: Vec<String>,
    next_tx: u64,
}

#[derive(Default)]
pub struct MockChain {
    state: Mutex<ChainState>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an output in a fresh transaction.
    pub fn place(&self, address: &str, value: &Value, datum: Option<&PlutusData>) -> UTxO {
        let mut state = lock(&self.state);
        state.next_tx += 1;
        let utxo = UTxO {
            input: TxInRef::new(format!("{:064x}", state.next_tx), 0),
            output: TxOutput {
                address: address.to_string(),
                amount: value.to_assets(),
                plutus_data: datum.map(|d| d.to_cbor_hex().expect("in-memory datum always encodes")),
                data_hash: None,
                script_hash: None,
            },
        };
        state.utxos.push(utxo.clone());
        utxo
    }

    pub fn insert(&self, utxo: UTxO) {
        lock(&self.state).utxos.push(utxo);
    }

    /// Consume an output outside of any submitted transaction, as a
    /// competing transaction would.
    pub fn spend(&self, input: &TxInRef) -> bool {
        let mut state = lock(&self.state);
        let before = state.utxos.len();
        state.utxos.retain(|u| &u.input != input);
        state.utxos.len() != before
    }

    pub fn utxos_at(&self, address: &str) -> Vec<UTxO> {
        lock(&self.state)
            .utxos
            .iter()
            .filter(|u| u.output.address == address)
            .cloned()
            .collect()
    }

    pub fn is_unspent(&self, input: &TxInRef) -> bool {
        lock(&self.state).utxos.iter().any(|u| &u.input == input)
    }

    /// Hashes of accepted transactions, in submission order.
    pub fn submitted(&self) -> Vec<String> {
        lock(&self.state).submitted.clone()
    }

    fn expect_outputs(&self, tx_hash: &str, outputs: Vec<TxOutput>) {
        lock(&self.state).pending.insert(tx_hash.to_string(), outputs);
    }
}

#[async_trait]
impl ChainProvider for MockChain {
    async fn fetch_utxos(
        &self,
        tx_hash: &str,
        output_index: Option<u32>,
    ) -> Result<Vec<UTxO>, ProviderError> {
        Ok(lock(&self.state)
            .utxos
            .iter()
            .filter(|u| u.input.tx_hash == tx_hash)
            .filter(|u| output_index.map_or(true, |i| u.input.output_index == i))
            .cloned()
            .collect())
    }

    async fn fetch_address_utxos(&self, address: &str) -> Result<Vec<UTxO>, ProviderError> {
        Ok(self.utxos_at(address))
    }

    async fn submit_tx(&self, tx_hex: &str) -> Result<String, ProviderError> {
        let tx = TxEnvelope::from_hex(tx_hex).map_err(|e| ProviderError::Rejected(e.to_string()))?;
        let inputs = tx.inputs().map_err(|e| ProviderError::Rejected(e.to_string()))?;
        let tx_hash = tx.tx_hash();

        let mut state = lock(&self.state);
        let missing: Vec<String> = inputs
            .iter()
            .filter(|i| !state.utxos.iter().any(|u| &u.input == *i))
            .map(|i| i.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ProviderError::InputsConsumed(format!(
                "BadInputsUTxO: {}",
                missing.join(", ")
            )));
        }
        state.utxos.retain(|u| !inputs.contains(&u.input));
        let outputs = state.pending.remove(&tx_hash).unwrap_or_default();
        for (i, output) in outputs.into_iter().enumerate() {
            state.utxos.push(UTxO {
                input: TxInRef::new(tx_hash.clone(), i as u32),
                output,
            });
        }
        state.submitted.push(tx_hash.clone());
        Ok(tx_hash)
    }

    async fn is_tx_confirmed(&self, tx_hash: &str) -> Result<bool, ProviderError> {
        Ok(lock(&self.state).submitted.iter().any(|h| h == tx_hash))
    }
}

// =============================================================================
// Completer
// =============================================================================

/// Encodes plans as minimal transactions and keeps every plan it saw.
pub struct RecordingCompleter {
    chain: Arc<MockChain>,
    plans: Mutex<Vec<TxPlan>>,
}

impl RecordingCompleter {
    pub fn new(chain: Arc<MockChain>) -> Self {
        Self {
            chain,
            plans: Mutex::new(Vec::new()),
        }
    }

    pub fn last_plan(&self) -> Option<TxPlan> {
        lock(&self.plans).last().cloned()
    }

    pub fn plan_count(&self) -> usize {
        lock(&self.plans).len()
    }
}

fn evaluation(e: impl std::fmt::Display) -> ProviderError {
    ProviderError::Evaluation(e.to_string())
}

fn to_output(planned: &PlannedOutput) -> Result<TxOutput, ProviderError> {
    let mut value = planned.value.clone();
    if value.lovelace() == 0 {
        let _ = value.add_unit(ambassador_types::constants::LOVELACE, MOCK_MIN_UTXO);
    }
    let plutus_data = match &planned.datum {
        Some(d) => Some(d.to_cbor_hex().map_err(evaluation)?),
        None => None,
    };
    Ok(TxOutput {
        address: planned.address.clone(),
        amount: value.to_assets(),
        plutus_data,
        data_hash: None,
        script_hash: planned
            .reference_script
            .as_ref()
            .map(|cbor| hex::encode(blake2b_224(cbor.as_bytes()))),
    })
}

/// `{0: 258([inputs]), 1: [[address, lovelace]], 2: 0, 14: 258([signers])}`
fn encode_body(
    inputs: &[TxInRef],
    outputs: &[TxOutput],
    signers: &[KeyHash],
) -> Result<Vec<u8>, ProviderError> {
    const SET_TAG: [u8; 3] = [0xd9, 0x01, 0x02];
    let mut body = Vec::new();
    let mut e = Encoder::new(&mut body);
    e.map(3 + u64::from(!signers.is_empty())).map_err(evaluation)?;

    e.u64(0).map_err(evaluation)?;
    e.writer_mut().extend_from_slice(&SET_TAG);
    e.array(inputs.len() as u64).map_err(evaluation)?;
    for input in inputs {
        let hash = hex::decode(&input.tx_hash).map_err(evaluation)?;
        e.array(2)
            .and_then(|e| e.bytes(&hash))
            .and_then(|e| e.u64(u64::from(input.output_index)))
            .map_err(evaluation)?;
    }

    e.u64(1).map_err(evaluation)?;
    e.array(outputs.len() as u64).map_err(evaluation)?;
    for output in outputs {
        let lovelace = Value::from_assets(&output.amount).map_err(evaluation)?.lovelace();
        e.array(2)
            .and_then(|e| e.str(&output.address))
            .and_then(|e| e.u64(lovelace))
            .map_err(evaluation)?;
    }

    e.u64(2).and_then(|e| e.u64(0)).map_err(evaluation)?;

    if !signers.is_empty() {
        e.u64(14).map_err(evaluation)?;
        e.writer_mut().extend_from_slice(&SET_TAG);
        e.array(signers.len() as u64).map_err(evaluation)?;
        for signer in signers {
            e.bytes(signer.as_bytes()).map_err(evaluation)?;
        }
    }
    Ok(body)
}

#[async_trait]
impl TxCompleter for RecordingCompleter {
    async fn complete(&self, plan: &TxPlan) -> Result<String, ProviderError> {
        let mut inputs: Vec<TxInRef> = plan.inputs.iter().map(|i| i.utxo.input.clone()).collect();
        let mut outputs: Vec<TxOutput> = plan.outputs.iter().map(to_output).collect::<Result<_, _>>()?;

        // Fee-free funding: one wallet UTxO in, the same value back as change.
        let collateral = plan.collateral.as_ref().map(|c| &c.input);
        if let Some(funding) = plan
            .wallet_utxos
            .iter()
            .find(|u| Some(&u.input) != collateral && !inputs.contains(&u.input))
        {
            inputs.push(funding.input.clone());
            outputs.push(TxOutput {
                address: plan.change_address.clone(),
                amount: funding.output.amount.clone(),
                plutus_data: None,
                data_hash: None,
                script_hash: None,
            });
        }

        let body = encode_body(&inputs, &outputs, &plan.required_signers)?;
        let tx = TxEnvelope::new(body);
        self.chain.expect_outputs(&tx.tx_hash(), outputs);
        lock(&self.plans).push(plan.clone());
        tx.to_hex().map_err(evaluation)
    }
}

// =============================================================================
// Wallet
// =============================================================================

/// A single-key wallet whose UTxOs live on a [`MockChain`].
pub struct MockWallet {
    key: SigningKey,
    address: String,
    chain: Arc<MockChain>,
    with_collateral: bool,
}

impl MockWallet {
    pub fn new(seed: u8, network: Network, chain: Arc<MockChain>) -> Self {
        let key = SigningKey::from_bytes(&[seed; 32]);
        let hash = blake2b_224(key.verifying_key().as_bytes());
        let address = PlutusAddress {
            payment: Credential::Key(hash),
            stake: None,
        }
        .to_bech32(network)
        .expect("enterprise key address always encodes");
        Self {
            key,
            address,
            chain,
            with_collateral: true,
        }
    }

    /// A wallet that reports no collateral.
    pub fn without_collateral(mut self) -> Self {
        self.with_collateral = false;
        self
    }

    pub fn key_hash(&self) -> KeyHash {
        Hash28(blake2b_224(self.key.verifying_key().as_bytes()))
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn plutus_address(&self) -> PlutusAddress {
        PlutusAddress {
            payment: Credential::Key(self.key_hash().0),
            stake: None,
        }
    }

    /// Seed the wallet with a funding UTxO and a collateral UTxO.
    pub fn fund(&self, lovelace: u64) {
        self.chain.place(&self.address, &Value::from_lovelace(lovelace), None);
        self.chain.place(&self.address, &Value::from_lovelace(5_000_000), None);
    }
}

#[async_trait]
impl Wallet for MockWallet {
    async fn change_address(&self) -> Result<String, ProviderError> {
        Ok(self.address.clone())
    }

    async fn utxos(&self) -> Result<Vec<UTxO>, ProviderError> {
        Ok(self.chain.utxos_at(&self.address))
    }

    async fn collateral(&self) -> Result<Vec<UTxO>, ProviderError> {
        if !self.with_collateral {
            return Ok(Vec::new());
        }
        Ok(self
            .chain
            .utxos_at(&self.address)
            .into_iter()
            .filter(|u| u.output.amount.len() == 1 && u.lovelace() == 5_000_000)
            .take(1)
            .collect())
    }

    async fn sign_tx(&self, tx_hex: &str, _partial: bool) -> Result<String, ProviderError> {
        let mut tx = TxEnvelope::from_hex(tx_hex).map_err(|e| ProviderError::Wallet(e.to_string()))?;
        let signature = self.key.sign(&tx.body_hash());
        tx.witness_set.add_vkey(VKeyWitness {
            vkey: self.key.verifying_key().to_bytes(),
            signature: signature.to_bytes(),
        });
        tx.to_hex().map_err(|e| ProviderError::Wallet(e.to_string()))
    }

    async fn submit_tx(&self, tx_hex: &str) -> Result<String, ProviderError> {
        self.chain.submit_tx(tx_hex).await
    }
}

// =============================================================================
// Deployment fixture
// =============================================================================

pub fn script_info(seed: u8) -> ScriptInfo {
    ScriptInfo {
        hash: Hash28([seed; 28]),
        cbor: None,
        reference: Some(TxInRef::new("ee".repeat(32), seed as u32)),
        size: Some(1_000),
    }
}

/// Configuration with deterministic script hashes, seeds 1 to 16.
pub fn sample_config(network: Network) -> AppConfig {
    let scripts = ScriptRegistry {
        oracle_nft: script_info(1),
        oracle: script_info(2),
        counter_nft: script_info(3),
        counter: script_info(4),
        membership_intent_mint: script_info(5),
        membership_intent: script_info(6),
        member_mint: script_info(7),
        member: script_info(8),
        propose_intent_mint: script_info(9),
        propose_intent: script_info(10),
        proposal_mint: script_info(11),
        proposal: script_info(12),
        sign_off_approval_mint: script_info(13),
        sign_off_approval: script_info(14),
        treasury: script_info(15),
        treasury_withdrawal: script_info(16),
    };
    AppConfig {
        network,
        oracle_policy_id: scripts.oracle_nft.hash,
        oracle_address: script_address(&scripts.oracle.hash.to_hex(), network)
            .expect("28-byte script hash always encodes"),
        setup_utxo: TxInRef::new("dd".repeat(32), 0),
        counter_setup_utxo: Some(TxInRef::new("cc".repeat(32), 0)),
        scripts,
        ref_script_address: None,
        selection_buffer_lovelace: 2_000_000,
        entity_output_lovelace: 2_000_000,
        polling: PollConfig::default(),
    }
}

fn locked_by(info: &ScriptInfo) -> PlutusAddress {
    PlutusAddress {
        payment: Credential::Script(info.hash.0),
        stake: None,
    }
}

/// Oracle datum consistent with `config`.
pub fn sample_oracle(config: &AppConfig, admins: Vec<KeyHash>, threshold: u64) -> OracleDatum {
    let s = &config.scripts;
    let entity = |mint: &ScriptInfo, spend: &ScriptInfo| EntityScript {
        policy_id: mint.hash,
        address: locked_by(spend),
    };
    OracleDatum {
        admins,
        admin_tenure: "2026".into(),
        multi_sig_threshold: threshold,
        oracle: entity(&s.oracle_nft, &s.oracle),
        counter: entity(&s.counter_nft, &s.counter),
        membership_intent: entity(&s.membership_intent_mint, &s.membership_intent),
        member: entity(&s.member_mint, &s.member),
        propose_intent: entity(&s.propose_intent_mint, &s.propose_intent),
        proposal: entity(&s.proposal_mint, &s.proposal),
        sign_off_approval: entity(&s.sign_off_approval_mint, &s.sign_off_approval),
        treasury_address: locked_by(&s.treasury),
        treasury_withdrawal_script_hash: s.treasury_withdrawal.hash,
    }
}

/// A deployed program: oracle and counter on chain, funded admin wallets.
pub struct Deployment {
    pub config: Arc<AppConfig>,
    pub oracle: OracleDatum,
    pub chain: Arc<MockChain>,
    pub completer: Arc<RecordingCompleter>,
    pub admins: Vec<Arc<MockWallet>>,
    pub oracle_utxo: UTxO,
    pub counter_utxo: UTxO,
}

impl Deployment {
    /// Deploy with `admin_count` admins (key seeds 1..), the given
    /// threshold, and the counter at `count`.
    pub fn new(admin_count: u8, threshold: u64, count: u64) -> Self {
        let network = Network::Preprod;
        let config = sample_config(network);
        let chain = Arc::new(MockChain::new());
        let admins: Vec<Arc<MockWallet>> = (1..=admin_count)
            .map(|seed| {
                let wallet = MockWallet::new(seed, network, chain.clone());
                wallet.fund(50_000_000);
                Arc::new(wallet)
            })
            .collect();
        let oracle = sample_oracle(&config, admins.iter().map(|a| a.key_hash()).collect(), threshold);

        let oracle_utxo = chain.place(
            &config.oracle_address,
            &nft_value(&oracle.oracle.policy_id),
            Some(&oracle.to_data()),
        );
        let counter_address = oracle
            .counter
            .address
            .to_bech32(network)
            .expect("script address always encodes");
        let counter_utxo = chain.place(
            &counter_address,
            &nft_value(&oracle.counter.policy_id),
            Some(&CounterDatum::new(count).to_data()),
        );

        Self {
            config: Arc::new(config),
            oracle,
            completer: Arc::new(RecordingCompleter::new(chain.clone())),
            chain,
            admins,
            oracle_utxo,
            counter_utxo,
        }
    }

    pub fn admin_hashes(&self) -> Vec<KeyHash> {
        self.admins.iter().map(|a| a.key_hash()).collect()
    }

    /// Builder context acting as `wallet`.
    pub fn context(&self, wallet: Arc<MockWallet>) -> BuilderContext {
        BuilderContext::new(
            self.config.clone(),
            self.chain.clone(),
            wallet,
            self.completer.clone(),
        )
    }

    /// A new funded wallet that is not an admin.
    pub fn user(&self, seed: u8) -> Arc<MockWallet> {
        let wallet = MockWallet::new(seed, self.config.network, self.chain.clone());
        wallet.fund(50_000_000);
        Arc::new(wallet)
    }

    pub fn bech32(&self, address: &PlutusAddress) -> String {
        address
            .to_bech32(self.config.network)
            .expect("fixture addresses always encode")
    }

    /// Place an entity output holding one token of `policy_id` named `name`.
    pub fn place_entity(
        &self,
        entity: &EntityScript,
        name: &AssetName,
        datum: &PlutusData,
    ) -> UTxO {
        let mut value = Value::from_lovelace(2_000_000);
        let _ = value.add_unit(&token_unit(&entity.policy_id, name), 1);
        self.chain.place(&self.bech32(&entity.address), &value, Some(datum))
    }

    /// Place treasury UTxOs of the given lovelace amounts.
    pub fn fund_treasury(&self, amounts: &[u64]) -> Vec<UTxO> {
        let address = self.bech32(&self.oracle.treasury_address);
        amounts
            .iter()
            .map(|a| {
                self.chain
                    .place(&address, &Value::from_lovelace(*a), Some(&PlutusData::unit(0)))
            })
            .collect()
    }
}

fn nft_value(policy_id: &Hash28) -> Value {
    let mut value = Value::from_lovelace(2_000_000);
    let _ = value.add_unit(&token_unit(policy_id, &AssetName::empty()), 1);
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_submit_consumes_and_creates() {
        let d = Deployment::new(1, 1, 0);
        let admin = d.admins[0].clone();
        let before = admin.utxos().await.unwrap();
        assert_eq!(before.len(), 2);

        let mut plan = TxPlan::new(admin.address(), before.clone());
        plan.pay(PlannedOutput::new("addr_test1qqqq", Value::from_lovelace(3_000_000)));
        let tx_hex = d.completer.complete(&plan).await.unwrap();
        let signed = admin.sign_tx(&tx_hex, true).await.unwrap();
        let hash = d.chain.submit_tx(&signed).await.unwrap();

        assert!(d.chain.is_tx_confirmed(&hash).await.unwrap());
        assert_eq!(d.chain.utxos_at("addr_test1qqqq").len(), 1);
        // Resubmitting spends the same inputs again.
        assert!(matches!(
            d.chain.submit_tx(&signed).await,
            Err(ProviderError::InputsConsumed(_))
        ));
    }

    #[tokio::test]
    async fn test_wallet_signature_lands_in_witness_set() {
        let d = Deployment::new(1, 1, 0);
        let admin = &d.admins[0];
        let plan = TxPlan::new(admin.address(), admin.utxos().await.unwrap());
        let tx_hex = d.completer.complete(&plan).await.unwrap();
        let signed = TxEnvelope::from_hex(&admin.sign_tx(&tx_hex, true).await.unwrap()).unwrap();
        assert_eq!(signed.witness_set.vkeys.len(), 1);
        assert_eq!(
            Hash28(blake2b_224(&signed.witness_set.vkeys[0].vkey)),
            admin.key_hash()
        );
    }

    #[test]
    fn test_fixture_config_is_valid() {
        let d = Deployment::new(3, 2, 0);
        d.config.validate().unwrap();
        assert_eq!(d.oracle.admins.len(), 3);
    }
}
