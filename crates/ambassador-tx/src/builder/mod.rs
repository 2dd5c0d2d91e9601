//! Transaction builders.
//!
//! Three roles share one [`BuilderContext`]: [`SetupTx`] for deployment,
//! [`UserActionTx`] for applicants and members, [`AdminActionTx`] for
//! multisig-approved transitions. Every method re-reads the UTxOs it
//! spends, presents the oracle as a reference input whenever a script runs
//! against it, and returns the unsigned transaction with the index of each
//! output it created.

mod admin;
mod setup;
mod user;

pub use admin::AdminActionTx;
pub use setup::SetupTx;
pub use user::UserActionTx;

use std::sync::Arc;

use log::info;

use ambassador_datum::oracle::EntityScript;
use ambassador_datum::{OracleDatum, PlutusAddress};
use ambassador_types::text::hex_to_string;
use ambassador_types::value::token_unit;
use ambassador_types::{AssetName, Credential, Hash28, KeyHash, PolicyId, UTxO, Value};

use crate::config::{AppConfig, ScriptInfo};
use crate::envelope::TxEnvelope;
use crate::plan::{ScriptSource, TxPlan};
use crate::provider::{ChainProvider, TxCompleter, Wallet};
use crate::query::{self, OracleState};
use crate::TxError;

/// What a created output holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputRole {
    Oracle,
    Counter,
    MembershipIntent,
    Member,
    ProposeIntent,
    Proposal,
    SignOffApproval,
    Treasury,
    TreasuryPayout,
    TreasuryChange,
    ReferenceScript,
}

/// An unsigned transaction and where its outputs landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxBuildResult {
    pub tx_hex: String,
    pub tx_hash: String,
    pub outputs: Vec<(OutputRole, u32)>,
}

impl TxBuildResult {
    pub fn index_of(&self, role: OutputRole) -> Option<u32> {
        self.outputs.iter().find(|(r, _)| *r == role).map(|(_, i)| *i)
    }
}

/// Shared collaborators of every builder.
#[derive(Clone)]
pub struct BuilderContext {
    pub config: Arc<AppConfig>,
    pub provider: Arc<dyn ChainProvider>,
    pub wallet: Arc<dyn Wallet>,
    pub completer: Arc<dyn TxCompleter>,
}

impl BuilderContext {
    pub fn new(
        config: Arc<AppConfig>,
        provider: Arc<dyn ChainProvider>,
        wallet: Arc<dyn Wallet>,
        completer: Arc<dyn TxCompleter>,
    ) -> Self {
        Self {
            config,
            provider,
            wallet,
            completer,
        }
    }

    /// Empty plan funded by the wallet. Collateral is attached when the
    /// transaction will run scripts.
    pub(crate) async fn new_plan(&self, runs_scripts: bool) -> Result<TxPlan, TxError> {
        let change_address = self.wallet.change_address().await?;
        let utxos = self.wallet.utxos().await?;
        let mut plan = TxPlan::new(change_address, utxos);
        if runs_scripts {
            let collateral = self
                .wallet
                .collateral()
                .await?
                .into_iter()
                .next()
                .ok_or(TxError::NoCollateral)?;
            plan.with_collateral(collateral);
        }
        Ok(plan)
    }

    pub(crate) async fn oracle(&self) -> Result<OracleState, TxError> {
        query::fetch_oracle(self.provider.as_ref(), &self.config).await
    }

    /// The current on-chain version of a UTxO the caller passed in.
    pub(crate) async fn current(&self, what: &'static str, utxo: &UTxO) -> Result<UTxO, TxError> {
        query::fetch_input(self.provider.as_ref(), what, &utxo.input).await
    }

    pub(crate) fn address(&self, address: &PlutusAddress) -> Result<String, TxError> {
        Ok(address.to_bech32(self.config.network)?)
    }

    /// Spending script of `entity`, checked against the address in the oracle.
    pub(crate) fn spend_script(
        &self,
        name: &'static str,
        info: &ScriptInfo,
        entity: &EntityScript,
    ) -> Result<ScriptSource, TxError> {
        self.spend_script_at(name, info, &entity.address)
    }

    pub(crate) fn spend_script_at(
        &self,
        name: &'static str,
        info: &ScriptInfo,
        address: &PlutusAddress,
    ) -> Result<ScriptSource, TxError> {
        check_hash(name, info, &script_credential(address))?;
        info.source(name)
    }

    /// Minting policy of `entity`, checked against the policy in the oracle.
    pub(crate) fn mint_script(
        &self,
        name: &'static str,
        info: &ScriptInfo,
        entity: &EntityScript,
    ) -> Result<ScriptSource, TxError> {
        check_hash(name, info, &Some(entity.policy_id))?;
        info.source(name)
    }

    /// Value of a newly created entity output: one NFT plus lovelace.
    pub(crate) fn entity_value(&self, policy_id: &PolicyId, name: &AssetName) -> Result<Value, TxError> {
        let mut value = Value::from_lovelace(self.config.entity_output_lovelace);
        value.add_unit(&token_unit(policy_id, name), 1)?;
        Ok(value)
    }

    /// Validate, complete, and log a plan.
    pub(crate) async fn finish(
        &self,
        action: &'static str,
        plan: TxPlan,
        outputs: Vec<(OutputRole, u32)>,
    ) -> Result<TxBuildResult, TxError> {
        plan.validate()?;
        let tx_hex = self.completer.complete(&plan).await?;
        let tx_hash = TxEnvelope::from_hex(&tx_hex)
            .map_err(|e| TxError::Completion(format!("completer returned an unreadable transaction: {}", e)))?
            .tx_hash();
        info!(
            "built {}: {} inputs, {} outputs, {} mints, tx {}",
            action,
            plan.inputs.len(),
            plan.outputs.len(),
            plan.mints.len(),
            tx_hash
        );
        Ok(TxBuildResult {
            tx_hex,
            tx_hash,
            outputs,
        })
    }
}

fn script_credential(address: &PlutusAddress) -> Option<Hash28> {
    match address.payment {
        Credential::Script(h) => Some(Hash28(h)),
        Credential::Key(_) => None,
    }
}

fn check_hash(name: &str, info: &ScriptInfo, on_chain: &Option<Hash28>) -> Result<(), TxError> {
    match on_chain {
        Some(h) if *h == info.hash => Ok(()),
        Some(h) => Err(TxError::Config(format!(
            "script {} is {} but the oracle records {}",
            name, info.hash, h
        ))),
        None => Err(TxError::Config(format!(
            "oracle records a key address where script {} is expected",
            name
        ))),
    }
}

/// Key hash of an address's payment part, if it is a key credential.
pub(crate) fn key_signer(address: &PlutusAddress) -> Option<KeyHash> {
    match address.payment {
        Credential::Key(h) => Some(Hash28(h)),
        Credential::Script(_) => None,
    }
}

/// Asset name of the token `utxo` holds under `policy_id`.
pub(crate) fn held_token(what: &'static str, utxo: &UTxO, policy_id: &PolicyId) -> Result<AssetName, TxError> {
    let name = utxo
        .value()?
        .asset_name_of(&policy_id.to_hex())
        .ok_or_else(|| TxError::missing(what, format!("{} holds no {} token", utxo.input, policy_id)))?;
    name.parse::<AssetName>()
        .map_err(|e| TxError::Invalid(format!("{}: {}", what, e)))
}

/// Member index encoded in a member token name (decimal text).
pub(crate) fn member_index(name: &AssetName) -> Result<u64, TxError> {
    hex_to_string(&name.to_hex())
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| TxError::Invalid(format!("member token name {} is not a decimal index", name)))
}

/// `value` with one `from` token replaced by one `to` token.
pub(crate) fn swap_token(value: &Value, from: &str, to: &str) -> Result<Value, TxError> {
    let mut out = value.clone();
    out.sub_unit(from, 1)?;
    out.add_unit(to, 1)?;
    Ok(out)
}

/// Check an admin selection against the oracle and return it deduplicated.
///
/// Every selected admin must be listed in the oracle, and the selection must
/// reach the multisig threshold, since the required signers fixed here cannot
/// be extended after the transaction is built.
pub fn select_admins(oracle: &OracleDatum, selected: &[KeyHash]) -> Result<Vec<KeyHash>, TxError> {
    let mut out: Vec<KeyHash> = Vec::with_capacity(selected.len());
    for admin in selected {
        if !oracle.is_admin(admin) {
            return Err(TxError::Invalid(format!("{} is not an admin", admin)));
        }
        if !out.contains(admin) {
            out.push(*admin);
        }
    }
    if (out.len() as u64) < oracle.multi_sig_threshold {
        return Err(TxError::Invalid(format!(
            "{} admins selected, threshold is {}",
            out.len(),
            oracle.multi_sig_threshold
        )));
    }
    Ok(out)
}
