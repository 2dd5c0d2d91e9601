//! Deployment transactions.

use ambassador_datum::redeemer::MintPolarity;
use ambassador_datum::{CounterDatum, OracleDatum, PlutusCodec, PlutusData, PlutusDataExt};
use ambassador_types::{AssetName, Credential, KeyHash, Value};

use crate::config::ScriptInfo;
use crate::plan::{Certificate, OutputDatum, PlannedOutput};
use crate::query;
use crate::TxError;

use super::{select_admins, BuilderContext, OutputRole, TxBuildResult};

pub struct SetupTx {
    ctx: BuilderContext,
}

impl SetupTx {
    pub fn new(ctx: BuilderContext) -> Self {
        Self { ctx }
    }

    /// Mint the oracle NFT by consuming the one-shot setup UTxO and lock it
    /// at the oracle address with the initial oracle datum.
    pub async fn mint_spend_oracle_nft(&self, oracle: &OracleDatum) -> Result<TxBuildResult, TxError> {
        let config = &self.ctx.config;
        if oracle.oracle.policy_id != config.oracle_policy_id {
            return Err(TxError::Config(
                "oracle datum names a different oracle NFT policy".into(),
            ));
        }
        if self.ctx.address(&oracle.oracle.address)? != config.oracle_address {
            return Err(TxError::Config(
                "oracle datum names a different oracle address".into(),
            ));
        }
        if oracle.multi_sig_threshold == 0 || oracle.multi_sig_threshold > oracle.admins.len() as u64 {
            return Err(TxError::Invalid(format!(
                "threshold {} with {} admins",
                oracle.multi_sig_threshold,
                oracle.admins.len()
            )));
        }

        let setup = query::fetch_input(self.ctx.provider.as_ref(), "setup UTxO", &config.setup_utxo).await?;
        let script = self.ctx.mint_script("oracleNft", &config.scripts.oracle_nft, &oracle.oracle)?;

        let mut plan = self.ctx.new_plan(true).await?;
        plan.spend_pubkey(setup).mint(
            config.oracle_policy_id,
            AssetName::empty(),
            1,
            script,
            MintPolarity::Mint.to_data(),
        );
        let value = self.ctx.entity_value(&config.oracle_policy_id, &AssetName::empty())?;
        let idx = plan.pay(
            PlannedOutput::new(config.oracle_address.clone(), value)
                .with_datum(OutputDatum::Inline(oracle.to_data())),
        );
        self.ctx
            .finish("mint_spend_oracle_nft", plan, vec![(OutputRole::Oracle, idx)])
            .await
    }

    /// Mint the counter NFT and lock it with `count = 0`.
    ///
    /// Fails while a counter NFT is still live at the counter address, and
    /// spends the configured counter setup UTxO when there is one.
    pub async fn mint_counter_nft(&self, admins: &[KeyHash]) -> Result<TxBuildResult, TxError> {
        let config = &self.ctx.config;
        let oracle = self.ctx.oracle().await?;
        let signers = select_admins(&oracle.datum, admins)?;
        let counter = &oracle.datum.counter;
        let counter_address = self.ctx.address(&counter.address)?;
        let live = query::fetch_holding(self.ctx.provider.as_ref(), &counter_address, &counter.policy_id).await?;
        if let Some(existing) = live.first() {
            return Err(TxError::Invalid(format!(
                "counter NFT already exists at {}",
                existing.input
            )));
        }
        let script = self
            .ctx
            .mint_script("counterNft", &config.scripts.counter_nft, counter)?;

        let mut plan = self.ctx.new_plan(true).await?;
        if let Some(input) = &config.counter_setup_utxo {
            let setup = query::fetch_input(self.ctx.provider.as_ref(), "counter setup UTxO", input).await?;
            plan.spend_pubkey(setup);
        }
        plan.read_only(oracle.utxo.clone())
            .mint(
                counter.policy_id,
                AssetName::empty(),
                1,
                script,
                MintPolarity::Mint.to_data(),
            )
            .require_signers(&signers);
        let value = self.ctx.entity_value(&counter.policy_id, &AssetName::empty())?;
        let idx = plan.pay(
            PlannedOutput::new(counter_address, value)
                .with_datum(OutputDatum::Inline(CounterDatum::new(0).to_data())),
        );
        self.ctx
            .finish("mint_counter_nft", plan, vec![(OutputRole::Counter, idx)])
            .await
    }

    /// Publish a script as a reference script. The output goes to the
    /// configured holder address, or the wallet's change address.
    pub async fn publish_reference_script(
        &self,
        name: &str,
        script: &ScriptInfo,
    ) -> Result<TxBuildResult, TxError> {
        let cbor = script
            .cbor
            .clone()
            .ok_or_else(|| TxError::Config(format!("script {} has no bytecode to publish", name)))?;
        let mut plan = self.ctx.new_plan(false).await?;
        let address = match &self.ctx.config.ref_script_address {
            Some(a) => a.clone(),
            None => plan.change_address.clone(),
        };
        let idx = plan.pay(PlannedOutput::new(address, Value::new()).with_reference_script(cbor));
        self.ctx
            .finish("publish_reference_script", plan, vec![(OutputRole::ReferenceScript, idx)])
            .await
    }

    /// Register the treasury withdrawal script's stake credential so the
    /// zero-amount withdrawal in sign-off transactions is accepted.
    pub async fn register_treasury_withdrawal(&self) -> Result<TxBuildResult, TxError> {
        let hash = self.ctx.config.scripts.treasury_withdrawal.hash;
        let mut plan = self.ctx.new_plan(false).await?;
        plan.certificate(Certificate::StakeRegistration(Credential::Script(hash.0)));
        self.ctx
            .finish("register_treasury_withdrawal", plan, Vec::new())
            .await
    }

    /// Send `amount` to the treasury. The output always carries an inline
    /// datum, without which the treasury validator cannot spend it.
    pub async fn deposit_to_treasury(&self, amount: &Value) -> Result<TxBuildResult, TxError> {
        if amount.lovelace() == 0 {
            return Err(TxError::Invalid("treasury deposit must include lovelace".into()));
        }
        let oracle = self.ctx.oracle().await?;
        let address = self.ctx.address(&oracle.datum.treasury_address)?;
        let mut plan = self.ctx.new_plan(false).await?;
        let idx = plan.pay(
            PlannedOutput::new(address, amount.clone()).with_datum(OutputDatum::Inline(PlutusData::unit(0))),
        );
        self.ctx
            .finish("deposit_to_treasury", plan, vec![(OutputRole::Treasury, idx)])
            .await
    }
}
