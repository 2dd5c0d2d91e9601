//! Admin transitions.
//!
//! Every method takes the admin selection the transaction is built for.
//! The selection becomes the required-signer set and must reach the oracle's
//! multisig threshold.

use log::debug;

use ambassador_datum::oracle::EntityScript;
use ambassador_datum::redeemer::{
    CounterRedeemer, MemberRedeemer, MembershipIntentRedeemer, MintPolarity, OracleRedeemer,
    ProposalRedeemer, ProposeIntentRedeemer, SignOffApprovalRedeemer, TreasuryRedeemer,
    TreasuryWithdrawalRedeemer,
};
use ambassador_datum::{
    MemberDatum, MembershipIntentDatum, OracleDatum, PlutusCodec, PlutusData, PlutusDataExt,
    ProposalDatum,
};
use ambassador_types::value::token_unit;
use ambassador_types::{AssetName, KeyHash, UTxO, Value};

use crate::config::{ScriptInfo, ScriptRegistry};
use crate::plan::{OutputDatum, PlannedOutput, TxPlan};
use crate::query::{self, decode_entity, OracleState};
use crate::selection::{ensure_balance, select_for_withdrawal};
use crate::TxError;

use super::{
    held_token, member_index, select_admins, swap_token, BuilderContext, OutputRole,
    TxBuildResult,
};

pub struct AdminActionTx {
    ctx: BuilderContext,
}

/// One step of the token chain propose intent -> proposal -> sign-off.
struct Conversion<'a> {
    what: &'static str,
    from: &'a EntityScript,
    from_spend: (&'static str, &'a ScriptInfo),
    from_mint: (&'static str, &'a ScriptInfo),
    redeemer: PlutusData,
    to: &'a EntityScript,
    to_mint: (&'static str, &'a ScriptInfo),
    role: OutputRole,
}

impl AdminActionTx {
    pub fn new(ctx: BuilderContext) -> Self {
        Self { ctx }
    }

    /// Oracle state and a script-running plan signed by the checked selection.
    async fn prepare(&self, admins: &[KeyHash]) -> Result<(OracleState, TxPlan), TxError> {
        let oracle = self.ctx.oracle().await?;
        let signers = select_admins(&oracle.datum, admins)?;
        let mut plan = self.ctx.new_plan(true).await?;
        plan.require_signers(&signers);
        Ok((oracle, plan))
    }

    // ─── Membership ─────────────────────────────────────────────────────────

    /// Convert an application into a member. The counter is consumed and
    /// re-created with `count + 1`; the member token is named after the
    /// count before the increment.
    pub async fn approve_member(&self, intent_utxo: &UTxO, admins: &[KeyHash]) -> Result<TxBuildResult, TxError> {
        let intent_utxo = self.ctx.current("membership intent", intent_utxo).await?;
        let intent = decode_entity::<MembershipIntentDatum>("membership intent", &intent_utxo)?;
        let (oracle, mut plan) = self.prepare(admins).await?;
        let o = &oracle.datum;
        let counter = query::fetch_counter(self.ctx.provider.as_ref(), o, self.ctx.config.network).await?;
        let scripts = &self.ctx.config.scripts;

        let intent_name = held_token("membership intent", &intent_utxo, &o.membership_intent.policy_id)?;
        let member_name = counter
            .datum
            .member_token_name()
            .parse::<AssetName>()
            .map_err(|e| TxError::Invalid(e.to_string()))?;
        let next = counter.datum.incremented()?;
        debug!("approving member {} (counter {} -> {})", intent_utxo.input, counter.datum.count, next.count);

        plan.read_only(oracle.utxo.clone())
            .spend_script(
                counter.utxo.clone(),
                self.ctx.spend_script("counter", &scripts.counter, &o.counter)?,
                CounterRedeemer::IncrementCount.to_data(),
            )
            .spend_script(
                intent_utxo.clone(),
                self.ctx
                    .spend_script("membershipIntent", &scripts.membership_intent, &o.membership_intent)?,
                MembershipIntentRedeemer::ApproveMember.to_data(),
            )
            .mint(
                o.membership_intent.policy_id,
                intent_name,
                -1,
                self.ctx
                    .mint_script("membershipIntentMint", &scripts.membership_intent_mint, &o.membership_intent)?,
                MintPolarity::Burn.to_data(),
            )
            .mint(
                o.member.policy_id,
                member_name.clone(),
                1,
                self.ctx.mint_script("memberMint", &scripts.member_mint, &o.member)?,
                MintPolarity::Mint.to_data(),
            );

        let counter_idx = plan.pay(
            PlannedOutput::new(counter.utxo.output.address.clone(), counter.utxo.value()?)
                .with_datum(OutputDatum::Inline(next.to_data())),
        );
        let member = MemberDatum::from_intent(&intent.datum);
        let member_idx = plan.pay(
            PlannedOutput::new(
                self.ctx.address(&o.member.address)?,
                self.ctx.entity_value(&o.member.policy_id, &member_name)?,
            )
            .with_datum(OutputDatum::Inline(member.to_data())),
        );
        self.ctx
            .finish(
                "approve_member",
                plan,
                vec![(OutputRole::Counter, counter_idx), (OutputRole::Member, member_idx)],
            )
            .await
    }

    /// Burn an application without creating a member.
    pub async fn reject_member(&self, intent_utxo: &UTxO, admins: &[KeyHash]) -> Result<TxBuildResult, TxError> {
        let intent_utxo = self.ctx.current("membership intent", intent_utxo).await?;
        let (oracle, mut plan) = self.prepare(admins).await?;
        let o = &oracle.datum;
        let scripts = &self.ctx.config.scripts;
        let name = held_token("membership intent", &intent_utxo, &o.membership_intent.policy_id)?;

        plan.read_only(oracle.utxo.clone())
            .spend_script(
                intent_utxo,
                self.ctx
                    .spend_script("membershipIntent", &scripts.membership_intent, &o.membership_intent)?,
                MembershipIntentRedeemer::RejectMember.to_data(),
            )
            .mint(
                o.membership_intent.policy_id,
                name,
                -1,
                self.ctx
                    .mint_script("membershipIntentMint", &scripts.membership_intent_mint, &o.membership_intent)?,
                MintPolarity::Burn.to_data(),
            );
        self.ctx.finish("reject_member", plan, Vec::new()).await
    }

    /// Burn a member token, removing the member.
    pub async fn remove_member(&self, member_utxo: &UTxO, admins: &[KeyHash]) -> Result<TxBuildResult, TxError> {
        let member_utxo = self.ctx.current("member", member_utxo).await?;
        let (oracle, mut plan) = self.prepare(admins).await?;
        let o = &oracle.datum;
        let scripts = &self.ctx.config.scripts;
        let name = held_token("member", &member_utxo, &o.member.policy_id)?;

        plan.read_only(oracle.utxo.clone())
            .spend_script(
                member_utxo,
                self.ctx.spend_script("member", &scripts.member, &o.member)?,
                MemberRedeemer::AdminRemoveMember.to_data(),
            )
            .mint(
                o.member.policy_id,
                name,
                -1,
                self.ctx.mint_script("memberMint", &scripts.member_mint, &o.member)?,
                MintPolarity::Burn.to_data(),
            );
        self.ctx.finish("remove_member", plan, Vec::new()).await
    }

    // ─── Proposals ──────────────────────────────────────────────────────────

    /// Burn the token of `utxo` under `step.from` and mint the same asset name
    /// under `step.to`, re-locking the datum byte-for-byte at `step.to`.
    async fn convert(
        &self,
        action: &'static str,
        utxo: &UTxO,
        admins: &[KeyHash],
        step: impl for<'a> Fn(&'a OracleState, &'a ScriptRegistry) -> Conversion<'a>,
    ) -> Result<TxBuildResult, TxError> {
        let (oracle, mut plan) = self.prepare(admins).await?;
        let step = step(&oracle, &self.ctx.config.scripts);
        let utxo = self.ctx.current(step.what, utxo).await?;
        decode_entity::<ProposalDatum>(step.what, &utxo)?;
        let name = held_token(step.what, &utxo, &step.from.policy_id)?;
        let raw = utxo
            .inline_datum()
            .map(str::to_string)
            .ok_or_else(|| TxError::missing(step.what, "no inline datum"))?;

        plan.read_only(oracle.utxo.clone())
            .spend_script(
                utxo.clone(),
                self.ctx.spend_script(step.from_spend.0, step.from_spend.1, step.from)?,
                step.redeemer.clone(),
            )
            .mint(
                step.from.policy_id,
                name.clone(),
                -1,
                self.ctx.mint_script(step.from_mint.0, step.from_mint.1, step.from)?,
                MintPolarity::Burn.to_data(),
            )
            .mint(
                step.to.policy_id,
                name.clone(),
                1,
                self.ctx.mint_script(step.to_mint.0, step.to_mint.1, step.to)?,
                MintPolarity::Mint.to_data(),
            );
        let value = swap_token(
            &utxo.value()?,
            &token_unit(&step.from.policy_id, &name),
            &token_unit(&step.to.policy_id, &name),
        )?;
        let idx = plan.pay(
            PlannedOutput::new(self.ctx.address(&step.to.address)?, value)
                .with_datum(OutputDatum::InlineCbor(raw)),
        );
        let role = step.role;
        self.ctx.finish(action, plan, vec![(role, idx)]).await
    }

    /// Propose intent -> proposal, keeping the asset name.
    pub async fn approve_proposal(&self, intent_utxo: &UTxO, admins: &[KeyHash]) -> Result<TxBuildResult, TxError> {
        self.convert("approve_proposal", intent_utxo, admins, |oracle, scripts| Conversion {
            what: "propose intent",
            from: &oracle.datum.propose_intent,
            from_spend: ("proposeIntent", &scripts.propose_intent),
            from_mint: ("proposeIntentMint", &scripts.propose_intent_mint),
            redeemer: ProposeIntentRedeemer::ApproveProposal.to_data(),
            to: &oracle.datum.proposal,
            to_mint: ("proposalMint", &scripts.proposal_mint),
            role: OutputRole::Proposal,
        })
        .await
    }

    /// Proposal -> sign-off approval, keeping the asset name.
    pub async fn approve_sign_off(&self, proposal_utxo: &UTxO, admins: &[KeyHash]) -> Result<TxBuildResult, TxError> {
        self.convert("approve_sign_off", proposal_utxo, admins, |oracle, scripts| Conversion {
            what: "proposal",
            from: &oracle.datum.proposal,
            from_spend: ("proposal", &scripts.proposal),
            from_mint: ("proposalMint", &scripts.proposal_mint),
            redeemer: ProposalRedeemer::ApproveSignOff.to_data(),
            to: &oracle.datum.sign_off_approval,
            to_mint: ("signOffApprovalMint", &scripts.sign_off_approval_mint),
            role: OutputRole::SignOffApproval,
        })
        .await
    }

    /// Burn a propose intent.
    pub async fn reject_proposal(&self, intent_utxo: &UTxO, admins: &[KeyHash]) -> Result<TxBuildResult, TxError> {
        let intent_utxo = self.ctx.current("propose intent", intent_utxo).await?;
        let (oracle, mut plan) = self.prepare(admins).await?;
        let o = &oracle.datum;
        let scripts = &self.ctx.config.scripts;
        let name = held_token("propose intent", &intent_utxo, &o.propose_intent.policy_id)?;

        plan.read_only(oracle.utxo.clone())
            .spend_script(
                intent_utxo,
                self.ctx
                    .spend_script("proposeIntent", &scripts.propose_intent, &o.propose_intent)?,
                ProposeIntentRedeemer::RejectProposal.to_data(),
            )
            .mint(
                o.propose_intent.policy_id,
                name,
                -1,
                self.ctx
                    .mint_script("proposeIntentMint", &scripts.propose_intent_mint, &o.propose_intent)?,
                MintPolarity::Burn.to_data(),
            );
        self.ctx.finish("reject_proposal", plan, Vec::new()).await
    }

    /// Release treasury funds for a signed-off proposal.
    ///
    /// Spends the sign-off approval (burning its token), the proposing
    /// member's UTxO, and enough treasury UTxOs to cover the requested
    /// amount. Pays the receiver, returns treasury change with an inline
    /// datum, records the completion on the member, and invokes the
    /// treasury withdrawal script with a zero withdrawal.
    pub async fn sign_off(
        &self,
        sign_off_utxo: &UTxO,
        member_utxo: &UTxO,
        admins: &[KeyHash],
    ) -> Result<TxBuildResult, TxError> {
        let sign_off_utxo = self.ctx.current("sign-off approval", sign_off_utxo).await?;
        let member_utxo = self.ctx.current("member", member_utxo).await?;
        let proposal = decode_entity::<ProposalDatum>("sign-off approval", &sign_off_utxo)?;
        let member = decode_entity::<MemberDatum>("member", &member_utxo)?;
        let (oracle, mut plan) = self.prepare(admins).await?;
        let o = &oracle.datum;
        let network = self.ctx.config.network;
        let scripts = &self.ctx.config.scripts;

        let member_name = held_token("member", &member_utxo, &o.member.policy_id)?;
        if member_index(&member_name)? != proposal.datum.member {
            return Err(TxError::Invalid(format!(
                "sign-off is for member {} but {} holds member token {}",
                proposal.datum.member, member_utxo.input, member_name
            )));
        }
        let sign_off_name = held_token("sign-off approval", &sign_off_utxo, &o.sign_off_approval.policy_id)?;
        if scripts.treasury_withdrawal.hash != o.treasury_withdrawal_script_hash {
            return Err(TxError::Config(format!(
                "treasury withdrawal script is {} but the oracle records {}",
                scripts.treasury_withdrawal.hash, o.treasury_withdrawal_script_hash
            )));
        }

        let amount = proposal.datum.fund_requested;
        let required = Value::from_lovelace(amount);
        let (treasury, balance) = query::fetch_treasury(self.ctx.provider.as_ref(), o, network).await?;
        ensure_balance(&balance, &required)?;
        let selection = select_for_withdrawal(&treasury, &required, self.ctx.config.selection_buffer_lovelace)?;

        let treasury_script = self
            .ctx
            .spend_script_at("treasury", &scripts.treasury, &o.treasury_address)?;
        let withdrawal_script = scripts.treasury_withdrawal.source("treasuryWithdrawal")?;

        plan.read_only(oracle.utxo.clone())
            .spend_script(
                sign_off_utxo.clone(),
                self.ctx
                    .spend_script("signOffApproval", &scripts.sign_off_approval, &o.sign_off_approval)?,
                SignOffApprovalRedeemer::ProcessSignOff.to_data(),
            )
            .spend_script(
                member_utxo.clone(),
                self.ctx.spend_script("member", &scripts.member, &o.member)?,
                MemberRedeemer::AdminSignOff.to_data(),
            );
        for utxo in &selection.selected {
            plan.spend_script(utxo.clone(), treasury_script.clone(), TreasuryRedeemer::Withdraw.to_data());
        }
        plan.mint(
            o.sign_off_approval.policy_id,
            sign_off_name,
            -1,
            self.ctx
                .mint_script("signOffApprovalMint", &scripts.sign_off_approval_mint, &o.sign_off_approval)?,
            MintPolarity::Burn.to_data(),
        )
        .withdraw(
            self.ctx.config.treasury_withdrawal_reward_address()?,
            0,
            withdrawal_script,
            TreasuryWithdrawalRedeemer::Withdraw.to_data(),
        );

        let updated = member.datum.with_completion(proposal.datum.metadata.clone(), amount)?;
        let mut outputs = Vec::with_capacity(3);
        outputs.push((
            OutputRole::Member,
            plan.pay(
                PlannedOutput::new(member_utxo.output.address.clone(), member_utxo.value()?)
                    .with_datum(OutputDatum::Inline(updated.to_data())),
            ),
        ));
        outputs.push((
            OutputRole::TreasuryPayout,
            plan.pay(PlannedOutput::new(
                proposal.datum.receiver.to_bech32(network)?,
                required,
            )),
        ));
        if selection.has_change() {
            outputs.push((
                OutputRole::TreasuryChange,
                plan.pay(
                    PlannedOutput::new(self.ctx.address(&o.treasury_address)?, selection.change.clone())
                        .with_datum(OutputDatum::Inline(PlutusData::unit(0))),
                ),
            ));
        }
        debug!(
            "sign-off of {} lovelace from {} treasury UTxOs",
            amount,
            selection.selected.len()
        );
        self.ctx.finish("sign_off", plan, outputs).await
    }

    // ─── Oracle and counter ─────────────────────────────────────────────────

    async fn update_oracle(
        &self,
        action: &'static str,
        admins: &[KeyHash],
        redeemer: OracleRedeemer,
        update: impl FnOnce(&OracleDatum) -> OracleDatum,
    ) -> Result<TxBuildResult, TxError> {
        let (oracle, mut plan) = self.prepare(admins).await?;
        let script = self
            .ctx
            .spend_script("oracle", &self.ctx.config.scripts.oracle, &oracle.datum.oracle)?;
        let next = update(&oracle.datum);
        plan.spend_script(oracle.utxo.clone(), script, redeemer.to_data());
        let idx = plan.pay(
            PlannedOutput::new(oracle.utxo.output.address.clone(), oracle.utxo.value()?)
                .with_datum(OutputDatum::Inline(next.to_data())),
        );
        self.ctx.finish(action, plan, vec![(OutputRole::Oracle, idx)]).await
    }

    /// Replace the admin set. The current threshold must remain reachable.
    pub async fn rotate_admin(
        &self,
        new_admins: Vec<KeyHash>,
        admin_tenure: String,
        admins: &[KeyHash],
    ) -> Result<TxBuildResult, TxError> {
        let mut distinct = new_admins.clone();
        distinct.sort();
        distinct.dedup();
        if distinct.len() != new_admins.len() || new_admins.is_empty() {
            return Err(TxError::Invalid("new admin set must be non-empty and distinct".into()));
        }
        let redeemer = OracleRedeemer::RotateAdmin {
            admins: new_admins.clone(),
            admin_tenure: admin_tenure.clone(),
        };
        let threshold = self.ctx.oracle().await?.datum.multi_sig_threshold;
        if (new_admins.len() as u64) < threshold {
            return Err(TxError::Invalid(format!(
                "{} admins cannot meet threshold {}",
                new_admins.len(),
                threshold
            )));
        }
        self.update_oracle("rotate_admin", admins, redeemer, |o| {
            o.with_admins(new_admins, admin_tenure)
        })
        .await
    }

    /// Change the multisig threshold.
    pub async fn update_threshold(&self, threshold: u64, admins: &[KeyHash]) -> Result<TxBuildResult, TxError> {
        let current = self.ctx.oracle().await?.datum;
        if threshold == 0 || threshold > current.admins.len() as u64 {
            return Err(TxError::Invalid(format!(
                "threshold {} with {} admins",
                threshold,
                current.admins.len()
            )));
        }
        self.update_oracle(
            "update_threshold",
            admins,
            OracleRedeemer::UpdateThreshold(threshold),
            |o| o.with_threshold(threshold),
        )
        .await
    }

    /// Spend the oracle and burn its NFT, shutting the program down.
    pub async fn stop_oracle(&self, admins: &[KeyHash]) -> Result<TxBuildResult, TxError> {
        let (oracle, mut plan) = self.prepare(admins).await?;
        let o = &oracle.datum;
        let scripts = &self.ctx.config.scripts;
        let name = held_token("oracle", &oracle.utxo, &o.oracle.policy_id)?;
        plan.spend_script(
            oracle.utxo.clone(),
            self.ctx.spend_script("oracle", &scripts.oracle, &o.oracle)?,
            OracleRedeemer::StopOracle.to_data(),
        )
        .mint(
            o.oracle.policy_id,
            name,
            -1,
            self.ctx.mint_script("oracleNft", &scripts.oracle_nft, &o.oracle)?,
            MintPolarity::Burn.to_data(),
        );
        self.ctx.finish("stop_oracle", plan, Vec::new()).await
    }

    /// Spend the counter and burn its NFT.
    pub async fn stop_counter(&self, admins: &[KeyHash]) -> Result<TxBuildResult, TxError> {
        let (oracle, mut plan) = self.prepare(admins).await?;
        let o = &oracle.datum;
        let scripts = &self.ctx.config.scripts;
        let counter = query::fetch_counter(self.ctx.provider.as_ref(), o, self.ctx.config.network).await?;
        let name = held_token("counter", &counter.utxo, &o.counter.policy_id)?;
        debug!("stopping counter at {}", counter.datum.count);
        plan.read_only(oracle.utxo.clone())
            .spend_script(
                counter.utxo.clone(),
                self.ctx.spend_script("counter", &scripts.counter, &o.counter)?,
                CounterRedeemer::StopCounter.to_data(),
            )
            .mint(
                o.counter.policy_id,
                name,
                -1,
                self.ctx.mint_script("counterNft", &scripts.counter_nft, &o.counter)?,
                MintPolarity::Burn.to_data(),
            );
        self.ctx.finish("stop_counter", plan, Vec::new()).await
    }
}
