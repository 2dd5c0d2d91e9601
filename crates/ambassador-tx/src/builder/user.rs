//! Applicant and member transactions.

use ambassador_datum::hash::output_reference_token_name;
use ambassador_datum::redeemer::{MemberRedeemer, MembershipIntentRedeemer, MintPolarity};
use ambassador_datum::{
    MemberDatum, MemberMetadata, MembershipIntentDatum, PlutusAddress, PlutusCodec, ProposalDatum,
    ProposalMetadata, TokenRef,
};
use ambassador_types::{AssetName, UTxO};

use crate::plan::{OutputDatum, PlannedOutput};
use crate::query::decode_entity;
use crate::TxError;

use super::{held_token, key_signer, member_index, BuilderContext, OutputRole, TxBuildResult};

pub struct UserActionTx {
    ctx: BuilderContext,
}

impl UserActionTx {
    pub fn new(ctx: BuilderContext) -> Self {
        Self { ctx }
    }

    /// Apply for membership. `token_utxo` holds the applicant's proof token
    /// `token`; it is spent and returned through change.
    pub async fn apply_membership(
        &self,
        token_utxo: &UTxO,
        token: TokenRef,
        metadata: MemberMetadata,
    ) -> Result<TxBuildResult, TxError> {
        let token_utxo = self.ctx.current("applicant token UTxO", token_utxo).await?;
        if token_utxo.value()?.get(&token.unit()) == 0 {
            return Err(TxError::Invalid(format!(
                "{} does not hold the proof token {}",
                token_utxo.input,
                token.unit()
            )));
        }
        let oracle = self.ctx.oracle().await?;
        let intent = &oracle.datum.membership_intent;
        let script = self.ctx.mint_script(
            "membershipIntentMint",
            &self.ctx.config.scripts.membership_intent_mint,
            intent,
        )?;

        let mut plan = self.ctx.new_plan(true).await?;
        plan.read_only(oracle.utxo.clone())
            .spend_pubkey(token_utxo)
            .mint(
                intent.policy_id,
                AssetName::empty(),
                1,
                script,
                MintPolarity::Mint.to_data(),
            );
        if let Some(signer) = key_signer(&metadata.wallet_address) {
            plan.require_signers(&[signer]);
        }
        let datum = MembershipIntentDatum { token, metadata };
        let value = self.ctx.entity_value(&intent.policy_id, &AssetName::empty())?;
        let idx = plan.pay(
            PlannedOutput::new(self.ctx.address(&intent.address)?, value)
                .with_datum(OutputDatum::Inline(datum.to_data())),
        );
        self.ctx
            .finish("apply_membership", plan, vec![(OutputRole::MembershipIntent, idx)])
            .await
    }

    /// Replace the metadata of a pending application in place.
    pub async fn update_membership_intent_metadata(
        &self,
        intent_utxo: &UTxO,
        metadata: MemberMetadata,
    ) -> Result<TxBuildResult, TxError> {
        let intent_utxo = self.ctx.current("membership intent", intent_utxo).await?;
        let current = decode_entity::<MembershipIntentDatum>("membership intent", &intent_utxo)?;
        let oracle = self.ctx.oracle().await?;
        let script = self.ctx.spend_script(
            "membershipIntent",
            &self.ctx.config.scripts.membership_intent,
            &oracle.datum.membership_intent,
        )?;

        let mut plan = self.ctx.new_plan(true).await?;
        plan.read_only(oracle.utxo.clone()).spend_script(
            intent_utxo.clone(),
            script,
            MembershipIntentRedeemer::UpdateMetadata.to_data(),
        );
        if let Some(signer) = key_signer(&current.datum.metadata.wallet_address) {
            plan.require_signers(&[signer]);
        }
        let datum = current.datum.with_metadata(metadata);
        let idx = plan.pay(
            PlannedOutput::new(intent_utxo.output.address.clone(), intent_utxo.value()?)
                .with_datum(OutputDatum::Inline(datum.to_data())),
        );
        self.ctx
            .finish(
                "update_membership_intent_metadata",
                plan,
                vec![(OutputRole::MembershipIntent, idx)],
            )
            .await
    }

    /// Replace a member's profile in place.
    pub async fn update_member_metadata(
        &self,
        member_utxo: &UTxO,
        metadata: MemberMetadata,
    ) -> Result<TxBuildResult, TxError> {
        let member_utxo = self.ctx.current("member", member_utxo).await?;
        let current = decode_entity::<MemberDatum>("member", &member_utxo)?;
        let oracle = self.ctx.oracle().await?;
        let script = self
            .ctx
            .spend_script("member", &self.ctx.config.scripts.member, &oracle.datum.member)?;

        let mut plan = self.ctx.new_plan(true).await?;
        plan.read_only(oracle.utxo.clone()).spend_script(
            member_utxo.clone(),
            script,
            MemberRedeemer::MemberUpdateMetadata.to_data(),
        );
        if let Some(signer) = key_signer(&current.datum.metadata.wallet_address) {
            plan.require_signers(&[signer]);
        }
        let datum = current.datum.with_metadata(metadata);
        let idx = plan.pay(
            PlannedOutput::new(member_utxo.output.address.clone(), member_utxo.value()?)
                .with_datum(OutputDatum::Inline(datum.to_data())),
        );
        self.ctx
            .finish("update_member_metadata", plan, vec![(OutputRole::Member, idx)])
            .await
    }

    /// Submit a project proposal. The member UTxO is spent and re-created
    /// with its datum unchanged; the propose-intent token name is derived
    /// from the spent member output reference, so it is unique.
    pub async fn propose_project(
        &self,
        member_utxo: &UTxO,
        fund_requested: u64,
        receiver: PlutusAddress,
        metadata: ProposalMetadata,
    ) -> Result<TxBuildResult, TxError> {
        if fund_requested == 0 {
            return Err(TxError::Invalid("a proposal must request funds".into()));
        }
        let member_utxo = self.ctx.current("member", member_utxo).await?;
        let member = decode_entity::<MemberDatum>("member", &member_utxo)?;
        let oracle = self.ctx.oracle().await?;
        let index = member_index(&held_token("member", &member_utxo, &oracle.datum.member.policy_id)?)?;

        let scripts = &self.ctx.config.scripts;
        let member_script = self.ctx.spend_script("member", &scripts.member, &oracle.datum.member)?;
        let intent = &oracle.datum.propose_intent;
        let mint_script = self
            .ctx
            .mint_script("proposeIntentMint", &scripts.propose_intent_mint, intent)?;
        let name = output_reference_token_name(&member_utxo.input.tx_hash, member_utxo.input.output_index)?
            .parse::<AssetName>()
            .map_err(|e| TxError::Invalid(e.to_string()))?;

        let mut plan = self.ctx.new_plan(true).await?;
        plan.read_only(oracle.utxo.clone())
            .spend_script(
                member_utxo.clone(),
                member_script,
                MemberRedeemer::MemberProposeProject.to_data(),
            )
            .mint(
                intent.policy_id,
                name.clone(),
                1,
                mint_script,
                MintPolarity::Mint.to_data(),
            );
        if let Some(signer) = key_signer(&member.datum.metadata.wallet_address) {
            plan.require_signers(&[signer]);
        }

        let raw = member_utxo
            .inline_datum()
            .map(str::to_string)
            .ok_or_else(|| TxError::missing("member", "no inline datum"))?;
        let member_idx = plan.pay(
            PlannedOutput::new(member_utxo.output.address.clone(), member_utxo.value()?)
                .with_datum(OutputDatum::InlineCbor(raw)),
        );
        let proposal = ProposalDatum {
            fund_requested,
            receiver,
            member: index,
            metadata,
        };
        let intent_idx = plan.pay(
            PlannedOutput::new(
                self.ctx.address(&intent.address)?,
                self.ctx.entity_value(&intent.policy_id, &name)?,
            )
            .with_datum(OutputDatum::Inline(proposal.to_data())),
        );
        self.ctx
            .finish(
                "propose_project",
                plan,
                vec![(OutputRole::Member, member_idx), (OutputRole::ProposeIntent, intent_idx)],
            )
            .await
    }
}
