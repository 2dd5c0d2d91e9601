//! End-to-end builder tests against the in-memory chain.

use std::sync::Arc;

use ambassador_datum::hash::output_reference_token_name;
use ambassador_datum::redeemer::{
    MemberRedeemer, MembershipIntentRedeemer, MintPolarity, OracleRedeemer, ProposeIntentRedeemer,
};
use ambassador_datum::{
    CounterDatum, MemberDatum, MemberMetadata, MembershipIntentDatum, PlutusCodec, PlutusData,
    PlutusDataExt, ProposalDatum, ProposalMetadata, TokenRef,
};
use ambassador_tx::plan::{Certificate, InputWitness, PlannedOutput};
use ambassador_tx::query::fetch_entities;
use ambassador_tx::testing::{Deployment, MockWallet};
use ambassador_tx::{
    find_admins_from_oracle, AdminActionTx, AdminInfo, ChainProvider, OutputRole, SetupTx,
    TxBuildResult, TxError, TxPlan, UserActionTx, Wallet,
};
use ambassador_types::text::string_to_hex;
use ambassador_types::value::token_unit;
use ambassador_types::{AssetName, Credential, Hash28, TxInRef, TxOutput, UTxO, Value};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn name(text: &str) -> AssetName {
    string_to_hex(text).parse().unwrap()
}

fn output(plan: &TxPlan, built: &TxBuildResult, role: OutputRole) -> PlannedOutput {
    plan.outputs[built.index_of(role).unwrap() as usize].clone()
}

fn datum_of<D: PlutusCodec>(out: &PlannedOutput) -> D {
    D::from_cbor_hex(&out.datum.as_ref().unwrap().to_cbor_hex().unwrap()).unwrap()
}

async fn submit(d: &Deployment, signers: &[Arc<MockWallet>], built: &TxBuildResult) -> String {
    let mut tx = built.tx_hex.clone();
    for s in signers {
        tx = s.sign_tx(&tx, true).await.unwrap();
    }
    d.chain.submit_tx(&tx).await.unwrap()
}

async fn created(d: &Deployment, built: &TxBuildResult, role: OutputRole) -> UTxO {
    let idx = built.index_of(role).unwrap();
    d.chain
        .fetch_utxos(&built.tx_hash, Some(idx))
        .await
        .unwrap()
        .remove(0)
}

/// Applicant wallet holding a proof token, plus the token reference.
fn applicant(d: &Deployment, seed: u8) -> (Arc<MockWallet>, UTxO, TokenRef) {
    let user = d.user(seed);
    let token = TokenRef::new(Hash28([0x77; 28]), name("pass"));
    let mut value = Value::from_lovelace(3_000_000);
    value.add_unit(&token.unit(), 1).unwrap();
    let proof = d.chain.place(user.address(), &value, None);
    (user, proof, token)
}

fn placed_member(d: &Deployment, index: u64, wallet: &MockWallet) -> UTxO {
    let member = MemberDatum {
        token: TokenRef::new(Hash28([0x77; 28]), name("pass")),
        completion: Vec::new(),
        fund_received: 0,
        metadata: MemberMetadata::new(wallet.plutus_address()),
    };
    d.place_entity(&d.oracle.member, &name(&index.to_string()), &member.to_data())
}

/// A plain wallet output at a fixed reference, standing in for a setup UTxO.
fn place_setup_utxo(d: &Deployment, input: &TxInRef, owner: &MockWallet) {
    d.chain.insert(UTxO {
        input: input.clone(),
        output: TxOutput {
            address: owner.address().to_string(),
            amount: Value::from_lovelace(10_000_000).to_assets(),
            plutus_data: None,
            data_hash: None,
            script_hash: None,
        },
    });
}

/// Redeemer the plan attaches to spending `input`.
fn spend_redeemer(plan: &TxPlan, input: &TxInRef) -> PlutusData {
    let planned = plan.inputs.iter().find(|i| &i.utxo.input == input).unwrap();
    match &planned.witness {
        InputWitness::Script { redeemer, .. } => redeemer.clone(),
        InputWitness::PubKey => panic!("{} is spent without a script", input),
    }
}

fn proposal(receiver: &MockWallet, member: u64, amount: u64) -> ProposalDatum {
    ProposalDatum {
        fund_requested: amount,
        receiver: receiver.plutus_address(),
        member,
        metadata: ProposalMetadata {
            title: "Workshop series".into(),
            ..ProposalMetadata::default()
        },
    }
}

#[tokio::test]
async fn test_apply_then_approve_member_increments_counter() {
    init_logger();
    let d = Deployment::new(3, 2, 5);
    let (user, proof, token) = applicant(&d, 42);

    let applied = UserActionTx::new(d.context(user.clone()))
        .apply_membership(&proof, token.clone(), MemberMetadata::new(user.plutus_address()))
        .await
        .unwrap();
    let plan = d.completer.last_plan().unwrap();
    assert!(plan.reference_inputs.iter().any(|u| u.input == d.oracle_utxo.input));
    assert_eq!(plan.required_signers, vec![user.key_hash()]);
    submit(&d, &[user.clone()], &applied).await;
    let intent_utxo = created(&d, &applied, OutputRole::MembershipIntent).await;

    let admins = d.admin_hashes();
    let approved = AdminActionTx::new(d.context(d.admins[0].clone()))
        .approve_member(&intent_utxo, &admins[..2])
        .await
        .unwrap();
    let plan = d.completer.last_plan().unwrap();

    let counter: CounterDatum = datum_of(&output(&plan, &approved, OutputRole::Counter));
    assert_eq!(counter.count, 6);

    let member_out = output(&plan, &approved, OutputRole::Member);
    let member_unit = token_unit(&d.oracle.member.policy_id, &name("5"));
    assert_eq!(member_out.value.get(&member_unit), 1);
    let member: MemberDatum = datum_of(&member_out);
    assert_eq!(member.token, token);
    assert_eq!(member.fund_received, 0);

    let burn = plan
        .mints
        .iter()
        .find(|m| m.policy_id == d.oracle.membership_intent.policy_id)
        .unwrap();
    assert_eq!(burn.quantity, -1);
    assert_eq!(burn.asset_name, AssetName::empty());
    assert_eq!(plan.required_signers, admins[..2].to_vec());

    submit(&d, &d.admins[..2], &approved).await;
    assert!(!d.chain.is_unspent(&d.counter_utxo.input));
    assert!(!d.chain.is_unspent(&intent_utxo.input));
}

#[tokio::test]
async fn test_proposal_token_name_survives_each_approval() {
    init_logger();
    let d = Deployment::new(3, 2, 0);
    let user = d.user(42);
    let member_utxo = placed_member(&d, 0, &user);

    let proposed = UserActionTx::new(d.context(user.clone()))
        .propose_project(
            &member_utxo,
            10_000_000,
            user.plutus_address(),
            ProposalMetadata::default(),
        )
        .await
        .unwrap();
    let plan = d.completer.last_plan().unwrap();
    let expected: AssetName = output_reference_token_name(
        &member_utxo.input.tx_hash,
        member_utxo.input.output_index,
    )
    .unwrap()
    .parse()
    .unwrap();
    assert_eq!(plan.mints[0].asset_name, expected);
    // The member re-output keeps its datum bytes.
    assert_eq!(
        output(&plan, &proposed, OutputRole::Member)
            .datum
            .unwrap()
            .to_cbor_hex().unwrap(),
        member_utxo.inline_datum().unwrap()
    );
    submit(&d, &[user.clone()], &proposed).await;
    let intent_utxo = created(&d, &proposed, OutputRole::ProposeIntent).await;

    let admin_tx = AdminActionTx::new(d.context(d.admins[1].clone()));
    let admins = d.admin_hashes();
    let approved = admin_tx.approve_proposal(&intent_utxo, &admins[1..]).await.unwrap();
    let plan = d.completer.last_plan().unwrap();
    let minted: Vec<_> = plan.mints.iter().map(|m| (m.policy_id, m.asset_name.clone(), m.quantity)).collect();
    assert!(minted.contains(&(d.oracle.propose_intent.policy_id, expected.clone(), -1)));
    assert!(minted.contains(&(d.oracle.proposal.policy_id, expected.clone(), 1)));
    let proposal_out = output(&plan, &approved, OutputRole::Proposal);
    assert_eq!(proposal_out.address, d.bech32(&d.oracle.proposal.address));
    assert_eq!(
        proposal_out.datum.unwrap().to_cbor_hex().unwrap(),
        intent_utxo.inline_datum().unwrap()
    );
    submit(&d, &d.admins[1..], &approved).await;
    let proposal_utxo = created(&d, &approved, OutputRole::Proposal).await;

    let signed_off = admin_tx.approve_sign_off(&proposal_utxo, &admins[1..]).await.unwrap();
    let plan = d.completer.last_plan().unwrap();
    let out = output(&plan, &signed_off, OutputRole::SignOffApproval);
    assert_eq!(
        out.value.get(&token_unit(&d.oracle.sign_off_approval.policy_id, &expected)),
        1
    );
    assert_eq!(
        out.value.get(&token_unit(&d.oracle.proposal.policy_id, &expected)),
        0
    );
}

#[tokio::test]
async fn test_sign_off_conserves_treasury_value() {
    init_logger();
    let d = Deployment::new(3, 2, 4);
    let receiver = d.user(50);
    let member_utxo = placed_member(&d, 3, &receiver);
    let token = name("proposal-1");
    let sign_off_utxo = d.place_entity(
        &d.oracle.sign_off_approval,
        &token,
        &proposal(&receiver, 3, 10_000_000).to_data(),
    );
    let treasury = d.fund_treasury(&[6_000_000, 8_000_000, 3_000_000]);

    let admins = d.admin_hashes();
    let built = AdminActionTx::new(d.context(d.admins[0].clone()))
        .sign_off(&sign_off_utxo, &member_utxo, &admins[..2])
        .await
        .unwrap();
    let plan = d.completer.last_plan().unwrap();

    let treasury_address = d.bech32(&d.oracle.treasury_address);
    let spent: u64 = plan
        .inputs
        .iter()
        .filter(|i| i.utxo.output.address == treasury_address)
        .map(|i| i.utxo.lovelace())
        .sum();
    assert!(spent >= 12_000_000);
    let payout = output(&plan, &built, OutputRole::TreasuryPayout);
    assert_eq!(payout.value, Value::from_lovelace(10_000_000));
    assert_eq!(payout.address, receiver.address());
    let change = output(&plan, &built, OutputRole::TreasuryChange);
    assert_eq!(change.address, treasury_address);
    assert_eq!(change.value.lovelace(), spent - 10_000_000);
    assert_eq!(change.datum.unwrap().to_cbor_hex().unwrap(), PlutusData::unit(0).to_cbor_hex().unwrap());

    let member: MemberDatum = datum_of(&output(&plan, &built, OutputRole::Member));
    assert_eq!(member.fund_received, 10_000_000);
    assert_eq!(member.completion.len(), 1);

    assert_eq!(plan.withdrawals.len(), 1);
    assert_eq!(plan.withdrawals[0].amount, 0);
    assert_eq!(
        plan.withdrawals[0].reward_address,
        d.config.treasury_withdrawal_reward_address().unwrap()
    );
    assert!(plan
        .mints
        .iter()
        .any(|m| m.policy_id == d.oracle.sign_off_approval.policy_id && m.quantity == -1));
    for input in plan
        .inputs
        .iter()
        .filter(|i| treasury.iter().any(|t| t.input == i.utxo.input))
    {
        assert!(matches!(input.witness, InputWitness::Script { .. }));
    }
}

#[tokio::test]
async fn test_sign_off_insufficient_treasury_builds_nothing() {
    let d = Deployment::new(1, 1, 1);
    let receiver = d.user(50);
    let member_utxo = placed_member(&d, 0, &receiver);
    let sign_off_utxo = d.place_entity(
        &d.oracle.sign_off_approval,
        &name("p"),
        &proposal(&receiver, 0, 10_000_000).to_data(),
    );
    d.fund_treasury(&[3_000_000]);

    let err = AdminActionTx::new(d.context(d.admins[0].clone()))
        .sign_off(&sign_off_utxo, &member_utxo, &d.admin_hashes())
        .await
        .unwrap_err();
    assert!(matches!(err, TxError::InsufficientFunds { need: 10_000_000, have: 3_000_000, .. }));
    assert_eq!(d.completer.plan_count(), 0);
}

#[tokio::test]
async fn test_sign_off_rejects_wrong_member() {
    let d = Deployment::new(1, 1, 3);
    let receiver = d.user(50);
    let member_utxo = placed_member(&d, 1, &receiver);
    let sign_off_utxo = d.place_entity(
        &d.oracle.sign_off_approval,
        &name("p"),
        &proposal(&receiver, 2, 1_000_000).to_data(),
    );
    d.fund_treasury(&[30_000_000]);
    let err = AdminActionTx::new(d.context(d.admins[0].clone()))
        .sign_off(&sign_off_utxo, &member_utxo, &d.admin_hashes())
        .await
        .unwrap_err();
    assert!(matches!(err, TxError::Invalid(_)));
}

#[tokio::test]
async fn test_no_collateral() {
    let d = Deployment::new(1, 1, 0);
    let (user, proof, token) = applicant(&d, 42);
    let bare = Arc::new(MockWallet::new(42, d.config.network, d.chain.clone()).without_collateral());
    assert_eq!(bare.address(), user.address());
    let err = UserActionTx::new(d.context(bare))
        .apply_membership(&proof, token, MemberMetadata::new(user.plutus_address()))
        .await
        .unwrap_err();
    assert!(matches!(err, TxError::NoCollateral));
}

#[tokio::test]
async fn test_spent_input_is_missing() {
    let d = Deployment::new(1, 1, 0);
    let user = d.user(42);
    let intent = MembershipIntentDatum {
        token: TokenRef::new(Hash28([0x77; 28]), name("pass")),
        metadata: MemberMetadata::new(user.plutus_address()),
    };
    let intent_utxo = d.place_entity(&d.oracle.membership_intent, &AssetName::empty(), &intent.to_data());
    assert!(d.chain.spend(&intent_utxo.input));

    let err = AdminActionTx::new(d.context(d.admins[0].clone()))
        .reject_member(&intent_utxo, &d.admin_hashes())
        .await
        .unwrap_err();
    assert!(matches!(err, TxError::MissingInput { what: "membership intent", .. }));
}

#[tokio::test]
async fn test_concurrent_builds_one_wins() {
    let d = Deployment::new(2, 1, 0);
    let user = d.user(42);
    let admins = d.admin_hashes();
    let place_intent = || {
        let intent = MembershipIntentDatum {
            token: TokenRef::new(Hash28([0x77; 28]), name("pass")),
            metadata: MemberMetadata::new(user.plutus_address()),
        };
        d.place_entity(&d.oracle.membership_intent, &AssetName::empty(), &intent.to_data())
    };
    let first_intent = place_intent();
    let second_intent = place_intent();

    let first = AdminActionTx::new(d.context(d.admins[0].clone()))
        .approve_member(&first_intent, &admins[..1])
        .await
        .unwrap();
    let second = AdminActionTx::new(d.context(d.admins[1].clone()))
        .approve_member(&second_intent, &admins[1..])
        .await
        .unwrap();
    submit(&d, &d.admins[..1], &first).await;

    let signed = d.admins[1].sign_tx(&second.tx_hex, true).await.unwrap();
    let err: TxError = d.chain.submit_tx(&signed).await.unwrap_err().into();
    assert!(matches!(err, TxError::InputConsumed(_)));
    assert!(err.is_recoverable());
}

#[tokio::test]
async fn test_admin_selection_checked() {
    let d = Deployment::new(3, 2, 0);
    let tx = AdminActionTx::new(d.context(d.admins[0].clone()));
    let admins = d.admin_hashes();

    let err = tx.stop_counter(&admins[..1]).await.unwrap_err();
    assert!(matches!(err, TxError::Invalid(_)));
    // A duplicate does not count twice.
    let err = tx.stop_counter(&[admins[0], admins[0]]).await.unwrap_err();
    assert!(matches!(err, TxError::Invalid(_)));
    let err = tx.stop_counter(&[admins[0], Hash28([9; 28])]).await.unwrap_err();
    assert!(matches!(err, TxError::Invalid(_)));
    assert!(tx.stop_counter(&admins[1..]).await.is_ok());
}

#[tokio::test]
async fn test_rotate_admin_and_threshold() {
    let d = Deployment::new(3, 2, 0);
    let tx = AdminActionTx::new(d.context(d.admins[0].clone()));
    let admins = d.admin_hashes();

    let built = tx
        .rotate_admin(vec![admins[0], Hash28([5; 28])], "2027".into(), &admins[..2])
        .await
        .unwrap();
    let plan = d.completer.last_plan().unwrap();
    let oracle: ambassador_datum::OracleDatum = datum_of(&output(&plan, &built, OutputRole::Oracle));
    assert_eq!(oracle.admins, vec![admins[0], Hash28([5; 28])]);
    assert_eq!(oracle.admin_tenure, "2027");
    assert_eq!(oracle.multi_sig_threshold, 2);
    assert!(plan.reference_inputs.is_empty());

    assert!(tx.rotate_admin(vec![admins[0]], "x".into(), &admins[..2]).await.is_err());
    assert!(tx.update_threshold(4, &admins[..2]).await.is_err());
    let built = tx.update_threshold(3, &admins[..2]).await.unwrap();
    let plan = d.completer.last_plan().unwrap();
    let oracle: ambassador_datum::OracleDatum = datum_of(&output(&plan, &built, OutputRole::Oracle));
    assert_eq!(oracle.multi_sig_threshold, 3);
}

#[tokio::test]
async fn test_setup_mints_oracle_from_setup_utxo() {
    let d = Deployment::new(2, 1, 0);
    let admin = d.admins[0].clone();
    place_setup_utxo(&d, &d.config.setup_utxo, &admin);

    let setup_tx = SetupTx::new(d.context(admin.clone()));
    let built = setup_tx.mint_spend_oracle_nft(&d.oracle).await.unwrap();
    let plan = d.completer.last_plan().unwrap();
    assert_eq!(plan.inputs[0].utxo.input, d.config.setup_utxo);
    let oracle_out = output(&plan, &built, OutputRole::Oracle);
    assert_eq!(oracle_out.address, d.config.oracle_address);
    assert_eq!(oracle_out.datum.unwrap().to_cbor_hex().unwrap(), d.oracle.to_cbor_hex().unwrap());

    let mut bad = d.oracle.clone();
    bad.multi_sig_threshold = 3;
    assert!(matches!(
        setup_tx.mint_spend_oracle_nft(&bad).await,
        Err(TxError::Invalid(_))
    ));

    let deposit = setup_tx
        .deposit_to_treasury(&Value::from_lovelace(25_000_000))
        .await
        .unwrap();
    let plan = d.completer.last_plan().unwrap();
    let out = output(&plan, &deposit, OutputRole::Treasury);
    assert_eq!(out.address, d.bech32(&d.oracle.treasury_address));
    assert!(out.datum.is_some());
    assert!(plan.collateral.is_none());
}

#[tokio::test]
async fn test_counter_mint_refused_while_counter_is_live() {
    let d = Deployment::new(2, 2, 7);
    let setup_tx = SetupTx::new(d.context(d.admins[0].clone()));
    let err = setup_tx.mint_counter_nft(&d.admin_hashes()).await.unwrap_err();
    assert!(matches!(err, TxError::Invalid(_)));
    assert_eq!(d.completer.plan_count(), 0);
    assert!(d.chain.is_unspent(&d.counter_utxo.input));
}

#[tokio::test]
async fn test_counter_mint_after_stop_spends_setup_utxo() {
    init_logger();
    let d = Deployment::new(2, 2, 7);
    let admins = d.admin_hashes();
    let stopped = AdminActionTx::new(d.context(d.admins[0].clone()))
        .stop_counter(&admins)
        .await
        .unwrap();
    submit(&d, &d.admins, &stopped).await;
    assert!(!d.chain.is_unspent(&d.counter_utxo.input));

    let setup_tx = SetupTx::new(d.context(d.admins[0].clone()));
    // The one-shot input has to exist before the counter can be minted.
    let err = setup_tx.mint_counter_nft(&admins).await.unwrap_err();
    assert!(matches!(err, TxError::MissingInput { what: "counter setup UTxO", .. }));

    let counter_setup = d.config.counter_setup_utxo.clone().unwrap();
    place_setup_utxo(&d, &counter_setup, &d.admins[0]);
    let built = setup_tx.mint_counter_nft(&admins).await.unwrap();
    let plan = d.completer.last_plan().unwrap();
    assert_eq!(plan.inputs[0].utxo.input, counter_setup);
    assert!(plan.reference_inputs.iter().any(|u| u.input == d.oracle_utxo.input));
    assert_eq!(plan.mints.len(), 1);
    assert_eq!(plan.mints[0].policy_id, d.oracle.counter.policy_id);
    assert_eq!(plan.mints[0].quantity, 1);
    let counter: CounterDatum = datum_of(&output(&plan, &built, OutputRole::Counter));
    assert_eq!(counter, CounterDatum::new(0));
    submit(&d, &d.admins, &built).await;

    // The new counter is live again, so a second mint is refused.
    let err = setup_tx.mint_counter_nft(&admins).await.unwrap_err();
    assert!(matches!(err, TxError::Invalid(_)));
}

#[tokio::test]
async fn test_remove_member_burns_token() {
    let d = Deployment::new(3, 2, 1);
    let user = d.user(42);
    let member_utxo = placed_member(&d, 0, &user);
    let admins = d.admin_hashes();

    let built = AdminActionTx::new(d.context(d.admins[0].clone()))
        .remove_member(&member_utxo, &admins[..2])
        .await
        .unwrap();
    let plan = d.completer.last_plan().unwrap();
    assert_eq!(
        spend_redeemer(&plan, &member_utxo.input),
        MemberRedeemer::AdminRemoveMember.to_data()
    );
    assert_eq!(plan.mints.len(), 1);
    let burn = &plan.mints[0];
    assert_eq!((burn.policy_id, &burn.asset_name, burn.quantity), (d.oracle.member.policy_id, &name("0"), -1));
    assert_eq!(burn.redeemer, MintPolarity::Burn.to_data());
    let member_address = d.bech32(&d.oracle.member.address);
    assert!(plan.outputs.iter().all(|o| o.address != member_address));
    assert!(built.outputs.is_empty());
    assert_eq!(plan.required_signers, admins[..2].to_vec());

    submit(&d, &d.admins[..2], &built).await;
    assert!(!d.chain.is_unspent(&member_utxo.input));
}

#[tokio::test]
async fn test_reject_proposal_burns_intent() {
    let d = Deployment::new(1, 1, 1);
    let user = d.user(42);
    let token = name("intent-1");
    let intent_utxo = d.place_entity(
        &d.oracle.propose_intent,
        &token,
        &proposal(&user, 0, 5_000_000).to_data(),
    );

    let built = AdminActionTx::new(d.context(d.admins[0].clone()))
        .reject_proposal(&intent_utxo, &d.admin_hashes())
        .await
        .unwrap();
    let plan = d.completer.last_plan().unwrap();
    assert_eq!(
        spend_redeemer(&plan, &intent_utxo.input),
        ProposeIntentRedeemer::RejectProposal.to_data()
    );
    let minted: Vec<_> = plan.mints.iter().map(|m| (m.policy_id, m.asset_name.clone(), m.quantity)).collect();
    assert_eq!(minted, vec![(d.oracle.propose_intent.policy_id, token, -1)]);
    let intent_address = d.bech32(&d.oracle.propose_intent.address);
    let proposal_address = d.bech32(&d.oracle.proposal.address);
    assert!(plan
        .outputs
        .iter()
        .all(|o| o.address != intent_address && o.address != proposal_address));
    submit(&d, &d.admins, &built).await;
    assert!(!d.chain.is_unspent(&intent_utxo.input));
}

#[tokio::test]
async fn test_stop_oracle_burns_nft() {
    let d = Deployment::new(3, 2, 0);
    let admins = d.admin_hashes();
    assert_eq!(
        find_admins_from_oracle(d.chain.as_ref(), &d.config).await.unwrap(),
        AdminInfo {
            admin_pub_key_hashes: admins.clone(),
            min_signers: 2,
        }
    );

    let built = AdminActionTx::new(d.context(d.admins[1].clone()))
        .stop_oracle(&admins[1..])
        .await
        .unwrap();
    let plan = d.completer.last_plan().unwrap();
    assert_eq!(
        spend_redeemer(&plan, &d.oracle_utxo.input),
        OracleRedeemer::StopOracle.to_data()
    );
    assert_eq!(plan.mints.len(), 1);
    let burn = &plan.mints[0];
    assert_eq!(burn.policy_id, d.config.oracle_policy_id);
    assert_eq!(burn.asset_name, AssetName::empty());
    assert_eq!(burn.quantity, -1);
    assert!(plan.outputs.iter().all(|o| o.address != d.config.oracle_address));
    assert!(plan.reference_inputs.is_empty());

    submit(&d, &d.admins[1..], &built).await;
    let err = find_admins_from_oracle(d.chain.as_ref(), &d.config).await.unwrap_err();
    assert!(matches!(err, TxError::MissingInput { what: "oracle", .. }));
}

#[tokio::test]
async fn test_update_member_metadata_in_place() {
    let d = Deployment::new(1, 1, 1);
    let user = d.user(42);
    let member_utxo = placed_member(&d, 0, &user);
    let before: MemberDatum = MemberDatum::from_cbor_hex(member_utxo.inline_datum().unwrap()).unwrap();

    let metadata = MemberMetadata {
        display_name: "ada".into(),
        bio: "Runs the Lisbon meetup. ".repeat(5),
        ..MemberMetadata::new(user.plutus_address())
    };
    let built = UserActionTx::new(d.context(user.clone()))
        .update_member_metadata(&member_utxo, metadata.clone())
        .await
        .unwrap();
    let plan = d.completer.last_plan().unwrap();
    assert!(plan.mints.is_empty());
    assert_eq!(plan.required_signers, vec![user.key_hash()]);
    assert_eq!(
        spend_redeemer(&plan, &member_utxo.input),
        MemberRedeemer::MemberUpdateMetadata.to_data()
    );
    let out = output(&plan, &built, OutputRole::Member);
    assert_eq!(out.address, member_utxo.output.address);
    assert_eq!(out.value, member_utxo.value().unwrap());
    let after: MemberDatum = datum_of(&out);
    assert_eq!(after.metadata, metadata);
    assert_eq!(after.token, before.token);
    assert_eq!(after.fund_received, before.fund_received);
    assert_eq!(after.completion, before.completion);
}

#[tokio::test]
async fn test_update_membership_intent_metadata_in_place() {
    let d = Deployment::new(1, 1, 0);
    let user = d.user(42);
    let intent = MembershipIntentDatum {
        token: TokenRef::new(Hash28([0x77; 28]), name("pass")),
        metadata: MemberMetadata::new(user.plutus_address()),
    };
    let intent_utxo = d.place_entity(&d.oracle.membership_intent, &AssetName::empty(), &intent.to_data());

    let metadata = MemberMetadata {
        full_name: "Grace Hopper".into(),
        country: "US".into(),
        ..MemberMetadata::new(user.plutus_address())
    };
    let built = UserActionTx::new(d.context(user.clone()))
        .update_membership_intent_metadata(&intent_utxo, metadata.clone())
        .await
        .unwrap();
    let plan = d.completer.last_plan().unwrap();
    assert!(plan.mints.is_empty());
    assert_eq!(
        spend_redeemer(&plan, &intent_utxo.input),
        MembershipIntentRedeemer::UpdateMetadata.to_data()
    );
    let out = output(&plan, &built, OutputRole::MembershipIntent);
    assert_eq!(out.address, intent_utxo.output.address);
    assert_eq!(out.value, intent_utxo.value().unwrap());
    let after: MembershipIntentDatum = datum_of(&out);
    assert_eq!(after.token, intent.token);
    assert_eq!(after.metadata, metadata);

    submit(&d, &[user.clone()], &built).await;
    assert!(!d.chain.is_unspent(&intent_utxo.input));
    let moved = created(&d, &built, OutputRole::MembershipIntent).await;
    assert_eq!(moved.output.address, intent_utxo.output.address);
}

#[tokio::test]
async fn test_publish_reference_script() {
    let d = Deployment::new(1, 1, 0);
    let user = d.user(42);
    let setup_tx = SetupTx::new(d.context(user.clone()));

    let err = setup_tx
        .publish_reference_script("member", &d.config.scripts.member)
        .await
        .unwrap_err();
    assert!(matches!(err, TxError::Config(_)));

    let mut script = d.config.scripts.member.clone();
    script.cbor = Some("4e4d01000033222220051200120011".into());
    let built = setup_tx.publish_reference_script("member", &script).await.unwrap();
    let plan = d.completer.last_plan().unwrap();
    let out = output(&plan, &built, OutputRole::ReferenceScript);
    assert_eq!(out.address, user.address());
    assert_eq!(out.reference_script.as_deref(), Some("4e4d01000033222220051200120011"));
    assert!(out.datum.is_none());
    assert!(plan.collateral.is_none());
    assert!(plan.required_signers.is_empty());
}

#[tokio::test]
async fn test_register_treasury_withdrawal() {
    let d = Deployment::new(1, 1, 0);
    let built = SetupTx::new(d.context(d.admins[0].clone()))
        .register_treasury_withdrawal()
        .await
        .unwrap();
    let plan = d.completer.last_plan().unwrap();
    assert_eq!(
        plan.certificates,
        vec![Certificate::StakeRegistration(Credential::Script(
            d.config.scripts.treasury_withdrawal.hash.0
        ))]
    );
    assert!(plan.outputs.is_empty());
    assert!(built.outputs.is_empty());
    assert!(plan.collateral.is_none());
}

#[tokio::test]
async fn test_fetch_entities_skips_malformed() {
    let d = Deployment::new(1, 1, 2);
    let user = d.user(42);
    let good_a = placed_member(&d, 0, &user);
    let good_b = placed_member(&d, 1, &user);
    // Holds a member token but the datum is not a member.
    let bad = d.place_entity(&d.oracle.member, &name("9"), &PlutusData::int(7));
    // Holds a member token without any datum.
    let mut value = Value::from_lovelace(2_000_000);
    value
        .add_unit(&token_unit(&d.oracle.member.policy_id, &name("8")), 1)
        .unwrap();
    let bare = d.chain.place(&d.bech32(&d.oracle.member.address), &value, None);
    // At the member address without a member token.
    d.chain.place(
        &d.bech32(&d.oracle.member.address),
        &Value::from_lovelace(2_000_000),
        Some(&PlutusData::unit(0)),
    );

    let members = fetch_entities::<MemberDatum>(d.chain.as_ref(), &d.oracle.member, d.config.network)
        .await
        .unwrap();
    let inputs: Vec<_> = members.iter().map(|m| m.utxo.input.clone()).collect();
    assert_eq!(inputs.len(), 2);
    assert!(inputs.contains(&good_a.input));
    assert!(inputs.contains(&good_b.input));
    assert!(!inputs.contains(&bad.input));
    assert!(!inputs.contains(&bare.input));
    assert!(members.iter().all(|m| m.datum.metadata.wallet_address == user.plutus_address()));
}
