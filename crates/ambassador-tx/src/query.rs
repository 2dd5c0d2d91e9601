//! Reading entity state from the chain.
//!
//! The oracle is located through configuration; everything else is found
//! at the addresses and policies recorded in the oracle datum. Listing
//! functions decode each UTxO independently and skip the ones that fail,
//! so one malformed datum never hides the rest.

use log::{debug, warn};

use ambassador_datum::oracle::EntityScript;
use ambassador_datum::{CounterDatum, OracleDatum, PlutusCodec};
use ambassador_types::{KeyHash, Network, TxInRef, UTxO, Value};

use crate::config::AppConfig;
use crate::provider::ChainProvider;
use crate::selection::total_balance;
use crate::TxError;

/// A UTxO together with its decoded datum.
#[derive(Debug, Clone)]
pub struct Entity<D> {
    pub utxo: UTxO,
    pub datum: D,
}

pub type OracleState = Entity<OracleDatum>;

/// Admin set and quorum as recorded in the oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminInfo {
    pub admin_pub_key_hashes: Vec<KeyHash>,
    pub min_signers: u64,
}

/// Decode the inline datum of `utxo`.
pub fn decode_entity<D: PlutusCodec>(what: &'static str, utxo: &UTxO) -> Result<Entity<D>, TxError> {
    let cbor = utxo
        .inline_datum()
        .ok_or_else(|| TxError::missing(what, format!("{} has no inline datum", utxo.input)))?;
    Ok(Entity {
        utxo: utxo.clone(),
        datum: D::from_cbor_hex(cbor)?,
    })
}

/// Every UTxO at `address` carrying a token of `policy_id`.
pub async fn fetch_holding(
    provider: &dyn ChainProvider,
    address: &str,
    policy_id: &KeyHash,
) -> Result<Vec<UTxO>, TxError> {
    let policy = policy_id.to_hex();
    Ok(provider
        .fetch_address_utxos(address)
        .await?
        .into_iter()
        .filter(|u| u.holds_policy(&policy))
        .collect())
}

/// The single UTxO at `address` carrying a token of `policy_id`.
pub async fn fetch_unique(
    provider: &dyn ChainProvider,
    what: &'static str,
    address: &str,
    policy_id: &KeyHash,
) -> Result<UTxO, TxError> {
    let mut found = fetch_holding(provider, address, policy_id).await?.into_iter();
    let first = found
        .next()
        .ok_or_else(|| TxError::missing(what, format!("no {} NFT at {}", policy_id, address)))?;
    if found.next().is_some() {
        warn!("more than one {} UTxO holds {}; using {}", what, policy_id, first.input);
    }
    Ok(first)
}

/// Re-read a UTxO the caller holds, failing if it has been spent.
pub async fn fetch_input(
    provider: &dyn ChainProvider,
    what: &'static str,
    input: &TxInRef,
) -> Result<UTxO, TxError> {
    provider
        .fetch_utxos(&input.tx_hash, Some(input.output_index))
        .await?
        .into_iter()
        .find(|u| &u.input == input)
        .ok_or_else(|| TxError::missing(what, format!("{} is not unspent", input)))
}

pub async fn fetch_oracle(provider: &dyn ChainProvider, config: &AppConfig) -> Result<OracleState, TxError> {
    let utxo = fetch_unique(provider, "oracle", &config.oracle_address, &config.oracle_policy_id).await?;
    let oracle = decode_entity("oracle", &utxo)?;
    debug!("oracle at {}", oracle.utxo.input);
    Ok(oracle)
}

/// Admin public-key hashes and the multisig threshold.
pub async fn find_admins_from_oracle(
    provider: &dyn ChainProvider,
    config: &AppConfig,
) -> Result<AdminInfo, TxError> {
    let oracle = fetch_oracle(provider, config).await?;
    Ok(AdminInfo {
        admin_pub_key_hashes: oracle.datum.admins,
        min_signers: oracle.datum.multi_sig_threshold,
    })
}

pub async fn fetch_counter(
    provider: &dyn ChainProvider,
    oracle: &OracleDatum,
    network: Network,
) -> Result<Entity<CounterDatum>, TxError> {
    let address = oracle.counter.address.to_bech32(network)?;
    let utxo = fetch_unique(provider, "counter", &address, &oracle.counter.policy_id).await?;
    decode_entity("counter", &utxo)
}

/// Every UTxO at an entity's address holding its token, decoded.
pub async fn fetch_entities<D: PlutusCodec>(
    provider: &dyn ChainProvider,
    entity: &EntityScript,
    network: Network,
) -> Result<Vec<Entity<D>>, TxError> {
    let address = entity.address.to_bech32(network)?;
    let utxos = fetch_holding(provider, &address, &entity.policy_id).await?;
    let mut out = Vec::with_capacity(utxos.len());
    for utxo in &utxos {
        match decode_entity::<D>("entity", utxo) {
            Ok(e) => out.push(e),
            Err(e) => warn!("skipping {}: {}", utxo.input, e),
        }
    }
    Ok(out)
}

/// Spendable treasury UTxOs and their total value.
///
/// Outputs sent to the treasury without an inline datum cannot be spent by
/// the treasury validator and are left out.
pub async fn fetch_treasury(
    provider: &dyn ChainProvider,
    oracle: &OracleDatum,
    network: Network,
) -> Result<(Vec<UTxO>, Value), TxError> {
    let address = oracle.treasury_address.to_bech32(network)?;
    let (utxos, stranded): (Vec<UTxO>, Vec<UTxO>) = provider
        .fetch_address_utxos(&address)
        .await?
        .into_iter()
        .partition(|u| u.inline_datum().is_some());
    for u in &stranded {
        warn!("treasury UTxO {} has no inline datum and cannot be spent", u.input);
    }
    let balance = total_balance(&utxos)?;
    Ok((utxos, balance))
}
