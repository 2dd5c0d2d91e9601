//! [`ChainProvider`] backed by the Blockfrost REST API.

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::Value;

use ambassador_tx::{ChainProvider, ProviderError};
use ambassador_types::value::Asset;
use ambassador_types::{TxInRef, TxOutput, UTxO};

use crate::client::{RpcClient, RpcConfig};
use crate::error::RpcError;

/// Page size for paginated listings; Blockfrost's maximum.
pub const PAGE_SIZE: usize = 100;

/// One output of `/txs/{hash}/utxos`.
#[derive(Debug, Deserialize)]
struct TxUtxoOutput {
    address: String,
    amount: Vec<Asset>,
    output_index: u32,
    #[serde(default)]
    data_hash: Option<String>,
    #[serde(default)]
    inline_datum: Option<String>,
    #[serde(default)]
    reference_script_hash: Option<String>,
    #[serde(default)]
    collateral: bool,
    #[serde(default)]
    consumed_by_tx: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TxUtxos {
    hash: String,
    outputs: Vec<TxUtxoOutput>,
}

/// One entry of `/addresses/{address}/utxos`.
#[derive(Debug, Deserialize)]
struct AddressUtxo {
    address: String,
    tx_hash: String,
    output_index: u32,
    amount: Vec<Asset>,
    #[serde(default)]
    data_hash: Option<String>,
    #[serde(default)]
    inline_datum: Option<String>,
    #[serde(default)]
    reference_script_hash: Option<String>,
}

impl From<AddressUtxo> for UTxO {
    fn from(u: AddressUtxo) -> Self {
        UTxO {
            input: TxInRef::new(u.tx_hash, u.output_index),
            output: TxOutput {
                address: u.address,
                amount: u.amount,
                plutus_data: u.inline_datum,
                data_hash: u.data_hash,
                script_hash: u.reference_script_hash,
            },
        }
    }
}

impl TxUtxos {
    /// Unspent, non-collateral outputs, optionally only the one at `index`.
    fn into_unspent(self, index: Option<u32>) -> Vec<UTxO> {
        let hash = self.hash;
        self.outputs
            .into_iter()
            .filter(|o| !o.collateral && o.consumed_by_tx.is_none())
            .filter(|o| index.map_or(true, |i| o.output_index == i))
            .map(|o| UTxO {
                input: TxInRef::new(hash.clone(), o.output_index),
                output: TxOutput {
                    address: o.address,
                    amount: o.amount,
                    plutus_data: o.inline_datum,
                    data_hash: o.data_hash,
                    script_hash: o.reference_script_hash,
                },
            })
            .collect()
    }
}

/// Classify a rejected submission. Ledger rejections naming spent inputs
/// are the recoverable kind.
pub fn classify_submit_error(e: RpcError) -> ProviderError {
    match &e {
        RpcError::HttpStatus { status: 400, body, .. } => {
            let lower = body.to_lowercase();
            if body.contains("BadInputsUTxO") || lower.contains("already spent") {
                ProviderError::InputsConsumed(body.clone())
            } else {
                ProviderError::Rejected(body.clone())
            }
        }
        _ => e.into(),
    }
}

pub struct BlockfrostProvider {
    client: RpcClient,
}

impl BlockfrostProvider {
    pub fn new(url: &str, project_id: &str) -> Result<Self, RpcError> {
        Ok(Self {
            client: RpcClient::new(url, Some(project_id.to_string()))?,
        })
    }

    pub fn with_config(config: RpcConfig) -> Result<Self, RpcError> {
        Ok(Self {
            client: RpcClient::with_config(config)?,
        })
    }

    pub fn client(&self) -> &RpcClient {
        &self.client
    }
}

#[async_trait]
impl ChainProvider for BlockfrostProvider {
    async fn fetch_utxos(
        &self,
        tx_hash: &str,
        output_index: Option<u32>,
    ) -> Result<Vec<UTxO>, ProviderError> {
        let endpoint = format!("/txs/{}/utxos", tx_hash);
        let Some(utxos) = self.client.get_optional::<TxUtxos>(&endpoint).await? else {
            debug!("transaction {} not found", tx_hash);
            return Ok(Vec::new());
        };
        Ok(utxos.into_unspent(output_index))
    }

    async fn fetch_address_utxos(&self, address: &str) -> Result<Vec<UTxO>, ProviderError> {
        let mut out = Vec::new();
        let mut page = 1;
        loop {
            let endpoint = format!("/addresses/{}/utxos?count={}&page={}", address, PAGE_SIZE, page);
            // An address that never received funds is a 404.
            let Some(batch) = self.client.get_optional::<Vec<AddressUtxo>>(&endpoint).await? else {
                break;
            };
            let full = batch.len() == PAGE_SIZE;
            out.extend(batch.into_iter().map(UTxO::from));
            if !full {
                break;
            }
            page += 1;
        }
        debug!("{} utxos at {}", out.len(), address);
        Ok(out)
    }

    async fn submit_tx(&self, tx_hex: &str) -> Result<String, ProviderError> {
        let bytes = hex::decode(tx_hex.trim())
            .map_err(|e| ProviderError::Rejected(format!("transaction is not hex: {}", e)))?;
        let resp = self
            .client
            .post_cbor("/tx/submit", &bytes)
            .await
            .map_err(|e| {
                let e = classify_submit_error(e);
                warn!("submission rejected: {}", e);
                e
            })?;
        match resp {
            Value::String(hash) => {
                info!("submitted {}", hash);
                Ok(hash)
            }
            other => Err(ProviderError::Response(format!(
                "expected a transaction hash, got {}",
                other
            ))),
        }
    }

    async fn is_tx_confirmed(&self, tx_hash: &str) -> Result<bool, ProviderError> {
        let endpoint = format!("/txs/{}", tx_hash);
        Ok(self.client.get_optional::<Value>(&endpoint).await?.is_some())
    }
}
