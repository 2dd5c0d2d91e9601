//! Collaborator interfaces consumed by the builders.
//!
//! All three are object-safe async traits, held as `Arc<dyn _>` so one
//! configured instance is shared by every builder.

use async_trait::async_trait;
use thiserror::Error;

use ambassador_types::UTxO;

use crate::plan::TxPlan;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Response(String),

    /// The ledger rejected a transaction because an input is already spent.
    #[error("inputs already consumed: {0}")]
    InputsConsumed(String),

    #[error("transaction rejected: {0}")]
    Rejected(String),

    #[error("evaluation failed: {0}")]
    Evaluation(String),

    #[error("no collateral")]
    NoCollateral,

    #[error("wallet error: {0}")]
    Wallet(String),
}

/// Chain-query provider.
#[async_trait]
pub trait ChainProvider: Send + Sync {
    /// Outputs of `tx_hash`, or only the one at `output_index` when given.
    /// Spent outputs are not returned.
    async fn fetch_utxos(
        &self,
        tx_hash: &str,
        output_index: Option<u32>,
    ) -> Result<Vec<UTxO>, ProviderError>;

    async fn fetch_address_utxos(&self, address: &str) -> Result<Vec<UTxO>, ProviderError>;

    /// Submit a signed transaction, returning its hash.
    async fn submit_tx(&self, tx_hex: &str) -> Result<String, ProviderError>;

    async fn is_tx_confirmed(&self, tx_hash: &str) -> Result<bool, ProviderError>;
}

/// The connected wallet of the acting user.
#[async_trait]
pub trait Wallet: Send + Sync {
    async fn change_address(&self) -> Result<String, ProviderError>;

    async fn utxos(&self) -> Result<Vec<UTxO>, ProviderError>;

    /// Collateral candidates; empty when the wallet has none set aside.
    async fn collateral(&self) -> Result<Vec<UTxO>, ProviderError>;

    /// Sign `tx_hex`. With `partial`, existing witnesses are kept and the
    /// wallet does not require the transaction to be fully signed.
    async fn sign_tx(&self, tx_hex: &str, partial: bool) -> Result<String, ProviderError>;

    async fn submit_tx(&self, tx_hex: &str) -> Result<String, ProviderError>;
}

/// Turns a plan into a balanced, evaluated, unsigned transaction.
#[async_trait]
pub trait TxCompleter: Send + Sync {
    async fn complete(&self, plan: &TxPlan) -> Result<String, ProviderError>;
}
