//! Transaction construction for the ambassador program.
//!
//! Builders read entity state through the chain provider, compute new
//! datums through `ambassador-datum`, and describe each transaction as a
//! [`TxPlan`]. A [`TxCompleter`] turns the plan into an unsigned
//! transaction (fee and change balancing, execution-unit evaluation).
//! Nothing here signs or submits; see `ambassador-multisig` for that.

pub mod builder;
pub mod config;
pub mod confirm;
pub mod envelope;
pub mod plan;
pub mod provider;
pub mod query;
pub mod selection;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use builder::{AdminActionTx, BuilderContext, OutputRole, SetupTx, TxBuildResult, UserActionTx};
pub use config::{AppConfig, PollConfig, ScriptInfo, ScriptRegistry};
pub use confirm::{await_confirmation, Confirmation};
pub use plan::{OutputDatum, PlannedInput, PlannedMint, PlannedOutput, ScriptSource, TxPlan};
pub use provider::{ChainProvider, ProviderError, TxCompleter, Wallet};
pub use query::{find_admins_from_oracle, AdminInfo, Entity, OracleState};
pub use selection::{select_for_withdrawal, Selection};

use ambassador_datum::DatumError;
use ambassador_types::address::AddressError;
use ambassador_types::ValueError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TxError {
    #[error("missing input: {what} ({detail})")]
    MissingInput { what: &'static str, detail: String },

    #[error("no collateral available in wallet")]
    NoCollateral,

    #[error("insufficient funds for {unit}: need {need}, have {have}")]
    InsufficientFunds { unit: String, need: u64, have: u64 },

    #[error("input already consumed: {0}")]
    InputConsumed(String),

    #[error("datum error: {0}")]
    Datum(#[from] DatumError),

    #[error("value error: {0}")]
    Value(#[from] ValueError),

    #[error("address error: {0}")]
    Address(#[from] AddressError),

    #[error("transaction completion failed: {0}")]
    Completion(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid transaction: {0}")]
    Invalid(String),
}

impl TxError {
    pub(crate) fn missing(what: &'static str, detail: impl Into<String>) -> Self {
        TxError::MissingInput {
            what,
            detail: detail.into(),
        }
    }

    /// Whether the caller should refresh entity state and retry.
    ///
    /// Only a ledger rejection of an already-spent input qualifies: another
    /// party won the race for the same UTxO.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TxError::InputConsumed(_))
    }

    /// Short message suitable for display.
    pub fn user_message(&self) -> &'static str {
        match self {
            TxError::MissingInput { .. } => "A required on-chain record could not be found.",
            TxError::NoCollateral => "Your wallet has no collateral. Add a small ADA-only UTxO and retry.",
            TxError::InsufficientFunds { .. } => "Insufficient balance for this action.",
            TxError::InputConsumed(_) => {
                "This record was just updated by someone else. Refresh and try again."
            }
            TxError::Datum(_) => "An on-chain record could not be read.",
            TxError::Value(_) | TxError::Invalid(_) => "The transaction is not valid.",
            TxError::Address(_) => "An address is not valid.",
            TxError::Completion(_) => "The transaction could not be balanced or evaluated.",
            TxError::Provider(_) => "The blockchain service is unavailable.",
            TxError::Config(_) => "The application is misconfigured.",
        }
    }

    /// Technical detail for the expandable part of an error display.
    pub fn detail(&self) -> String {
        self.to_string()
    }
}

impl From<ProviderError> for TxError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::InputsConsumed(msg) => TxError::InputConsumed(msg),
            ProviderError::Evaluation(msg) => TxError::Completion(msg),
            ProviderError::NoCollateral => TxError::NoCollateral,
            other => TxError::Provider(other.to_string()),
        }
    }
}
