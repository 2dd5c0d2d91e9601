use ambassador_tx::TxError;
use ambassador_types::KeyHash;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MultisigError {
    #[error(transparent)]
    Tx(#[from] TxError),

    #[error("no pending decision under {0}")]
    NoDecision(String),

    #[error("a decision is already pending under {0}")]
    DecisionExists(String),

    #[error("decision {key} was already submitted as {tx_hash}")]
    AlreadySubmitted { key: String, tx_hash: String },

    #[error("{0} is not in the selected admin set")]
    NotSelected(KeyHash),

    #[error("signature by {0} does not verify against the transaction body")]
    BadSignature(KeyHash),

    #[error("signed transaction {got} does not match pending transaction {expected}")]
    WrongTransaction { expected: String, got: String },

    #[error("quorum not met: {signed} of {required} signatures")]
    QuorumNotMet { signed: usize, required: usize },

    #[error("version conflict on {key}: expected {expected:?}, found {found:?}")]
    Conflict {
        key: String,
        expected: Option<u64>,
        found: Option<u64>,
    },

    #[error("decision store error: {0}")]
    Store(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl MultisigError {
    /// Whether refreshing state and retrying may succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            MultisigError::Tx(e) => e.is_recoverable(),
            MultisigError::Conflict { .. } => true,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for MultisigError {
    fn from(e: serde_json::Error) -> Self {
        MultisigError::Serialization(e.to_string())
    }
}
