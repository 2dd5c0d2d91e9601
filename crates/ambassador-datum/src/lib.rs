//! Plutus data model and the ambassador program's on-chain schemas.
//!
//! Every datum and redeemer the validators read is defined here exactly
//! once, behind the [`PlutusCodec`] trait. Transaction builders never
//! assemble positional field lists themselves.

pub mod address;
pub mod counter;
pub mod hash;
pub mod membership;
pub mod oracle;
pub mod plutus;
pub mod proposal;
pub mod redeemer;
pub mod text;

pub use address::PlutusAddress;
pub use counter::CounterDatum;
pub use membership::{MemberDatum, MemberMetadata, MembershipIntentDatum, TokenRef};
pub use oracle::OracleDatum;
pub use plutus::{PlutusData, PlutusDataExt};
pub use proposal::{ProposalDatum, ProposalMetadata};
pub use redeemer::{
    CounterRedeemer, MemberRedeemer, MembershipIntentRedeemer, MintPolarity, OracleRedeemer,
    ProposalRedeemer, ProposeIntentRedeemer, SignOffApprovalRedeemer, TreasuryRedeemer,
    TreasuryWithdrawalRedeemer,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatumError {
    #[error("CBOR error: {0}")]
    Cbor(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("{entity}: expected constructor {expected}, got {got}")]
    Constructor {
        entity: &'static str,
        expected: u64,
        got: u64,
    },

    #[error("{entity}: expected {expected}, got {got}")]
    Shape {
        entity: &'static str,
        expected: &'static str,
        got: &'static str,
    },

    #[error("{entity}: missing field {index}")]
    MissingField { entity: &'static str, index: usize },

    #[error("{entity}: expected {expected} fields, got {got}")]
    FieldCount {
        entity: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{entity}: integer out of range")]
    IntRange { entity: &'static str },

    #[error("{entity}: invalid UTF-8 text")]
    Utf8 { entity: &'static str },

    #[error("{entity}: unknown variant {index}")]
    UnknownVariant { entity: &'static str, index: u64 },

    #[error("hash error: {0}")]
    Hash(#[from] ambassador_types::HexError),

    #[error("address error: {0}")]
    Address(#[from] ambassador_types::address::AddressError),
}

/// Bidirectional mapping between a typed record and its Plutus data form.
pub trait PlutusCodec: Sized {
    fn to_data(&self) -> PlutusData;

    fn from_data(data: &PlutusData) -> Result<Self, DatumError>;

    /// Hex CBOR, as stored in an inline datum or passed as a redeemer.
    fn to_cbor_hex(&self) -> Result<String, DatumError> {
        self.to_data().to_cbor_hex()
    }

    fn from_cbor_hex(cbor_hex: &str) -> Result<Self, DatumError> {
        Self::from_data(&PlutusData::from_cbor_hex(cbor_hex)?)
    }
}
