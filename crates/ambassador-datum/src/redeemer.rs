//! Redeemers for every validator and minting policy.
//!
//! Unit redeemers are `Constr n []` where `n` is the variant's position.
//! Minting policies take [`MintPolarity`].

use ambassador_types::KeyHash;

use crate::plutus::{Fields, PlutusData, PlutusDataExt};
use crate::text::{data_to_text, text_to_data};
use crate::{DatumError, PlutusCodec};

/// Tag of a field-less constructor, bounded by the number of variants.
fn unit_tag(entity: &'static str, data: &PlutusData, variants: u64) -> Result<u64, DatumError> {
    let (tag, fields) = data.as_constr(entity)?;
    if tag >= variants {
        return Err(DatumError::UnknownVariant { entity, index: tag });
    }
    Fields::new(entity, fields).finish()?;
    Ok(tag)
}

/// Declares a redeemer enum of unit variants with their constructor tags.
macro_rules! unit_redeemer {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $tag:expr),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn tag(self) -> u64 {
                match self {
                    $($name::$variant => $tag),+
                }
            }
        }

        impl PlutusCodec for $name {
            fn to_data(&self) -> PlutusData {
                PlutusData::unit(self.tag())
            }

            fn from_data(data: &PlutusData) -> Result<Self, DatumError> {
                const ENTITY: &str = stringify!($name);
                let all = [$($name::$variant),+];
                let tag = unit_tag(ENTITY, data, all.len() as u64)?;
                all.into_iter()
                    .find(|v| v.tag() == tag)
                    .ok_or(DatumError::UnknownVariant { entity: ENTITY, index: tag })
            }
        }
    };
}

unit_redeemer! {
    /// Redeemer of every one-token minting policy.
    MintPolarity { Mint = 0, Burn = 1 }
}

unit_redeemer! {
    CounterRedeemer { IncrementCount = 0, StopCounter = 1 }
}

unit_redeemer! {
    MembershipIntentRedeemer { ApproveMember = 0, RejectMember = 1, UpdateMetadata = 2 }
}

unit_redeemer! {
    MemberRedeemer {
        AdminRemoveMember = 0,
        AdminSignOff = 1,
        MemberUpdateMetadata = 2,
        MemberProposeProject = 3,
    }
}

unit_redeemer! {
    ProposeIntentRedeemer { ApproveProposal = 0, RejectProposal = 1 }
}

unit_redeemer! {
    ProposalRedeemer { ApproveSignOff = 0 }
}

unit_redeemer! {
    SignOffApprovalRedeemer { ProcessSignOff = 0 }
}

unit_redeemer! {
    /// Spending redeemer of treasury outputs.
    TreasuryRedeemer { Withdraw = 0 }
}

unit_redeemer! {
    /// Redeemer of the zero-amount reward withdrawal.
    TreasuryWithdrawalRedeemer { Withdraw = 0 }
}

/// Spending redeemer of the oracle output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleRedeemer {
    RotateAdmin { admins: Vec<KeyHash>, admin_tenure: String },
    UpdateThreshold(u64),
    StopOracle,
}

impl PlutusCodec for OracleRedeemer {
    fn to_data(&self) -> PlutusData {
        match self {
            OracleRedeemer::RotateAdmin {
                admins,
                admin_tenure,
            } => PlutusData::constr(
                0,
                vec![
                    PlutusData::list(admins.iter().map(PlutusData::hash28).collect()),
                    text_to_data(admin_tenure),
                ],
            ),
            OracleRedeemer::UpdateThreshold(n) => PlutusData::constr(1, vec![PlutusData::int(*n)]),
            OracleRedeemer::StopOracle => PlutusData::unit(2),
        }
    }

    fn from_data(data: &PlutusData) -> Result<Self, DatumError> {
        const ENTITY: &str = "OracleRedeemer";
        let (tag, fields) = data.as_constr(ENTITY)?;
        let mut f = Fields::new(ENTITY, fields);
        let redeemer = match tag {
            0 => {
                let admins = f
                    .next()?
                    .as_list(ENTITY)?
                    .iter()
                    .map(|a| Ok(KeyHash::from_slice(a.as_bytes(ENTITY)?)?))
                    .collect::<Result<Vec<_>, DatumError>>()?;
                let admin_tenure = data_to_text(ENTITY, f.next()?)?;
                OracleRedeemer::RotateAdmin {
                    admins,
                    admin_tenure,
                }
            }
            1 => OracleRedeemer::UpdateThreshold(f.next_u64()?),
            2 => OracleRedeemer::StopOracle,
            other => return Err(DatumError::UnknownVariant { entity: ENTITY, index: other }),
        };
        f.finish()?;
        Ok(redeemer)
    }
}
