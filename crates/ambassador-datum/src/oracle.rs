//! Oracle datum: the program's global configuration.
//!
//! Positional layout (constructor 0):
//!
//! | # | field |
//! |---|---|
//! | 0 | admins (list of verification-key hashes) |
//! | 1 | admin tenure |
//! | 2 | multisig threshold |
//! | 3-4 | oracle NFT policy, oracle address |
//! | 5-6 | counter NFT policy, counter address |
//! | 7-8 | membership-intent policy, address |
//! | 9-10 | member policy, address |
//! | 11-12 | propose-intent policy, address |
//! | 13-14 | proposal policy, address |
//! | 15-16 | sign-off-approval policy, address |
//! | 17 | treasury address |
//! | 18 | treasury withdrawal script hash |

use ambassador_types::{KeyHash, PolicyId, ScriptHash};

use crate::address::PlutusAddress;
use crate::plutus::{Fields, PlutusData, PlutusDataExt};
use crate::text::{data_to_text, text_to_data};
use crate::{DatumError, PlutusCodec};

const ENTITY: &str = "OracleDatum";

/// Policy id and script address of one entity kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityScript {
    pub policy_id: PolicyId,
    pub address: PlutusAddress,
}

impl EntityScript {
    fn push(&self, fields: &mut Vec<PlutusData>) {
        fields.push(PlutusData::hash28(&self.policy_id));
        fields.push(self.address.to_data());
    }

    fn read(f: &mut Fields<'_>) -> Result<Self, DatumError> {
        let policy_id = f.next_hash28()?;
        let address = PlutusAddress::from_data(f.next()?)?;
        Ok(Self { policy_id, address })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleDatum {
    pub admins: Vec<KeyHash>,
    pub admin_tenure: String,
    pub multi_sig_threshold: u64,
    pub oracle: EntityScript,
    pub counter: EntityScript,
    pub membership_intent: EntityScript,
    pub member: EntityScript,
    pub propose_intent: EntityScript,
    pub proposal: EntityScript,
    pub sign_off_approval: EntityScript,
    pub treasury_address: PlutusAddress,
    pub treasury_withdrawal_script_hash: ScriptHash,
}

impl OracleDatum {
    /// Datum with the admin set replaced.
    pub fn with_admins(&self, admins: Vec<KeyHash>, admin_tenure: String) -> Self {
        Self {
            admins,
            admin_tenure,
            ..self.clone()
        }
    }

    /// Datum with a new multisig threshold.
    pub fn with_threshold(&self, multi_sig_threshold: u64) -> Self {
        Self {
            multi_sig_threshold,
            ..self.clone()
        }
    }

    pub fn is_admin(&self, pub_key_hash: &KeyHash) -> bool {
        self.admins.contains(pub_key_hash)
    }
}

impl PlutusCodec for OracleDatum {
    fn to_data(&self) -> PlutusData {
        let mut fields = Vec::with_capacity(19);
        fields.push(PlutusData::list(
            self.admins.iter().map(PlutusData::hash28).collect(),
        ));
        fields.push(text_to_data(&self.admin_tenure));
        fields.push(PlutusData::int(self.multi_sig_threshold));
        self.oracle.push(&mut fields);
        self.counter.push(&mut fields);
        self.membership_intent.push(&mut fields);
        self.member.push(&mut fields);
        self.propose_intent.push(&mut fields);
        self.proposal.push(&mut fields);
        self.sign_off_approval.push(&mut fields);
        fields.push(self.treasury_address.to_data());
        fields.push(PlutusData::hash28(&self.treasury_withdrawal_script_hash));
        PlutusData::constr(0, fields)
    }

    fn from_data(data: &PlutusData) -> Result<Self, DatumError> {
        let mut f = Fields::new(ENTITY, data.expect_constr(ENTITY, 0)?);
        let admins = f
            .next()?
            .as_list(ENTITY)?
            .iter()
            .map(|a| Ok(KeyHash::from_slice(a.as_bytes(ENTITY)?)?))
            .collect::<Result<Vec<_>, DatumError>>()?;
        let admin_tenure = data_to_text(ENTITY, f.next()?)?;
        let multi_sig_threshold = f.next_u64()?;
        let oracle = EntityScript::read(&mut f)?;
        let counter = EntityScript::read(&mut f)?;
        let membership_intent = EntityScript::read(&mut f)?;
        let member = EntityScript::read(&mut f)?;
        let propose_intent = EntityScript::read(&mut f)?;
        let proposal = EntityScript::read(&mut f)?;
        let sign_off_approval = EntityScript::read(&mut f)?;
        let treasury_address = PlutusAddress::from_data(f.next()?)?;
        let treasury_withdrawal_script_hash = f.next_hash28()?;
        f.finish()?;

        Ok(Self {
            admins,
            admin_tenure,
            multi_sig_threshold,
            oracle,
            counter,
            membership_intent,
            member,
            propose_intent,
            proposal,
            sign_off_approval,
            treasury_address,
            treasury_withdrawal_script_hash,
        })
    }
}
