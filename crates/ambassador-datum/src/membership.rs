//! Membership intent and member datums.
//!
//! ```text
//! MemberMetadata        = Constr 0 [wallet_address, full_name, display_name,
//!                                   email_address, bio, country, city,
//!                                   x_handle, github, discord]
//! TokenRef              = [policy_id, asset_name]
//! MembershipIntentDatum = Constr 0 [token, metadata]
//! MemberDatum           = Constr 0 [token, completion, fund_received, metadata]
//! ```
//!
//! `completion` is a map from the metadata of a signed-off proposal to the
//! amount disbursed for it. Entry order is kept as read.

use ambassador_types::value::token_unit;
use ambassador_types::{AssetName, PolicyId};

use crate::address::PlutusAddress;
use crate::plutus::{Fields, PlutusData, PlutusDataExt};
use crate::proposal::ProposalMetadata;
use crate::text::{optional_text, text_to_data};
use crate::{DatumError, PlutusCodec};

/// A token identity: policy id plus asset name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenRef {
    pub policy_id: PolicyId,
    pub asset_name: AssetName,
}

impl TokenRef {
    pub fn new(policy_id: PolicyId, asset_name: AssetName) -> Self {
        Self {
            policy_id,
            asset_name,
        }
    }

    /// Unit string (`policy || name`) as it appears in UTxO amounts.
    pub fn unit(&self) -> String {
        token_unit(&self.policy_id, &self.asset_name)
    }
}

impl PlutusCodec for TokenRef {
    fn to_data(&self) -> PlutusData {
        PlutusData::list(vec![
            PlutusData::hash28(&self.policy_id),
            PlutusData::asset_name(&self.asset_name),
        ])
    }

    fn from_data(data: &PlutusData) -> Result<Self, DatumError> {
        const ENTITY: &str = "TokenRef";
        let items = data.as_list(ENTITY)?;
        let mut f = Fields::new(ENTITY, items);
        let policy_id = f.next_hash28()?;
        let asset_name = f.next_asset_name()?;
        f.finish()?;
        Ok(Self {
            policy_id,
            asset_name,
        })
    }
}

/// Applicant and member profile.
///
/// Only the wallet address is mandatory. Text fields that are missing from
/// an on-chain datum decode as empty strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberMetadata {
    pub wallet_address: PlutusAddress,
    pub full_name: String,
    pub display_name: String,
    pub email_address: String,
    pub bio: String,
    pub country: String,
    pub city: String,
    pub x_handle: String,
    pub github: String,
    pub discord: String,
}

impl MemberMetadata {
    pub fn new(wallet_address: PlutusAddress) -> Self {
        Self {
            wallet_address,
            full_name: String::new(),
            display_name: String::new(),
            email_address: String::new(),
            bio: String::new(),
            country: String::new(),
            city: String::new(),
            x_handle: String::new(),
            github: String::new(),
            discord: String::new(),
        }
    }

    fn text_fields(&self) -> [&str; 9] {
        [
            &self.full_name,
            &self.display_name,
            &self.email_address,
            &self.bio,
            &self.country,
            &self.city,
            &self.x_handle,
            &self.github,
            &self.discord,
        ]
    }
}

impl PlutusCodec for MemberMetadata {
    fn to_data(&self) -> PlutusData {
        let mut fields = Vec::with_capacity(10);
        fields.push(self.wallet_address.to_data());
        fields.extend(self.text_fields().iter().map(|t| text_to_data(t)));
        PlutusData::constr(0, fields)
    }

    fn from_data(data: &PlutusData) -> Result<Self, DatumError> {
        const ENTITY: &str = "MemberMetadata";
        let mut f = Fields::new(ENTITY, data.expect_constr(ENTITY, 0)?);
        let wallet_address = PlutusAddress::from_data(f.next()?)?;
        let mut text = || optional_text(ENTITY, f.next_optional());
        let m = Self {
            wallet_address,
            full_name: text()?,
            display_name: text()?,
            email_address: text()?,
            bio: text()?,
            country: text()?,
            city: text()?,
            x_handle: text()?,
            github: text()?,
            discord: text()?,
        };
        f.finish()?;
        Ok(m)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipIntentDatum {
    pub token: TokenRef,
    pub metadata: MemberMetadata,
}

impl MembershipIntentDatum {
    /// Same intent with replaced metadata.
    pub fn with_metadata(&self, metadata: MemberMetadata) -> Self {
        Self {
            token: self.token.clone(),
            metadata,
        }
    }
}

impl PlutusCodec for MembershipIntentDatum {
    fn to_data(&self) -> PlutusData {
        PlutusData::constr(0, vec![self.token.to_data(), self.metadata.to_data()])
    }

    fn from_data(data: &PlutusData) -> Result<Self, DatumError> {
        const ENTITY: &str = "MembershipIntentDatum";
        let mut f = Fields::new(ENTITY, data.expect_constr(ENTITY, 0)?);
        let token = TokenRef::from_data(f.next()?)?;
        let metadata = MemberMetadata::from_data(f.next()?)?;
        f.finish()?;
        Ok(Self { token, metadata })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDatum {
    pub token: TokenRef,
    pub completion: Vec<(ProposalMetadata, u64)>,
    pub fund_received: u64,
    pub metadata: MemberMetadata,
}

impl MemberDatum {
    /// Fresh member converted from an approved intent. The member keeps
    /// the applicant's token reference and profile.
    pub fn from_intent(intent: &MembershipIntentDatum) -> Self {
        Self {
            token: intent.token.clone(),
            completion: Vec::new(),
            fund_received: 0,
            metadata: intent.metadata.clone(),
        }
    }

    /// Member after a sign-off of `amount` for `proposal`.
    ///
    /// The completion map keeps one entry per proposal: a second sign-off
    /// for the same metadata adds to the existing amount, so the map's
    /// values always sum to `fund_received`.
    pub fn with_completion(&self, proposal: ProposalMetadata, amount: u64) -> Result<Self, DatumError> {
        let overflow = || DatumError::IntRange { entity: "MemberDatum" };
        let fund_received = self.fund_received.checked_add(amount).ok_or_else(overflow)?;
        let mut completion = self.completion.clone();
        match completion.iter_mut().find(|(p, _)| *p == proposal) {
            Some((_, existing)) => *existing = existing.checked_add(amount).ok_or_else(overflow)?,
            None => completion.push((proposal, amount)),
        }
        Ok(Self {
            token: self.token.clone(),
            completion,
            fund_received,
            metadata: self.metadata.clone(),
        })
    }

    pub fn with_metadata(&self, metadata: MemberMetadata) -> Self {
        Self {
            metadata,
            ..self.clone()
        }
    }
}

impl PlutusCodec for MemberDatum {
    fn to_data(&self) -> PlutusData {
        let completion = self
            .completion
            .iter()
            .map(|(p, amount)| (p.to_data(), PlutusData::int(*amount)))
            .collect();
        PlutusData::constr(
            0,
            vec![
                self.token.to_data(),
                PlutusData::map(completion),
                PlutusData::int(self.fund_received),
                self.metadata.to_data(),
            ],
        )
    }

    fn from_data(data: &PlutusData) -> Result<Self, DatumError> {
        const ENTITY: &str = "MemberDatum";
        let mut f = Fields::new(ENTITY, data.expect_constr(ENTITY, 0)?);
        let token = TokenRef::from_data(f.next()?)?;
        let completion = f
            .next()?
            .as_map(ENTITY)?
            .iter()
            .map(|(k, v)| Ok((ProposalMetadata::from_data(k)?, v.as_u64(ENTITY)?)))
            .collect::<Result<Vec<_>, DatumError>>()?;
        let fund_received = f.next_u64()?;
        let metadata = MemberMetadata::from_data(f.next()?)?;
        f.finish()?;
        Ok(Self {
            token,
            completion,
            fund_received,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ambassador_types::{Credential, Hash28};

    fn wallet() -> PlutusAddress {
        PlutusAddress {
            payment: Credential::Key([0x11; 28]),
            stake: Some(ambassador_types::StakeReference::Credential(Credential::Key([0x22; 28]))),
        }
    }

    fn metadata() -> MemberMetadata {
        MemberMetadata {
            full_name: "Ada Lovelace".into(),
            display_name: "ada".into(),
            email_address: "ada@example.org".into(),
            bio: "Long biography ".repeat(10),
            country: "UK".into(),
            city: "London".into(),
            x_handle: "@ada".into(),
            github: "ada".into(),
            discord: "ada#1815".into(),
            ..MemberMetadata::new(wallet())
        }
    }

    fn token(name: &str) -> TokenRef {
        TokenRef::new(Hash28([0x44; 28]), name.parse().unwrap())
    }

    #[test]
    fn test_token_ref_is_a_list_pair() {
        let t = token("35");
        assert_eq!(
            t.to_data(),
            PlutusData::list(vec![PlutusData::bytes(vec![0x44; 28]), PlutusData::bytes(vec![0x35])])
        );
        assert_eq!(t.unit(), format!("{}35", "44".repeat(28)));
    }

    #[test]
    fn test_metadata_roundtrip_with_long_bio() {
        let m = metadata();
        let data = m.to_data();
        let fields = data.expect_constr("T", 0).unwrap();
        assert!(matches!(fields[4], PlutusData::Array(_)));
        assert_eq!(MemberMetadata::from_data(&data).unwrap(), m);
    }

    #[test]
    fn test_metadata_missing_fields_read_empty() {
        let short = PlutusData::constr(
            0,
            vec![wallet().to_data(), PlutusData::bytes(b"Grace".to_vec())],
        );
        let m = MemberMetadata::from_data(&short).unwrap();
        assert_eq!(m.full_name, "Grace");
        assert_eq!(m.discord, "");
        assert_eq!(m.wallet_address, wallet());
    }

    #[test]
    fn test_metadata_wrong_type_is_error() {
        let bad = PlutusData::constr(0, vec![wallet().to_data(), PlutusData::int(1)]);
        assert!(matches!(
            MemberMetadata::from_data(&bad),
            Err(DatumError::Shape { .. })
        ));
    }

    #[test]
    fn test_intent_roundtrip() {
        let intent = MembershipIntentDatum {
            token: TokenRef::new(Hash28([0x55; 28]), AssetName::empty()),
            metadata: metadata(),
        };
        let back = MembershipIntentDatum::from_cbor_hex(&intent.to_cbor_hex().unwrap()).unwrap();
        assert_eq!(back, intent);
    }

    #[test]
    fn test_member_completion() {
        let intent = MembershipIntentDatum {
            token: token("aa01"),
            metadata: metadata(),
        };
        let member = MemberDatum::from_intent(&intent);
        assert_eq!(member.fund_received, 0);
        assert_eq!(member.token, intent.token);

        let proposal = ProposalMetadata {
            title: "Workshop".into(),
            status: "completed".into(),
            ..ProposalMetadata::default()
        };
        let after = member.with_completion(proposal.clone(), 5_000_000).unwrap();
        let after = after.with_completion(proposal.clone(), 1_000_000).unwrap();
        assert_eq!(after.fund_received, 6_000_000);
        assert_eq!(after.completion, vec![(proposal.clone(), 6_000_000)]);

        let other = ProposalMetadata {
            title: "Meetup".into(),
            ..proposal
        };
        let after = after.with_completion(other.clone(), 2_000_000).unwrap();
        assert_eq!(after.completion.len(), 2);
        assert_eq!(after.completion[1], (other, 2_000_000));
        let total: u64 = after.completion.iter().map(|(_, a)| a).sum();
        assert_eq!(total, after.fund_received);

        let back = MemberDatum::from_cbor_hex(&after.to_cbor_hex().unwrap()).unwrap();
        assert_eq!(back, after);
    }

    #[test]
    fn test_member_rejects_intent_shape() {
        let intent = MembershipIntentDatum {
            token: token(""),
            metadata: metadata(),
        };
        assert!(matches!(
            MemberDatum::from_data(&intent.to_data()),
            Err(DatumError::Shape { .. })
        ));
    }
}
