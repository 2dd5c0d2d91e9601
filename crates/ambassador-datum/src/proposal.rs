//! Proposal datums.
//!
//! Propose intents, approved proposals and sign-off approvals share one
//! datum shape; only the token policy changes as a proposal moves along
//! the approval chain.
//!
//! ```text
//! ProposalMetadata = Constr 0 [title, url, fund_requested, receiver_wallet_address,
//!                              submitted_by_address, status]
//! ProposalDatum    = Constr 0 [fund_requested, receiver, member, metadata]
//! ```

use ambassador_types::text::string_to_hex;

use crate::address::PlutusAddress;
use crate::plutus::{Fields, PlutusData, PlutusDataExt};
use crate::text::{optional_text, text_to_data};
use crate::{DatumError, PlutusCodec};

/// Human-facing proposal record, also used as the key of a member's
/// completion map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ProposalMetadata {
    pub title: String,
    pub url: String,
    pub fund_requested: String,
    pub receiver_wallet_address: String,
    pub submitted_by_address: String,
    pub status: String,
}

impl PlutusCodec for ProposalMetadata {
    fn to_data(&self) -> PlutusData {
        PlutusData::constr(
            0,
            [
                &self.title,
                &self.url,
                &self.fund_requested,
                &self.receiver_wallet_address,
                &self.submitted_by_address,
                &self.status,
            ]
            .iter()
            .map(|t| text_to_data(t))
            .collect(),
        )
    }

    fn from_data(data: &PlutusData) -> Result<Self, DatumError> {
        const ENTITY: &str = "ProposalMetadata";
        let mut f = Fields::new(ENTITY, data.expect_constr(ENTITY, 0)?);
        let mut text = || optional_text(ENTITY, f.next_optional());
        let m = Self {
            title: text()?,
            url: text()?,
            fund_requested: text()?,
            receiver_wallet_address: text()?,
            submitted_by_address: text()?,
            status: text()?,
        };
        f.finish()?;
        Ok(m)
    }
}

/// Datum of propose-intent, proposal and sign-off-approval outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalDatum {
    /// Lovelace to pay out on sign-off.
    pub fund_requested: u64,
    pub receiver: PlutusAddress,
    /// Index of the proposing member (the counter value its token was
    /// minted at).
    pub member: u64,
    pub metadata: ProposalMetadata,
}

impl ProposalDatum {
    /// Asset name (hex) of the proposing member's token.
    pub fn member_token_name(&self) -> String {
        string_to_hex(&self.member.to_string())
    }
}

impl PlutusCodec for ProposalDatum {
    fn to_data(&self) -> PlutusData {
        PlutusData::constr(
            0,
            vec![
                PlutusData::int(self.fund_requested),
                self.receiver.to_data(),
                PlutusData::int(self.member),
                self.metadata.to_data(),
            ],
        )
    }

    fn from_data(data: &PlutusData) -> Result<Self, DatumError> {
        const ENTITY: &str = "ProposalDatum";
        let mut f = Fields::new(ENTITY, data.expect_constr(ENTITY, 0)?);
        let fund_requested = f.next_u64()?;
        let receiver = PlutusAddress::from_data(f.next()?)?;
        let member = f.next_u64()?;
        let metadata = ProposalMetadata::from_data(f.next()?)?;
        f.finish()?;
        Ok(Self {
            fund_requested,
            receiver,
            member,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ambassador_types::Credential;

    fn sample() -> ProposalDatum {
        ProposalDatum {
            fund_requested: 10_000_000,
            receiver: PlutusAddress {
                payment: Credential::Key([0x33; 28]),
                stake: None,
            },
            member: 5,
            metadata: ProposalMetadata {
                title: "Meetup in Lisbon".into(),
                url: "https://example.org/proposals/lisbon-meetup-with-a-rather-long-path-name".into(),
                fund_requested: "10".into(),
                receiver_wallet_address: "addr_test1vqe...".into(),
                submitted_by_address: "addr_test1vqf...".into(),
                status: "pending".into(),
            },
        }
    }

    #[test]
    fn test_proposal_roundtrip() {
        let p = sample();
        assert!(p.metadata.url.len() > 64);
        assert_eq!(ProposalDatum::from_cbor_hex(&p.to_cbor_hex().unwrap()).unwrap(), p);
    }

    #[test]
    fn test_member_token_name() {
        assert_eq!(sample().member_token_name(), "35");
    }

    #[test]
    fn test_metadata_from_older_schema() {
        let old = PlutusData::constr(0, vec![PlutusData::bytes(b"Title".to_vec())]);
        let m = ProposalMetadata::from_data(&old).unwrap();
        assert_eq!(m.title, "Title");
        assert_eq!(m.status, "");
    }

    #[test]
    fn test_wrong_constructor() {
        let mut data = sample().to_data();
        if let PlutusData::Constr(c) = &mut data {
            c.tag = 122;
        }
        assert!(matches!(
            ProposalDatum::from_data(&data),
            Err(DatumError::Constructor { expected: 0, got: 1, .. })
        ));
    }
}
