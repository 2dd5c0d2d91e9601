//! Deployment configuration.
//!
//! One `AppConfig` is loaded per process and shared by every builder. It
//! holds only what cannot be read from the chain: the network, where to
//! find the oracle, and where each validator's bytecode lives. Every other
//! address and policy id comes from the live oracle datum.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use ambassador_types::address::reward_address;
use ambassador_types::constants::MIN_UTXO_BUFFER_LOVELACE;
use ambassador_types::{Credential, Network, PolicyId, ScriptHash, TxInRef};

use crate::plan::ScriptSource;
use crate::TxError;

fn default_selection_buffer() -> u64 {
    MIN_UTXO_BUFFER_LOVELACE
}

fn default_entity_output_lovelace() -> u64 {
    MIN_UTXO_BUFFER_LOVELACE
}

/// Where a validator or minting policy can be obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptInfo {
    pub hash: ScriptHash,
    /// Double-CBOR-wrapped script bytes, hex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cbor: Option<String>,
    /// Output holding the script as a reference script.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<TxInRef>,
    /// Script size in bytes, needed by some completers for reference inputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl ScriptInfo {
    /// Prefer the published reference script; fall back to inline bytecode.
    pub fn source(&self, name: &str) -> Result<ScriptSource, TxError> {
        if let Some(tx_in) = &self.reference {
            return Ok(ScriptSource::Reference {
                tx_in: tx_in.clone(),
                script_hash: self.hash,
                size: self.size,
            });
        }
        match &self.cbor {
            Some(cbor) => Ok(ScriptSource::Provided {
                script_hash: self.hash,
                cbor: cbor.clone(),
            }),
            None => Err(TxError::Config(format!(
                "script {} has neither a reference output nor bytecode",
                name
            ))),
        }
    }
}

/// Every script of the program, minting policy and spending validator per
/// entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptRegistry {
    pub oracle_nft: ScriptInfo,
    pub oracle: ScriptInfo,
    pub counter_nft: ScriptInfo,
    pub counter: ScriptInfo,
    pub membership_intent_mint: ScriptInfo,
    pub membership_intent: ScriptInfo,
    pub member_mint: ScriptInfo,
    pub member: ScriptInfo,
    pub propose_intent_mint: ScriptInfo,
    pub propose_intent: ScriptInfo,
    pub proposal_mint: ScriptInfo,
    pub proposal: ScriptInfo,
    pub sign_off_approval_mint: ScriptInfo,
    pub sign_off_approval: ScriptInfo,
    pub treasury: ScriptInfo,
    pub treasury_withdrawal: ScriptInfo,
}

impl ScriptRegistry {
    fn all(&self) -> [(&'static str, &ScriptInfo); 16] {
        [
            ("oracleNft", &self.oracle_nft),
            ("oracle", &self.oracle),
            ("counterNft", &self.counter_nft),
            ("counter", &self.counter),
            ("membershipIntentMint", &self.membership_intent_mint),
            ("membershipIntent", &self.membership_intent),
            ("memberMint", &self.member_mint),
            ("member", &self.member),
            ("proposeIntentMint", &self.propose_intent_mint),
            ("proposeIntent", &self.propose_intent),
            ("proposalMint", &self.proposal_mint),
            ("proposal", &self.proposal),
            ("signOffApprovalMint", &self.sign_off_approval_mint),
            ("signOffApproval", &self.sign_off_approval),
            ("treasury", &self.treasury),
            ("treasuryWithdrawal", &self.treasury_withdrawal),
        ]
    }
}

/// Confirmation polling settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollConfig {
    pub interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            timeout_ms: 300_000,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub network: Network,
    /// Policy of the oracle NFT; the one output holding it is the oracle.
    pub oracle_policy_id: PolicyId,
    pub oracle_address: String,
    /// One-shot UTxO consumed when minting the oracle NFT.
    pub setup_utxo: TxInRef,
    /// One-shot UTxO consumed when minting the counter NFT.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter_setup_utxo: Option<TxInRef>,
    pub scripts: ScriptRegistry,
    /// Address that receives published reference scripts. Defaults to the
    /// acting wallet's change address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_script_address: Option<String>,
    /// Extra lovelace kept above a withdrawal so treasury change is never
    /// below the minimum UTxO value.
    #[serde(default = "default_selection_buffer")]
    pub selection_buffer_lovelace: u64,
    /// Lovelace placed alongside the NFT in newly created entity outputs.
    #[serde(default = "default_entity_output_lovelace")]
    pub entity_output_lovelace: u64,
    #[serde(default)]
    pub polling: PollConfig,
}

impl AppConfig {
    pub fn from_json_str(json: &str) -> Result<Self, TxError> {
        let config: AppConfig =
            serde_json::from_str(json).map_err(|e| TxError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, TxError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| TxError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), TxError> {
        let oracle = ambassador_types::address::parse_address(&self.oracle_address)?;
        if oracle.network_id != self.network.network_id() {
            return Err(TxError::Config(format!(
                "oracle address is not a {} address",
                self.network.as_str()
            )));
        }
        if oracle.payment != Credential::Script(self.scripts.oracle.hash.0) {
            return Err(TxError::Config(
                "oracle address is not locked by the configured oracle validator".into(),
            ));
        }
        if self.oracle_policy_id != self.scripts.oracle_nft.hash {
            return Err(TxError::Config(
                "oracle policy id does not match the oracle NFT script".into(),
            ));
        }
        for (name, info) in self.scripts.all() {
            info.source(name)?;
            if let Some(cbor) = &info.cbor {
                hex::decode(cbor)
                    .map_err(|e| TxError::Config(format!("script {}: {}", name, e)))?;
            }
        }
        if self.counter_setup_utxo.as_ref() == Some(&self.setup_utxo) {
            return Err(TxError::Config(
                "counter and oracle setup UTxOs must differ".into(),
            ));
        }
        if let Some(addr) = &self.ref_script_address {
            ambassador_types::address::parse_address(addr)?;
        }
        if self.polling.interval_ms == 0 || self.polling.timeout_ms < self.polling.interval_ms {
            return Err(TxError::Config(
                "polling interval must be non-zero and not exceed the timeout".into(),
            ));
        }
        Ok(())
    }

    /// Reward address of the treasury withdrawal script.
    pub fn treasury_withdrawal_reward_address(&self) -> Result<String, TxError> {
        let credential = Credential::Script(self.scripts.treasury_withdrawal.hash.0);
        Ok(reward_address(&credential, self.network)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::script_info as script;
    use ambassador_types::Hash28;

    fn sample_config() -> AppConfig {
        crate::testing::sample_config(Network::Preprod)
    }

    #[test]
    fn test_json_roundtrip_and_defaults() {
        let config = sample_config();
        let mut json = serde_json::to_value(&config).unwrap();
        let obj = json.as_object_mut().unwrap();
        obj.remove("selectionBufferLovelace");
        obj.remove("polling");
        let loaded = AppConfig::from_json_str(&json.to_string()).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.selection_buffer_lovelace, 2_000_000);
        assert!(json.to_string().contains("\"network\":\"preprod\""));
    }

    #[test]
    fn test_validate_catches_mismatches() {
        let mut config = sample_config();
        config.oracle_policy_id = Hash28([0xff; 28]);
        assert!(matches!(config.validate(), Err(TxError::Config(_))));

        let mut config = sample_config();
        config.network = Network::Mainnet;
        assert!(config.validate().is_err());

        let mut config = sample_config();
        config.scripts.member.reference = None;
        assert!(config.validate().is_err());
        config.scripts.member.cbor = Some("zz".into());
        assert!(config.validate().is_err());
        config.scripts.member.cbor = Some("4e4d01000033222220051200120011".into());
        assert!(config.validate().is_ok());

        let mut config = sample_config();
        config.counter_setup_utxo = Some(config.setup_utxo.clone());
        assert!(matches!(config.validate(), Err(TxError::Config(_))));
    }

    #[test]
    fn test_script_source_prefers_reference() {
        let mut info = script(7);
        info.cbor = Some("00".into());
        assert!(matches!(info.source("x").unwrap(), ScriptSource::Reference { .. }));
        info.reference = None;
        assert!(matches!(info.source("x").unwrap(), ScriptSource::Provided { .. }));
    }

    #[test]
    fn test_withdrawal_reward_address() {
        let addr = sample_config().treasury_withdrawal_reward_address().unwrap();
        assert!(addr.starts_with("stake_test1"));
    }

    #[test]
    fn test_from_json_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("ambassador.json");
        std::fs::write(&path, serde_json::to_string_pretty(&sample_config()).unwrap()).unwrap();
        assert_eq!(AppConfig::from_json_file(&path).unwrap(), sample_config());

        std::fs::write(&path, "{\"network\": \"preprod\"}").unwrap();
        assert!(matches!(AppConfig::from_json_file(&path), Err(TxError::Config(_))));
    }

    #[test]
    fn test_from_missing_file() {
        assert!(matches!(
            AppConfig::from_json_file("/nonexistent/ambassador.json"),
            Err(TxError::Config(_))
        ));
    }
}
