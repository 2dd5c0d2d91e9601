//! UTxO records in the shape chain-query providers return.

use serde::{Deserialize, Serialize};

use crate::value::{Asset, Value, ValueError};

/// Reference to a transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxInRef {
    pub tx_hash: String,
    pub output_index: u32,
}

impl TxInRef {
    pub fn new(tx_hash: impl Into<String>, output_index: u32) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            output_index,
        }
    }
}

impl std::fmt::Display for TxInRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.tx_hash, self.output_index)
    }
}

/// Resolved output contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxOutput {
    pub address: String,
    pub amount: Vec<Asset>,
    /// Inline datum, hex-encoded CBOR.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plutus_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_hash: Option<String>,
    /// Hash of a reference script held by this output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_hash: Option<String>,
}

/// An unspent transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UTxO {
    pub input: TxInRef,
    pub output: TxOutput,
}

impl UTxO {
    pub fn value(&self) -> Result<Value, ValueError> {
        Value::from_assets(&self.output.amount)
    }

    /// Lovelace held, treating unparseable quantities as zero.
    pub fn lovelace(&self) -> u64 {
        self.value().map(|v| v.lovelace()).unwrap_or(0)
    }

    /// Whether this output holds any token under `policy_id`.
    pub fn holds_policy(&self, policy_id: &str) -> bool {
        self.value().map(|v| v.has_policy(policy_id)).unwrap_or(false)
    }

    pub fn inline_datum(&self) -> Option<&str> {
        self.output.plutus_data.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_json_shape() {
        let json = r#"{
            "input": {"txHash": "ab", "outputIndex": 2},
            "output": {
                "address": "addr_test1xyz",
                "amount": [{"unit": "lovelace", "quantity": "1500000"}],
                "plutusData": "d87980"
            }
        }"#;
        let utxo: UTxO = serde_json::from_str(json).unwrap();
        assert_eq!(utxo.input, TxInRef::new("ab", 2));
        assert_eq!(utxo.lovelace(), 1_500_000);
        assert_eq!(utxo.inline_datum(), Some("d87980"));
        assert!(utxo.output.data_hash.is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(TxInRef::new("ff", 0).to_string(), "ff#0");
    }
}
