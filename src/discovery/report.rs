//! Discovery result types and per-item batch reporting.

use crate::extract::ContractType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// A contract recovered from a wallet's transaction history.
///
/// Ephemeral: not persisted unless promoted into the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredContract {
    pub contract_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_contract_id: Option<String>,

    /// Memo-derived name, or a placeholder built from the contract id
    pub company_name: String,

    /// Memo-derived symbol, or the configured fallback
    pub token_symbol: String,

    /// Whether `company_name` was read from the transaction memo
    #[serde(default)]
    pub company_name_recovered: bool,

    #[serde(default)]
    pub token_symbol_recovered: bool,

    /// Timestamp of the transaction the contract was seen in
    pub deployment_date: DateTime<Utc>,

    pub transaction_hash: String,

    pub deployer_address: String,

    pub contract_type: ContractType,

    /// Extraction strategy that recovered the address
    pub strategy: String,
}

/// A registry contract the queried account is confirmed to belong to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipMatch {
    pub contract_id: String,

    pub company_name: String,

    pub token_symbol: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_contract: Option<String>,

    /// When membership was verified
    pub last_checked: DateTime<Utc>,

    pub network: String,

    /// Participant record as returned by the contract
    pub participant: Value,
}

/// A contract a wallet has called, de-duplicated across its history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractedContract {
    pub contract_id: String,

    /// Newest interaction seen
    pub last_interaction: DateTime<Utc>,

    /// Transaction of the newest interaction
    pub transaction_hash: String,

    pub interactions: usize,
}

/// Why an item was left out of a batch result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum SkipReason {
    /// The transaction did not succeed on the ledger.
    UnsuccessfulTransaction,

    /// Operations of the transaction could not be fetched.
    OperationsUnavailable { error: String },

    /// No strategy recovered a contract address from the operation.
    NoCandidate { operation: usize },

    /// Registry record with a malformed contract id.
    InvalidContractId,

    /// Membership could not be determined.
    Inconclusive { error: String },
}

/// One skipped item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skipped {
    /// Transaction hash or contract id
    pub item: String,

    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Items recovered by a batch, plus what was skipped and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport<T> {
    pub items: Vec<T>,

    pub skipped: Vec<Skipped>,

    /// Number of transactions or contracts examined
    pub examined: usize,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            skipped: Vec::new(),
            examined: 0,
        }
    }
}

impl<T> BatchReport<T> {
    /// Fold one item outcome into the report.
    pub fn record(&mut self, item: &str, outcome: Result<T, SkipReason>) {
        match outcome {
            Ok(value) => self.items.push(value),
            Err(reason) => self.skip(item, reason),
        }
    }

    /// Record a skipped item.
    pub fn skip(&mut self, item: &str, reason: SkipReason) {
        warn!(item = %item, reason = ?reason, "skipping item");
        self.skipped.push(Skipped {
            item: item.to_string(),
            reason,
        });
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_and_skip() {
        let mut report: BatchReport<u32> = BatchReport::default();
        report.record("tx1", Ok(7));
        report.record("tx2", Err(SkipReason::UnsuccessfulTransaction));
        report.examined = 2;

        assert_eq!(report.items, vec![7]);
        assert_eq!(report.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].item, "tx2");
    }

    #[test]
    fn test_skip_serialization() {
        let skipped = Skipped {
            item: "abc".to_string(),
            reason: SkipReason::NoCandidate { operation: 2 },
        };
        assert_eq!(
            serde_json::to_value(&skipped).unwrap(),
            json!({"item": "abc", "reason": "noCandidate", "operation": 2})
        );
    }

    #[test]
    fn test_discovered_contract_shape() {
        let contract = DiscoveredContract {
            contract_id: "C1".to_string(),
            token_contract_id: Some("C2".to_string()),
            company_name: "Acme".to_string(),
            token_symbol: "ACM".to_string(),
            company_name_recovered: true,
            token_symbol_recovered: false,
            deployment_date: "2025-09-12T05:41:49Z".parse().unwrap(),
            transaction_hash: "h".to_string(),
            deployer_address: "G1".to_string(),
            contract_type: ContractType::Fairwage,
            strategy: "pattern-scan".to_string(),
        };

        let value = serde_json::to_value(&contract).unwrap();
        assert_eq!(value["contractId"], "C1");
        assert_eq!(value["companyName"], "Acme");
        assert_eq!(value["deploymentDate"], "2025-09-12T05:41:49Z");
        assert_eq!(value["contractType"], "fairwage");
        assert_eq!(value["tokenContractId"], "C2");
        assert!(value.get("tokenContract").is_none());
        assert_eq!(value["companyNameRecovered"], true);
        assert_eq!(value["tokenSymbolRecovered"], false);

        // Clients that predate the provenance flags still deserialize
        let mut legacy = value.clone();
        let object = legacy.as_object_mut().unwrap();
        object.remove("companyNameRecovered");
        object.remove("tokenSymbolRecovered");
        let parsed: DiscoveredContract = serde_json::from_value(legacy).unwrap();
        assert!(!parsed.company_name_recovered);
        assert_eq!(parsed.token_contract_id.as_deref(), Some("C2"));
    }
}
