//! Metadata recovered from transaction memos.

use crate::ledger::{RawOperation, RawTransaction};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Keywords that mark a memo as belonging to a payroll contract.
const PAYROLL_KEYWORDS: [&str; 3] = ["fairwage", "wage", "payroll"];

fn symbol_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b[A-Z]{3,4}\b").expect("valid symbol pattern"))
}

/// Contract classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractType {
    /// A payroll contract
    Fairwage,
    Unclassified,
}

/// Company name from a text memo of plausible display-name length (4-49 chars).
pub fn company_name(tx: &RawTransaction) -> Option<String> {
    let memo = tx.memo_text()?;
    let len = memo.chars().count();
    (4..50).contains(&len).then(|| memo.to_string())
}

/// First short all-uppercase word of a text memo.
pub fn token_symbol(tx: &RawTransaction) -> Option<String> {
    let memo = tx.memo_text()?;
    symbol_pattern().find(memo).map(|m| m.as_str().to_string())
}

/// Payroll if the memo names it, or if the operation deploys a contract.
pub fn classify(tx: &RawTransaction, op: &RawOperation) -> ContractType {
    let memo_says_payroll = tx.memo_text().is_some_and(|memo| {
        let memo = memo.to_lowercase();
        PAYROLL_KEYWORDS.iter().any(|k| memo.contains(k))
    });

    if memo_says_payroll || op.is_contract_creation() {
        ContractType::Fairwage
    } else {
        ContractType::Unclassified
    }
}
