//! Ranked contract-address recovery strategies.
//!
//! Each strategy looks at one (transaction, operation) pair and either
//! recovers a contract address or declines. Strategies never fail: an
//! undecodable payload is simply "no candidate".

use crate::ledger::xdr;
use crate::ledger::{RawOperation, RawTransaction};
use crate::strkey;
use regex::Regex;
use std::sync::OnceLock;

/// Contract address as it appears inside text or base64 payloads.
fn contract_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"C[A-Z0-9]{55}").expect("valid contract pattern"))
}

/// What a strategy recovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedIdentity {
    pub contract_id: String,
    pub token_contract_id: Option<String>,
}

impl ExtractedIdentity {
    fn contract(contract_id: String) -> Self {
        Self {
            contract_id,
            token_contract_id: None,
        }
    }
}

/// One way of recovering a contract address.
pub trait ExtractionStrategy: Send + Sync {
    /// Short stable name, recorded on every candidate this strategy produces.
    fn name(&self) -> &'static str;

    fn extract(&self, tx: &RawTransaction, op: &RawOperation) -> Option<ExtractedIdentity>;
}

/// Strategy 1: read the address returned by a successful host-function
/// invocation, e.g. the id of a contract created by the transaction.
///
/// The result XDR only carries a hash of the return value, so the value is
/// read from the transaction meta. Without meta, or when the invocation
/// returned anything other than a contract address, the strategy declines.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResultDecodeStrategy;

impl ExtractionStrategy for ResultDecodeStrategy {
    fn name(&self) -> &'static str {
        "result-decode"
    }

    fn extract(&self, tx: &RawTransaction, _op: &RawOperation) -> Option<ExtractedIdentity> {
        let meta = tx.result_meta_xdr.as_deref()?;
        if tx.result_xdr.is_empty() {
            return None;
        }
        xdr::returned_contract_address(&tx.result_xdr, meta)
            .ok()
            .flatten()
            .map(ExtractedIdentity::contract)
    }
}

/// Strategy 2: address-shaped fields already present on the operation.
///
/// Checked in order: the operation source account, the decoded host-function
/// parameters, then the raw function-parameter payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct OperationDecodeStrategy;

impl OperationDecodeStrategy {
    fn from_parameters(op: &RawOperation) -> Option<String> {
        op.parameters.iter().find_map(|param| {
            let value = param.value.trim();
            if strkey::is_contract_address(value) {
                return Some(value.to_string());
            }
            match xdr::decode_sc_val_base64(value) {
                Ok(serde_json::Value::String(decoded)) if strkey::is_contract_address(&decoded) => {
                    Some(decoded)
                }
                _ => None,
            }
        })
    }

    fn from_parameter_blob(op: &RawOperation) -> Option<String> {
        let blob = op.function_parameters_xdr.as_deref()?;
        xdr::parameter_contract_addresses(blob)
            .into_iter()
            .next()
            .or_else(|| {
                contract_pattern()
                    .find(blob)
                    .map(|m| m.as_str().to_string())
            })
    }
}

impl ExtractionStrategy for OperationDecodeStrategy {
    fn name(&self) -> &'static str {
        "operation-decode"
    }

    fn extract(&self, _tx: &RawTransaction, op: &RawOperation) -> Option<ExtractedIdentity> {
        op.source_account
            .as_deref()
            .filter(|source| strkey::is_contract_address(source))
            .map(str::to_string)
            .or_else(|| Self::from_parameters(op))
            .or_else(|| Self::from_parameter_blob(op))
            .map(ExtractedIdentity::contract)
    }
}

/// Strategy 3: scan the raw envelope and result for contract-shaped
/// substrings. First match is the contract, second distinct match is taken
/// as its token contract.
///
/// No correctness guarantee: the caller's own addresses or unrelated
/// contracts can match.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternScanStrategy;

impl ExtractionStrategy for PatternScanStrategy {
    fn name(&self) -> &'static str {
        "pattern-scan"
    }

    fn extract(&self, tx: &RawTransaction, _op: &RawOperation) -> Option<ExtractedIdentity> {
        let mut matches = pattern_matches(tx).into_iter();
        let contract_id = matches.next()?;
        Some(ExtractedIdentity {
            contract_id,
            token_contract_id: matches.next(),
        })
    }
}

/// Distinct contract addresses found in a transaction's raw payloads.
///
/// Textual matches over the envelope then the result; when there are none,
/// the contract addresses referenced by the decoded envelope's invocations.
pub fn pattern_matches(tx: &RawTransaction) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for blob in [&tx.envelope_xdr, &tx.result_xdr] {
        for m in contract_pattern().find_iter(blob) {
            push_unique(&mut found, m.as_str());
        }
    }

    if found.is_empty() && !tx.envelope_xdr.is_empty() {
        for address in xdr::envelope_contract_addresses(&tx.envelope_xdr).unwrap_or_default() {
            push_unique(&mut found, &address);
        }
    }

    found
}

fn push_unique(found: &mut Vec<String>, address: &str) {
    if !found.iter().any(|a| a == address) {
        found.push(address.to_string());
    }
}

/// The default ranking, strongest first.
pub fn default_strategies() -> Vec<Box<dyn ExtractionStrategy>> {
    vec![
        Box::new(ResultDecodeStrategy),
        Box::new(OperationDecodeStrategy),
        Box::new(PatternScanStrategy),
    ]
}
