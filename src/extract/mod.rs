//! Identifier Extractor - recover contract identity from raw transactions.
//!
//! Used when a contract is not in the registry: given a transaction and one
//! of its operations, try each [`ExtractionStrategy`] in rank order and
//! keep the first address recovered.
//!
//! ## Ranking
//!
//! 1. [`ResultDecodeStrategy`]: structured transaction-result decode
//! 2. [`OperationDecodeStrategy`]: address fields on the operation itself
//! 3. [`PatternScanStrategy`]: contract-shaped substrings in raw payloads
//!
//! Only the first is structurally sound. The other two are heuristics and
//! can misattribute.
//!
//! ## Token contract
//!
//! When strategy 1 or 2 wins it recovers no token contract, so the second
//! distinct pattern-scan match is used, provided it differs from the
//! contract. This is a heuristic carried over from how payroll deployments
//! order their invocation arguments, not a guaranteed mapping.

pub mod memo;
pub mod strategies;

pub use memo::ContractType;
pub use strategies::{
    default_strategies, ExtractedIdentity, ExtractionStrategy, OperationDecodeStrategy,
    PatternScanStrategy, ResultDecodeStrategy,
};

use crate::ledger::{RawOperation, RawTransaction};
use tracing::trace;

/// A contract recovered from one operation.
///
/// Name and symbol are only set when the transaction memo carries them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCandidate {
    pub contract_id: String,
    pub token_contract_id: Option<String>,
    pub company_name: Option<String>,
    pub token_symbol: Option<String>,
    pub contract_type: ContractType,
    /// Name of the strategy that recovered the address
    pub strategy: &'static str,
}

/// Runs the ranked strategies and attaches memo metadata.
pub struct IdentifierExtractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl Default for IdentifierExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentifierExtractor {
    /// Extractor with the default ranking.
    pub fn new() -> Self {
        Self::with_strategies(default_strategies())
    }

    /// Extractor with a custom ranking, tried in the given order.
    pub fn with_strategies(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Recover a candidate, or `None` if no strategy finds an address.
    pub fn extract(&self, tx: &RawTransaction, op: &RawOperation) -> Option<ContractCandidate> {
        let (strategy, identity) = self.strategies.iter().find_map(|strategy| {
            strategy
                .extract(tx, op)
                .map(|identity| (strategy.name(), identity))
        })?;

        trace!(
            tx = %tx.hash,
            contract_id = %identity.contract_id,
            strategy,
            "recovered contract address"
        );

        let token_contract_id = identity
            .token_contract_id
            .or_else(|| token_from_pattern_scan(tx, &identity.contract_id));

        Some(ContractCandidate {
            token_contract_id,
            company_name: memo::company_name(tx),
            token_symbol: memo::token_symbol(tx),
            contract_type: memo::classify(tx, op),
            contract_id: identity.contract_id,
            strategy,
        })
    }
}

fn token_from_pattern_scan(tx: &RawTransaction, contract_id: &str) -> Option<String> {
    strategies::pattern_matches(tx)
        .into_iter()
        .nth(1)
        .filter(|token| token != contract_id)
}

impl std::fmt::Debug for IdentifierExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.strategies.iter().map(|s| s.name()).collect();
        f.debug_struct("IdentifierExtractor")
            .field("strategies", &names)
            .finish()
    }
}
