//! Contract discovery.
//!
//! Two read-only, idempotent queries:
//!
//! - **Deployed by**: which contracts does a wallet's history show it
//!   deploying or invoking ([`DiscoveryOrchestrator::discover_deployed_by`])
//! - **Member of**: which registry contracts list an account as a
//!   participant ([`DiscoveryOrchestrator::discover_membership_of`])
//!
//! plus an operation-level interaction scan and registry write-back.

pub mod orchestrator;
pub mod report;

pub use orchestrator::DiscoveryOrchestrator;
pub use report::{
    BatchReport, DiscoveredContract, InteractedContract, MembershipMatch, SkipReason, Skipped,
};

use crate::ledger::{LedgerError, MAX_PAGE_LIMIT};
use crate::registry::RegistryError;
use std::time::Duration;
use thiserror::Error;

/// Discovery errors. Per-item failures never surface here.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Ledger unavailable: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Discovery cancelled")]
    Cancelled,

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Result type for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Discovery configuration.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Transactions read by the deployed-by scan (at most 200)
    pub history_limit: u32,

    /// Transactions read by the interaction scan
    pub scan_limit: u32,

    /// Bound on every history or operations fetch
    pub request_timeout: Duration,

    /// Concurrent per-item ledger calls
    pub max_concurrent_probes: usize,

    /// Network label attached to membership results
    pub network: String,

    /// Token symbol used when a memo names none
    pub fallback_token_symbol: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            history_limit: MAX_PAGE_LIMIT,
            scan_limit: 100,
            request_timeout: Duration::from_secs(30),
            max_concurrent_probes: 5,
            network: "testnet".to_string(),
            fallback_token_symbol: "TBU".to_string(),
        }
    }
}
