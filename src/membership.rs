//! Membership Verifier - is an account registered in a payroll contract?
//!
//! Membership is read from the contract itself by simulating its
//! participant-info function against the probe account. Three outcomes are
//! kept apart:
//!
//! - **Registered**: the call returned a participant record not marked inactive
//! - **Not registered**: the contract said so ("not found"), or the contract
//!   id is malformed
//! - **Inconclusive**: anything else; callers must skip, never read it as `false`

use crate::ledger::{LedgerClient, LedgerError, ReadCall, ScArg, SimulationResult};
use crate::strkey;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Default participant-info function of the payroll contract.
pub const DEFAULT_PARTICIPANT_FUNCTION: &str = "get_employee_info";

/// Dedicated testnet account used only to pay simulated fees.
pub const DEFAULT_PROBE_ACCOUNT: &str = "GBIFUPL4MOPI5XHPFKYO4SWTKKLSK63GZVMQ5A2FX3TLCS74NJ55QAZD";

/// Membership errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MembershipError {
    /// Registration status could not be determined.
    #[error("Inconclusive membership check for {contract_id}: {reason}")]
    Inconclusive { contract_id: String, reason: String },
}

impl MembershipError {
    fn inconclusive(contract_id: &str, reason: impl Into<String>) -> Self {
        MembershipError::Inconclusive {
            contract_id: contract_id.to_string(),
            reason: reason.into(),
        }
    }
}

/// Verifier configuration.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Contract function returning a participant record
    pub function_name: String,

    /// Fee-paying account for simulations; never a real party
    pub probe_account: String,

    /// Upper bound on a single simulated call
    pub call_timeout: Duration,

    /// Case-insensitive markers of a "participant not found" failure
    pub not_found_markers: Vec<String>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            function_name: DEFAULT_PARTICIPANT_FUNCTION.to_string(),
            probe_account: DEFAULT_PROBE_ACCOUNT.to_string(),
            call_timeout: Duration::from_secs(30),
            not_found_markers: vec![
                "not found".to_string(),
                "not_found".to_string(),
                // EmployeeNotFound
                "Error(Contract, #4)".to_string(),
            ],
        }
    }
}

/// A determined membership status.
#[derive(Debug, Clone, PartialEq)]
pub enum Membership {
    /// Registered, with the participant record the contract returned.
    Registered { participant: Value },
    NotRegistered,
}

impl Membership {
    pub fn is_registered(&self) -> bool {
        matches!(self, Membership::Registered { .. })
    }
}

/// Verifies contract membership through read-only simulation.
pub struct MembershipVerifier<L: LedgerClient> {
    ledger: Arc<L>,
    config: VerifierConfig,
}

impl<L: LedgerClient> MembershipVerifier<L> {
    pub fn new(ledger: Arc<L>, config: VerifierConfig) -> Self {
        Self { ledger, config }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Whether `account` is registered in `contract_id`.
    ///
    /// # Returns
    ///
    /// - `Ok(false)` for a malformed contract id (no call is made) or a
    ///   confirmed absence
    /// - `Err(Inconclusive)` when the status cannot be determined
    pub async fn is_registered(
        &self,
        account: &str,
        contract_id: &str,
    ) -> Result<bool, MembershipError> {
        self.check(account, contract_id)
            .await
            .map(|membership| membership.is_registered())
    }

    /// Full membership check, keeping the participant record.
    pub async fn check(
        &self,
        account: &str,
        contract_id: &str,
    ) -> Result<Membership, MembershipError> {
        if !strkey::is_contract_address(contract_id) {
            warn!(contract_id = %contract_id, "invalid contract id, skipping membership check");
            return Ok(Membership::NotRegistered);
        }

        if account == self.config.probe_account {
            return Err(MembershipError::inconclusive(
                contract_id,
                "account is the probe account",
            ));
        }

        let call = ReadCall {
            contract_id: contract_id.to_string(),
            function_name: self.config.function_name.clone(),
            args: vec![ScArg::Address(account.to_string())],
            fee_account: self.config.probe_account.clone(),
        };

        let result = match tokio::time::timeout(
            self.config.call_timeout,
            self.ledger.simulate_read_call(&call),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => SimulationResult::TransportFailure {
                error: LedgerError::Timeout(self.config.call_timeout),
            },
        };

        match result {
            SimulationResult::Success { decoded_value } => {
                let registered = is_active_participant(&decoded_value);
                debug!(contract_id = %contract_id, registered, "participant record read");
                Ok(if registered {
                    Membership::Registered {
                        participant: decoded_value,
                    }
                } else {
                    Membership::NotRegistered
                })
            }
            SimulationResult::LogicalFailure { reason } if self.is_not_found(&reason) => {
                debug!(contract_id = %contract_id, "participant not found");
                Ok(Membership::NotRegistered)
            }
            SimulationResult::LogicalFailure { reason } => {
                Err(MembershipError::inconclusive(contract_id, reason))
            }
            SimulationResult::TransportFailure { error } => {
                Err(MembershipError::inconclusive(contract_id, error.to_string()))
            }
        }
    }

    fn is_not_found(&self, reason: &str) -> bool {
        let reason = reason.to_lowercase();
        self.config
            .not_found_markers
            .iter()
            .any(|marker| reason.contains(&marker.to_lowercase()))
    }
}

/// Present and not explicitly inactive.
fn is_active_participant(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Object(fields) => fields.get("active") != Some(&Value::Bool(false)),
        _ => true,
    }
}
