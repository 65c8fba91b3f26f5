//! Request/response envelopes for discovery consumers.
//!
//! Every handler returns an [`ApiReply`]: an HTTP-style status plus a JSON
//! body. Successful bodies carry `success: true`; failures use the uniform
//! `{success: false, error, details?}` envelope.
//!
//! | Failure | Status |
//! |---|---|
//! | invalid top-level input | 400 |
//! | unknown contract on deactivate | 404 |
//! | registry persistence failure | 500 |
//! | ledger unreachable on the first call | 502 |
//! | request cancelled | 503 |

use crate::discovery::{DiscoveredContract, DiscoveryError, DiscoveryOrchestrator};
use crate::ledger::LedgerClient;
use crate::registry::{ContractRegistration, RegistryError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Note attached to interaction-scan results.
pub const UNVERIFIED_NOTE: &str =
    "Contracts this wallet has interacted with. Verify each one before relying on it.";

/// Status and JSON body of a handled request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiReply {
    pub status: u16,
    pub body: Value,
}

impl ApiReply {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn failure(status: u16, error: &str, details: Option<String>) -> Self {
        let mut body = json!({ "success": false, "error": error });
        if let Some(details) = details {
            body["details"] = Value::String(details);
        }
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverContractsRequest {
    pub wallet_address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverEmployeeContractsRequest {
    pub employee_address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterContractRequest {
    pub contract_id: Option<String>,
    pub company_name: Option<String>,
    pub token_symbol: Option<String>,
    pub token_contract: Option<String>,
}

/// Consumer-facing discovery operations.
pub struct DiscoveryApi<L: LedgerClient> {
    orchestrator: Arc<DiscoveryOrchestrator<L>>,
}

impl<L: LedgerClient> Clone for DiscoveryApi<L> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: self.orchestrator.clone(),
        }
    }
}

impl<L: LedgerClient> DiscoveryApi<L> {
    pub fn new(orchestrator: Arc<DiscoveryOrchestrator<L>>) -> Self {
        Self { orchestrator }
    }

    /// `discover-contracts {walletAddress}`
    pub async fn discover_contracts(
        &self,
        request: DiscoverContractsRequest,
        cancel: &CancellationToken,
    ) -> ApiReply {
        let Some(wallet) = non_empty(request.wallet_address) else {
            return ApiReply::failure(400, "Wallet address is required", None);
        };

        match self.orchestrator.discover_deployed_by(&wallet, cancel).await {
            Ok(report) => ApiReply::ok(json!({
                "success": true,
                "contracts": report.items,
                "totalFound": report.items.len(),
                "walletAddress": wallet,
                "skipped": report.skipped,
            })),
            Err(e) => discovery_failure("Failed to discover contracts", e),
        }
    }

    /// `discover-employee-contracts {employeeAddress}`
    pub async fn discover_employee_contracts(
        &self,
        request: DiscoverEmployeeContractsRequest,
        cancel: &CancellationToken,
    ) -> ApiReply {
        let Some(employee) = non_empty(request.employee_address) else {
            return ApiReply::failure(400, "Employee address is required", None);
        };

        match self
            .orchestrator
            .discover_membership_of(&employee, cancel)
            .await
        {
            Ok(report) => ApiReply::ok(json!({
                "success": true,
                "contracts": report.items,
                "employeeAddress": employee,
                "skipped": report.skipped,
            })),
            Err(e) => discovery_failure("Failed to discover employee contracts", e),
        }
    }

    /// `scan-fairwage-contracts {walletAddress}`
    pub async fn scan_contracts(
        &self,
        request: DiscoverContractsRequest,
        cancel: &CancellationToken,
    ) -> ApiReply {
        let Some(wallet) = non_empty(request.wallet_address) else {
            return ApiReply::failure(400, "Wallet address is required", None);
        };

        match self.orchestrator.scan_interactions(&wallet, cancel).await {
            Ok(report) => ApiReply::ok(json!({
                "success": true,
                "contracts": report.items,
                "totalFound": report.items.len(),
                "walletAddress": wallet,
                "note": UNVERIFIED_NOTE,
            })),
            Err(e) => discovery_failure("Failed to scan contracts", e),
        }
    }

    /// Register a contract by hand.
    pub fn register_contract(&self, request: RegisterContractRequest) -> ApiReply {
        let registration = ContractRegistration {
            id: request.contract_id,
            name: request.company_name,
            token_symbol: request.token_symbol,
            token_contract: request.token_contract,
            active: Some(true),
        };

        match self.orchestrator.registry().upsert(registration) {
            Ok(record) => ApiReply::ok(json!({
                "success": true,
                "message": "Contract added to registry",
                "contract": record,
            })),
            Err(e) => registry_failure("Failed to register contract", e),
        }
    }

    /// Write discovered contracts back into the registry.
    ///
    /// Only the first sighting of each contract id is written, which for a
    /// newest-first history scan is the latest one.
    ///
    /// # Returns
    ///
    /// Number of records written.
    pub fn promote_contracts(&self, found: &[DiscoveredContract]) -> usize {
        let mut seen = HashSet::new();
        let mut written = 0;

        for contract in found.iter().filter(|c| seen.insert(c.contract_id.as_str())) {
            match self.orchestrator.promote(contract) {
                Ok(_) => written += 1,
                Err(e) => {
                    warn!(contract_id = %contract.contract_id, error = %e, "promotion failed")
                }
            }
        }

        info!(promoted = written, "discovered contracts written to registry");
        written
    }

    /// Hide a contract from listings and membership scans.
    pub fn deactivate_contract(&self, contract_id: &str) -> ApiReply {
        match self.orchestrator.registry().deactivate(contract_id) {
            Ok(true) => ApiReply::ok(json!({
                "success": true,
                "contractId": contract_id,
            })),
            Ok(false) => ApiReply::failure(
                404,
                "Contract not found",
                Some(format!("no registry record for {}", contract_id)),
            ),
            Err(e) => registry_failure("Failed to deactivate contract", e),
        }
    }

    /// Active registry records.
    pub fn list_contracts(&self) -> ApiReply {
        let contracts = self.orchestrator.registry().list();
        ApiReply::ok(json!({
            "success": true,
            "count": contracts.len(),
            "contracts": contracts,
        }))
    }

    pub fn health(&self) -> ApiReply {
        ApiReply::ok(json!({
            "status": "ok",
            "registryContracts": self.orchestrator.registry().active_count(),
            "network": self.orchestrator.config().network,
        }))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn discovery_failure(context: &str, e: DiscoveryError) -> ApiReply {
    let status = match &e {
        DiscoveryError::Validation(_) => 400,
        DiscoveryError::Ledger(_) => 502,
        DiscoveryError::Cancelled => 503,
        DiscoveryError::Registry(RegistryError::Validation(_)) => 400,
        DiscoveryError::Registry(_) => 500,
    };
    if status >= 500 {
        error!(error = %e, "{}", context);
    }
    ApiReply::failure(status, context, Some(e.to_string()))
}

fn registry_failure(context: &str, e: RegistryError) -> ApiReply {
    let status = match e {
        RegistryError::Validation(_) => 400,
        RegistryError::Persist { .. } | RegistryError::Serialize(_) => 500,
    };
    ApiReply::failure(status, context, Some(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::DiscoveryConfig;
    use crate::ledger::{LedgerError, MockLedgerClient};
    use crate::membership::VerifierConfig;
    use crate::registry::RegistryStore;
    use tempfile::TempDir;

    const WALLET: &str = "GBIFUPL4MOPI5XHPFKYO4SWTKKLSK63GZVMQ5A2FX3TLCS74NJ55QAZA";

    fn contract(c: char) -> String {
        format!("C{}", c.to_string().repeat(55))
    }

    fn api() -> (TempDir, MockLedgerClient, DiscoveryApi<MockLedgerClient>) {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(RegistryStore::open(dir.path().join("known-contracts.json")));
        let client = MockLedgerClient::new();
        let orchestrator = DiscoveryOrchestrator::new(
            Arc::new(client.clone()),
            registry,
            DiscoveryConfig::default(),
            VerifierConfig::default(),
        );
        (dir, client, DiscoveryApi::new(Arc::new(orchestrator)))
    }

    #[tokio::test]
    async fn test_missing_wallet_is_400() {
        let (_dir, client, api) = api();
        let reply = api
            .discover_contracts(DiscoverContractsRequest::default(), &CancellationToken::new())
            .await;

        assert_eq!(reply.status, 400);
        assert_eq!(
            reply.body,
            json!({"success": false, "error": "Wallet address is required"})
        );
        assert_eq!(client.history_calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_wallet_is_400_with_details() {
        let (_dir, _client, api) = api();
        let request = DiscoverContractsRequest {
            wallet_address: Some("hello".to_string()),
        };
        let reply = api.discover_contracts(request, &CancellationToken::new()).await;

        assert_eq!(reply.status, 400);
        assert_eq!(reply.body["success"], false);
        assert!(reply.body["details"].as_str().unwrap().contains("hello"));
    }

    #[tokio::test]
    async fn test_empty_history_is_success() {
        let (_dir, _client, api) = api();
        let request = DiscoverContractsRequest {
            wallet_address: Some(WALLET.to_string()),
        };
        let reply = api.discover_contracts(request, &CancellationToken::new()).await;

        assert_eq!(reply.status, 200);
        assert_eq!(reply.body["success"], true);
        assert_eq!(reply.body["totalFound"], 0);
        assert_eq!(reply.body["walletAddress"], WALLET);
    }

    #[tokio::test]
    async fn test_unreachable_ledger_is_502() {
        let (_dir, client, api) = api();
        client.fail_history(WALLET, LedgerError::Timeout(std::time::Duration::from_secs(30)));

        let request = DiscoverContractsRequest {
            wallet_address: Some(WALLET.to_string()),
        };
        let reply = api.scan_contracts(request, &CancellationToken::new()).await;
        assert_eq!(reply.status, 502);
        assert_eq!(reply.body["error"], "Failed to scan contracts");
    }

    #[tokio::test]
    async fn test_cancelled_is_503() {
        let (_dir, _client, api) = api();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let request = DiscoverEmployeeContractsRequest {
            employee_address: Some(WALLET.to_string()),
        };
        let reply = api.discover_employee_contracts(request, &cancel).await;
        assert_eq!(reply.status, 503);
    }

    #[test]
    fn test_register_list_deactivate() {
        let (_dir, _client, api) = api();

        let reply = api.register_contract(RegisterContractRequest {
            contract_id: Some(contract('A')),
            company_name: Some("Acme".to_string()),
            token_symbol: Some("ACM".to_string()),
            token_contract: Some(contract('B')),
        });
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body["contract"]["name"], "Acme");

        let listed = api.list_contracts();
        assert_eq!(listed.body["count"], 1);
        assert_eq!(listed.body["contracts"][0]["tokenContract"], contract('B'));

        assert_eq!(api.health().body["registryContracts"], 1);

        assert_eq!(api.deactivate_contract(&contract('A')).status, 200);
        assert_eq!(api.list_contracts().body["count"], 0);
        assert_eq!(api.deactivate_contract(&contract('Z')).status, 404);
    }

    #[test]
    fn test_promote_contracts_keeps_first_sighting() {
        let (_dir, _client, api) = api();
        let discovered = |c: char, name: &str| DiscoveredContract {
            contract_id: contract(c),
            token_contract_id: None,
            company_name: name.to_string(),
            token_symbol: "TBU".to_string(),
            company_name_recovered: true,
            token_symbol_recovered: false,
            deployment_date: chrono::Utc::now(),
            transaction_hash: "h".to_string(),
            deployer_address: WALLET.to_string(),
            contract_type: crate::extract::ContractType::Fairwage,
            strategy: "result-decode".to_string(),
        };

        let found = vec![
            discovered('A', "Newest Name"),
            discovered('A', "Older Name"),
            discovered('B', "Beta"),
            discovered('!', "Malformed"),
        ];

        assert_eq!(api.promote_contracts(&found), 2);
        let listed = api.list_contracts();
        assert_eq!(listed.body["count"], 2);
        assert_eq!(listed.body["contracts"][0]["name"], "Newest Name");
    }

    #[test]
    fn test_register_requires_id_and_name() {
        let (_dir, _client, api) = api();
        let reply = api.register_contract(RegisterContractRequest {
            contract_id: Some(contract('A')),
            ..Default::default()
        });
        assert_eq!(reply.status, 400);
        assert_eq!(reply.body["success"], false);
    }

    #[test]
    fn test_request_deserialization() {
        let request: DiscoverContractsRequest =
            serde_json::from_str(&format!(r#"{{"walletAddress": "{}"}}"#, WALLET)).unwrap();
        assert_eq!(request.wallet_address.as_deref(), Some(WALLET));

        let request: RegisterContractRequest =
            serde_json::from_str(r#"{"contractId": "C1", "companyName": "Acme"}"#).unwrap();
        assert_eq!(request.company_name.as_deref(), Some("Acme"));
        assert_eq!(request.token_contract, None);
    }

    #[test]
    fn test_health_shape() {
        let (_dir, _client, api) = api();
        assert_eq!(
            api.health().body,
            json!({"status": "ok", "registryContracts": 0, "network": "testnet"})
        );
    }
}
