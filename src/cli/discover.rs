//! Discovery commands.

use super::config::AppConfig;
use super::context::{build_api, cancel_on_ctrl_c, emit};
use fairwage_discovery::api::{DiscoverContractsRequest, DiscoverEmployeeContractsRequest};
use fairwage_discovery::discovery::DiscoveredContract;

/// Find contracts in a wallet's recent history.
///
/// With `promote`, each distinct contract found is also written into the
/// registry so later membership scans include it.
pub async fn contracts(
    config: &AppConfig,
    wallet: String,
    promote: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let api = build_api(config)?;
    let cancel = cancel_on_ctrl_c();

    let request = DiscoverContractsRequest {
        wallet_address: Some(wallet),
    };
    let reply = api.discover_contracts(request, &cancel).await;

    if promote && reply.is_success() {
        let found: Vec<DiscoveredContract> =
            serde_json::from_value(reply.body["contracts"].clone())?;
        api.promote_contracts(&found);
    }

    emit(reply)
}

/// Find registry contracts an employee belongs to.
pub async fn employee_contracts(
    config: &AppConfig,
    employee: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let api = build_api(config)?;
    let cancel = cancel_on_ctrl_c();

    let request = DiscoverEmployeeContractsRequest {
        employee_address: Some(employee),
    };
    emit(api.discover_employee_contracts(request, &cancel).await)
}

/// List contracts a wallet has interacted with.
pub async fn scan(config: &AppConfig, wallet: String) -> Result<(), Box<dyn std::error::Error>> {
    let api = build_api(config)?;
    let cancel = cancel_on_ctrl_c();

    let request = DiscoverContractsRequest {
        wallet_address: Some(wallet),
    };
    emit(api.scan_contracts(request, &cancel).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_malformed_wallet_fails_before_network() {
        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.registry.path = dir.path().join("known-contracts.json");
        // Unroutable endpoints: validation must reject before any request
        config.ledger.horizon_url = "http://127.0.0.1:9".to_string();
        config.ledger.rpc_url = "http://127.0.0.1:9".to_string();

        assert!(contracts(&config, "not-a-wallet".to_string(), false)
            .await
            .is_err());
        assert!(scan(&config, String::new()).await.is_err());
        assert!(employee_contracts(&config, "GSHORT".to_string())
            .await
            .is_err());
    }
}
