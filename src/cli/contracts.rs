//! Registry administration commands.

use super::config::AppConfig;
use super::context::{build_api, emit};
use fairwage_discovery::api::RegisterContractRequest;

/// Add or update a registry contract.
pub fn register(
    config: &AppConfig,
    request: RegisterContractRequest,
) -> Result<(), Box<dyn std::error::Error>> {
    emit(build_api(config)?.register_contract(request))
}

/// Hide a contract from listings.
pub fn deactivate(config: &AppConfig, contract_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    emit(build_api(config)?.deactivate_contract(contract_id))
}

/// Print active registry contracts.
pub fn list(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    emit(build_api(config)?.list_contracts())
}

/// Print registry size and network.
pub fn health(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    emit(build_api(config)?.health())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fairwage_discovery::registry::RegistryStore;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> AppConfig {
        let mut config = AppConfig::default();
        config.registry.path = dir.path().join("known-contracts.json");
        config
    }

    #[test]
    fn test_register_then_deactivate() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let id = format!("C{}", "A".repeat(55));

        register(
            &config,
            RegisterContractRequest {
                contract_id: Some(id.clone()),
                company_name: Some("Acme".to_string()),
                token_symbol: Some("ACM".to_string()),
                token_contract: None,
            },
        )
        .unwrap();
        assert_eq!(RegistryStore::open(&config.registry.path).list().len(), 1);

        deactivate(&config, &id).unwrap();
        assert!(RegistryStore::open(&config.registry.path).list().is_empty());

        // Unknown id is a failed command
        assert!(deactivate(&config, &format!("C{}", "Z".repeat(55))).is_err());
    }

    #[test]
    fn test_register_rejects_missing_name() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);

        let result = register(
            &config,
            RegisterContractRequest {
                contract_id: Some(format!("C{}", "A".repeat(55))),
                ..Default::default()
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_list_and_health_on_empty_registry() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        assert!(list(&config).is_ok());
        assert!(health(&config).is_ok());
    }
}
