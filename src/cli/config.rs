//! Operator configuration file handling
//!
//! Provides default configuration generation and loading for the discovery
//! CLI. Configuration files are TOML and live under the user config
//! directory unless `--config` points elsewhere. A missing file means
//! built-in defaults.
//!
//! The probe account is configured here and nowhere else. It pays the fees
//! of simulated calls and must never be an employer or employee account.

use fairwage_discovery::discovery::DiscoveryConfig;
use fairwage_discovery::ledger::{HorizonConfig, MAX_PAGE_LIMIT};
use fairwage_discovery::membership::{
    VerifierConfig, DEFAULT_PARTICIPANT_FUNCTION, DEFAULT_PROBE_ACCOUNT,
};
use fairwage_discovery::strkey;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Default log level
const DEFAULT_LOG_LEVEL: &str = "info";

const DEFAULT_HORIZON_URL: &str = "https://horizon-testnet.stellar.org";
const DEFAULT_RPC_URL: &str = "https://soroban-testnet.stellar.org";

/// Discovery CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Ledger services
    #[serde(default)]
    pub ledger: LedgerSection,

    /// Known-contract registry
    #[serde(default)]
    pub registry: RegistrySection,

    /// Discovery tuning
    #[serde(default)]
    pub discovery: DiscoverySection,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Ledger service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSection {
    /// Horizon REST endpoint (history, operations, accounts)
    #[serde(default = "default_horizon_url")]
    pub horizon_url: String,

    /// Soroban RPC endpoint (simulation)
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Network label reported with results
    #[serde(default = "default_network")]
    pub network: String,

    /// Funded account paying simulated fees
    #[serde(default = "default_probe_account")]
    pub probe_account: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Fee in stroops written into simulated transactions
    #[serde(default = "default_base_fee")]
    pub base_fee: u32,
}

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySection {
    /// JSON registry file, relative to the working directory unless absolute
    #[serde(default = "default_registry_path")]
    pub path: PathBuf,
}

/// Discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySection {
    /// Transactions read when looking for deployed contracts (max 200)
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,

    /// Transactions read by the interaction scan
    #[serde(default = "default_scan_limit")]
    pub scan_limit: u32,

    #[serde(default = "default_max_concurrent_probes")]
    pub max_concurrent_probes: usize,

    #[serde(default = "default_fallback_token_symbol")]
    pub fallback_token_symbol: String,

    /// Contract function returning a participant record
    #[serde(default = "default_participant_function")]
    pub participant_function: String,

    /// Simulation failures containing any of these mean "not registered"
    #[serde(default = "default_not_found_markers")]
    pub not_found_markers: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_horizon_url() -> String {
    DEFAULT_HORIZON_URL.to_string()
}

fn default_rpc_url() -> String {
    DEFAULT_RPC_URL.to_string()
}

fn default_network() -> String {
    "testnet".to_string()
}

fn default_probe_account() -> String {
    DEFAULT_PROBE_ACCOUNT.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_base_fee() -> u32 {
    100_000
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("known-contracts.json")
}

fn default_history_limit() -> u32 {
    MAX_PAGE_LIMIT
}

fn default_scan_limit() -> u32 {
    100
}

fn default_max_concurrent_probes() -> usize {
    5
}

fn default_fallback_token_symbol() -> String {
    "TBU".to_string()
}

fn default_participant_function() -> String {
    DEFAULT_PARTICIPANT_FUNCTION.to_string()
}

fn default_not_found_markers() -> Vec<String> {
    VerifierConfig::default().not_found_markers
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self {
            horizon_url: default_horizon_url(),
            rpc_url: default_rpc_url(),
            network: default_network(),
            probe_account: default_probe_account(),
            request_timeout_secs: default_request_timeout_secs(),
            base_fee: default_base_fee(),
        }
    }
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            path: default_registry_path(),
        }
    }
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            scan_limit: default_scan_limit(),
            max_concurrent_probes: default_max_concurrent_probes(),
            fallback_token_symbol: default_fallback_token_symbol(),
            participant_function: default_participant_function(),
            not_found_markers: default_not_found_markers(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

        let config: AppConfig = toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;

        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, else the default location; a missing file
    /// yields defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file
    #[allow(dead_code)]
    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(path, contents)
            .map_err(|e| format!("Failed to write config file '{}': {}", path.display(), e))?;

        Ok(())
    }

    /// Reject settings that would make every query fail or misuse a party account
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if !strkey::is_account_address(&self.ledger.probe_account) {
            return Err(format!(
                "probe_account '{}' is not an account address",
                self.ledger.probe_account
            )
            .into());
        }
        if self.discovery.max_concurrent_probes == 0 {
            return Err("max_concurrent_probes must be at least 1".into());
        }
        if self.ledger.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be at least 1".into());
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.ledger.request_timeout_secs)
    }

    /// Connection settings for the production ledger client
    pub fn horizon_config(&self) -> Result<HorizonConfig, Box<dyn std::error::Error>> {
        let horizon_url = Url::parse(&self.ledger.horizon_url)
            .map_err(|e| format!("Invalid horizon_url '{}': {}", self.ledger.horizon_url, e))?;
        let rpc_url = Url::parse(&self.ledger.rpc_url)
            .map_err(|e| format!("Invalid rpc_url '{}': {}", self.ledger.rpc_url, e))?;

        Ok(HorizonConfig {
            horizon_url,
            rpc_url,
            request_timeout: self.request_timeout(),
            base_fee: self.ledger.base_fee,
        })
    }

    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            history_limit: self.discovery.history_limit.min(MAX_PAGE_LIMIT),
            scan_limit: self.discovery.scan_limit,
            request_timeout: self.request_timeout(),
            max_concurrent_probes: self.discovery.max_concurrent_probes,
            network: self.ledger.network.clone(),
            fallback_token_symbol: self.discovery.fallback_token_symbol.clone(),
        }
    }

    pub fn verifier_config(&self) -> VerifierConfig {
        VerifierConfig {
            function_name: self.discovery.participant_function.clone(),
            probe_account: self.ledger.probe_account.clone(),
            call_timeout: self.request_timeout(),
            not_found_markers: self.discovery.not_found_markers.clone(),
        }
    }

    /// Generate default configuration content as a string with comments
    pub fn generate_default_toml() -> String {
        format!(
            r#"# FairWage Discovery Configuration
#
# Settings for contract discovery and membership verification.
# Every key is optional; omitted keys take the values shown here.

[ledger]
# Horizon REST endpoint (transaction history, operations, accounts)
horizon_url = "{horizon}"

# Soroban RPC endpoint (read-only simulation)
rpc_url = "{rpc}"

# Network label reported with membership results
network = "testnet"

# Funded account that pays simulated-call fees.
# Must NEVER be an employer or employee account.
probe_account = "{probe}"

# Timeout for every ledger request, in seconds
request_timeout_secs = 30

# Fee written into simulated transactions, in stroops
base_fee = 100000

[registry]
# Known-contract registry (JSON), relative to the working directory
path = "known-contracts.json"

[discovery]
# Transactions scanned for deployed contracts (at most 200)
history_limit = 200

# Transactions scanned for contract interactions
scan_limit = 100

# Concurrent ledger calls per request
max_concurrent_probes = 5

# Token symbol used when a transaction memo names none
fallback_token_symbol = "TBU"

# Payroll contract function returning a participant record
participant_function = "{function}"

# Simulation errors containing any of these mean "not registered"
not_found_markers = ["not found", "not_found", "Error(Contract, #4)"]

[logging]
# Log level: trace, debug, info, warn, error (RUST_LOG overrides)
level = "info"
"#,
            horizon = DEFAULT_HORIZON_URL,
            rpc = DEFAULT_RPC_URL,
            probe = DEFAULT_PROBE_ACCOUNT,
            function = DEFAULT_PARTICIPANT_FUNCTION,
        )
    }

    /// Create and save a default configuration file
    pub fn create_default(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let contents = Self::generate_default_toml();

        // Create parent directory if needed
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(config_path, contents).map_err(|e| {
            format!(
                "Failed to write config file '{}': {}",
                config_path.display(),
                e
            )
        })?;

        Ok(())
    }
}

/// Get the default config file path
///
/// - Linux: ~/.config/fairwage-discovery/config.toml
/// - Falls back to ./fairwage-discovery/config.toml without a config dir
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fairwage-discovery")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.ledger.horizon_url, DEFAULT_HORIZON_URL);
        assert_eq!(config.ledger.probe_account, DEFAULT_PROBE_ACCOUNT);
        assert_eq!(config.registry.path, PathBuf::from("known-contracts.json"));
        assert_eq!(config.discovery.history_limit, 200);
        assert_eq!(config.discovery.fallback_token_symbol, "TBU");
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.ledger.network = "futurenet".to_string();
        config.save(&config_path).unwrap();

        let loaded = AppConfig::load(&config_path).unwrap();
        assert_eq!(loaded.ledger.network, "futurenet");
        assert_eq!(loaded.discovery.not_found_markers.len(), 3);
    }

    #[test]
    fn test_create_default_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        AppConfig::create_default(&config_path).unwrap();
        assert!(config_path.exists());

        // The commented template parses to the built-in defaults
        let config = AppConfig::load(&config_path).unwrap();
        let defaults = AppConfig::default();
        assert_eq!(config.ledger.rpc_url, defaults.ledger.rpc_url);
        assert_eq!(config.ledger.base_fee, defaults.ledger.base_fee);
        assert_eq!(
            config.discovery.not_found_markers,
            defaults.discovery.not_found_markers
        );
        assert_eq!(
            config.discovery.participant_function,
            defaults.discovery.participant_function
        );
    }

    #[test]
    fn test_load_config_with_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let minimal_config = r#"
[registry]
path = "/var/lib/fairwage/contracts.json"
"#;
        fs::write(&config_path, minimal_config).unwrap();

        let config = AppConfig::load(&config_path).unwrap();
        assert_eq!(
            config.registry.path,
            PathBuf::from("/var/lib/fairwage/contracts.json")
        );
        assert_eq!(config.ledger.request_timeout_secs, 30);
        assert_eq!(config.discovery.max_concurrent_probes, 5);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("absent.toml");

        let config = AppConfig::load_or_default(Some(&missing)).unwrap();
        assert_eq!(config.ledger.network, "testnet");
    }

    #[test]
    fn test_rejects_bad_probe_account() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "[ledger]\nprobe_account = \"nobody\"\n").unwrap();

        assert!(AppConfig::load(&config_path).is_err());
    }

    #[test]
    fn test_derived_library_configs() {
        let mut config = AppConfig::default();
        config.discovery.history_limit = 1000;
        config.ledger.request_timeout_secs = 5;

        let discovery = config.discovery_config();
        assert_eq!(discovery.history_limit, MAX_PAGE_LIMIT);
        assert_eq!(discovery.request_timeout, Duration::from_secs(5));

        let verifier = config.verifier_config();
        assert_eq!(verifier.function_name, "get_employee_info");
        assert_eq!(verifier.call_timeout, Duration::from_secs(5));

        let horizon = config.horizon_config().unwrap();
        assert_eq!(horizon.horizon_url.host_str(), Some("horizon-testnet.stellar.org"));

        config.ledger.rpc_url = "not a url".to_string();
        assert!(config.horizon_config().is_err());
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("fairwage-discovery/config.toml"));
    }
}
