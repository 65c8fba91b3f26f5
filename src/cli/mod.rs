use clap::{Parser, Subcommand};
use fairwage_discovery::api::RegisterContractRequest;
use std::path::PathBuf;

pub mod config;
pub mod context;
pub mod contracts;
pub mod discover;
pub mod version;

use config::{default_config_path, AppConfig};

#[derive(Parser)]
#[command(name = "fairwage-discovery")]
#[command(author = "FairWage Project")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Discover FairWage payroll contracts and verify membership", long_about = None)]
pub struct Cli {
    /// Path to config file (default: ~/.config/fairwage-discovery/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Find contracts in an employer wallet's recent history
    DiscoverContracts {
        /// Employer wallet address (G...)
        #[arg(long)]
        wallet: String,

        /// Write every contract found into the registry
        #[arg(long)]
        promote: bool,
    },

    /// Find registry contracts an employee is registered in
    DiscoverEmployeeContracts {
        /// Employee wallet address (G...)
        #[arg(long)]
        employee: String,
    },

    /// List contracts a wallet has interacted with (unverified)
    ScanContracts {
        /// Wallet address (G...)
        #[arg(long)]
        wallet: String,
    },

    /// Add or update a contract in the registry
    Register {
        /// Contract address (C...)
        #[arg(long)]
        contract_id: String,

        /// Company name shown to employees
        #[arg(long)]
        name: String,

        /// Payout token symbol
        #[arg(long)]
        token_symbol: Option<String>,

        /// Payout token contract address (C...)
        #[arg(long)]
        token_contract: Option<String>,
    },

    /// Hide a contract from listings and membership scans
    Deactivate {
        /// Contract address (C...)
        #[arg(long)]
        contract_id: String,
    },

    /// List active registry contracts
    List,

    /// Show registry size and network
    Health,

    /// Write a default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Display version information
    Version,
}

pub async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = cli.config.unwrap_or_else(default_config_path);

    match cli.command {
        Commands::Version => {
            version::execute();
            return Ok(());
        }
        Commands::InitConfig { force } => return init_config(&config_path, force),
        _ => {}
    }

    let config = AppConfig::load_or_default(Some(&config_path))?;
    context::init_tracing(&config.logging.level);

    match cli.command {
        Commands::DiscoverContracts { wallet, promote } => {
            discover::contracts(&config, wallet, promote).await
        }
        Commands::DiscoverEmployeeContracts { employee } => {
            discover::employee_contracts(&config, employee).await
        }
        Commands::ScanContracts { wallet } => discover::scan(&config, wallet).await,
        Commands::Register {
            contract_id,
            name,
            token_symbol,
            token_contract,
        } => contracts::register(
            &config,
            RegisterContractRequest {
                contract_id: Some(contract_id),
                company_name: Some(name),
                token_symbol,
                token_contract,
            },
        ),
        Commands::Deactivate { contract_id } => contracts::deactivate(&config, &contract_id),
        Commands::List => contracts::list(&config),
        Commands::Health => contracts::health(&config),
        Commands::InitConfig { .. } | Commands::Version => Ok(()),
    }
}

fn init_config(path: &std::path::Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() && !force {
        return Err(format!(
            "Config file '{}' already exists (use --force to overwrite)",
            path.display()
        )
        .into());
    }

    AppConfig::create_default(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const WALLET: &str = "GBIFUPL4MOPI5XHPFKYO4SWTKKLSK63GZVMQ5A2FX3TLCS74NJ55QAZD";

    #[test]
    fn test_cli_parse_discover_contracts() {
        let cli = Cli::parse_from(["fairwage-discovery", "discover-contracts", "--wallet", WALLET]);

        assert_eq!(cli.config, None);
        match cli.command {
            Commands::DiscoverContracts { wallet, promote } => {
                assert_eq!(wallet, WALLET);
                assert!(!promote);
            }
            _ => panic!("Expected DiscoverContracts command"),
        }
    }

    #[test]
    fn test_cli_parse_global_config_after_subcommand() {
        let cli = Cli::parse_from([
            "fairwage-discovery",
            "discover-employee-contracts",
            "--employee",
            WALLET,
            "--config",
            "/etc/fairwage/config.toml",
        ]);

        assert_eq!(cli.config, Some(PathBuf::from("/etc/fairwage/config.toml")));
        match cli.command {
            Commands::DiscoverEmployeeContracts { employee } => assert_eq!(employee, WALLET),
            _ => panic!("Expected DiscoverEmployeeContracts command"),
        }
    }

    #[test]
    fn test_cli_parse_register_with_all_options() {
        let contract = format!("C{}", "A".repeat(55));
        let token = format!("C{}", "B".repeat(55));
        let cli = Cli::parse_from([
            "fairwage-discovery",
            "register",
            "--contract-id",
            &contract,
            "--name",
            "Acme",
            "--token-symbol",
            "ACM",
            "--token-contract",
            &token,
        ]);

        match cli.command {
            Commands::Register {
                contract_id,
                name,
                token_symbol,
                token_contract,
            } => {
                assert_eq!(contract_id, contract);
                assert_eq!(name, "Acme");
                assert_eq!(token_symbol, Some("ACM".to_string()));
                assert_eq!(token_contract, Some(token));
            }
            _ => panic!("Expected Register command"),
        }
    }

    #[test]
    fn test_cli_parse_promote_and_scan() {
        let cli = Cli::parse_from([
            "fairwage-discovery",
            "discover-contracts",
            "--wallet",
            WALLET,
            "--promote",
        ]);
        assert!(matches!(
            cli.command,
            Commands::DiscoverContracts { promote: true, .. }
        ));

        let cli = Cli::parse_from(["fairwage-discovery", "scan-contracts", "--wallet", WALLET]);
        assert!(matches!(cli.command, Commands::ScanContracts { .. }));
    }

    #[test]
    fn test_cli_requires_wallet() {
        assert!(Cli::try_parse_from(["fairwage-discovery", "discover-contracts"]).is_err());
    }

    #[test]
    fn test_cli_parse_simple_commands() {
        let cli = Cli::parse_from(["fairwage-discovery", "list"]);
        assert!(matches!(cli.command, Commands::List));

        let cli = Cli::parse_from(["fairwage-discovery", "health"]);
        assert!(matches!(cli.command, Commands::Health));

        let cli = Cli::parse_from(["fairwage-discovery", "version"]);
        assert!(matches!(cli.command, Commands::Version));
    }

    #[test]
    fn test_init_config_refuses_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        init_config(&path, false).unwrap();
        assert!(path.exists());
        assert!(init_config(&path, false).is_err());
        assert!(init_config(&path, true).is_ok());
    }
}
