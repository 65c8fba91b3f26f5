//! Shared setup for commands: logging, the discovery stack, and output.

use super::config::AppConfig;
use fairwage_discovery::api::{ApiReply, DiscoveryApi};
use fairwage_discovery::discovery::DiscoveryOrchestrator;
use fairwage_discovery::ledger::HorizonLedgerClient;
use fairwage_discovery::registry::RegistryStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Install the log subscriber; `RUST_LOG` wins over the configured level.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init_tracing(level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Discovery API over the production ledger client.
pub fn build_api(
    config: &AppConfig,
) -> Result<DiscoveryApi<HorizonLedgerClient>, Box<dyn std::error::Error>> {
    let ledger = Arc::new(HorizonLedgerClient::new(config.horizon_config()?)?);
    let registry = Arc::new(RegistryStore::open(&config.registry.path));

    let orchestrator = DiscoveryOrchestrator::new(
        ledger,
        registry,
        config.discovery_config(),
        config.verifier_config(),
    );

    Ok(DiscoveryApi::new(Arc::new(orchestrator)))
}

/// Cancellation token tripped by Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received, cancelling");
                trigger.cancel();
            }
            Err(e) => warn!(error = %e, "failed to listen for Ctrl-C"),
        }
    });
    cancel
}

/// Print the reply body; a failure status becomes the command error.
pub fn emit(reply: ApiReply) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(&reply.body)?);

    if reply.is_success() {
        Ok(())
    } else {
        let reason = reply.body["error"].as_str().unwrap_or("request failed");
        Err(format!("{} (status {})", reason, reply.status).into())
    }
}
