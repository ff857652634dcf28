// # ddnsd - DDNS Daemon
//
// The ddnsd daemon is a thin integration layer. It is responsible for:
// 1. Reading the configuration file
// 2. Initializing logging and the runtime
// 3. Building the record store, address resolver and provider accounts
// 4. Running the DDNS engine until SIGINT/SIGTERM
//
// All reconciliation logic lives in ddns-core.
//
// ## Environment
//
// - `DDNS_CONFIG`: Path of the YAML configuration (default `/etc/simpleddns/config.yaml`)
// - `DDNS_LOG_LEVEL`: trace, debug, info, warn or error (default info)
// - `DDNS_MODE`: `dry-run` performs provider lookups but sends no changes
//
// ## Example
//
// ```yaml
// ddns:
//   storage:
//     sqlite:
//       db: /var/lib/simpleddns/ddns.db
//   public-ip-api:
//     ipify:
//       check-period-mins: 5
//       ipv4:
//         endpoint: https://api.ipify.org
//       ipv6:
//         endpoint: https://api6.ipify.org
//   dns-server:
//     cloudflare:
//       - account: home
//         credentials-file: /etc/simpleddns/home.token
//         zones:
//           - id: 023e105f4ecef8ad9ca31a8372d0c353
//             records:
//               - fqdn: home.example.com
//                 type: A
//               - fqdn: home.example.com
//                 type: AAAA
// ```

use anyhow::{Context, Result};
use ddns_core::config::{AccountConfig, ResolverConfig};
use ddns_core::engine::EngineEvent;
use ddns_core::traits::{AddressResolver, ZoneUpdater};
use ddns_core::{
    DdnsConfig, DdnsEngine, ProviderAccount, SharedRecordStore, YamlConfigSource, ZoneRegistry,
};
use std::env;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Default configuration file location
const DEFAULT_CONFIG_PATH: &str = "/etc/simpleddns/config.yaml";

/// How long the engine gets to stop after a shutdown signal
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Parse a `DDNS_LOG_LEVEL` value
fn parse_log_level(value: &str) -> Result<Level> {
    match value.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "DDNS_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            value
        ),
    }
}

fn main() -> ExitCode {
    let log_level = env::var("DDNS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let log_level = match parse_log_level(&log_level) {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    let config_path = env::var("DDNS_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    info!("Starting ddnsd daemon (config: {})", config_path);

    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    info!(
        "Configuration loaded: {} account(s), checking every {} minute(s)",
        config.accounts.len(),
        config.resolver.check_period_mins
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        // Owns the store for the lifetime of the process
        let shared_store = SharedRecordStore::new(config.database.as_str());

        let (engine, events) = match build_engine(&config, &shared_store).await {
            Ok(built) => built,
            Err(e) => {
                error!("Startup error: {:#}", e);
                shared_store.close().await;
                return DdnsExitCode::ConfigError;
            }
        };

        let code = if let Err(e) = run_engine(engine, events).await {
            error!("Daemon error: {:#}", e);
            DdnsExitCode::RuntimeError
        } else {
            DdnsExitCode::CleanShutdown
        };

        shared_store.close().await;
        code
    });

    result.into()
}

/// Read and validate the configuration file
fn load_config(path: &str) -> Result<DdnsConfig> {
    let source = YamlConfigSource::from_file(path)?;
    Ok(DdnsConfig::load(&source)?)
}

/// Build the engine and its collaborators
async fn build_engine(
    config: &DdnsConfig,
    shared_store: &SharedRecordStore,
) -> Result<(DdnsEngine, mpsc::Receiver<EngineEvent>)> {
    let store = shared_store
        .get()
        .await
        .with_context(|| format!("failed to open record store at {}", config.database))?
        .clone();
    info!("Record store ready: {}", config.database);

    let resolver = build_resolver(&config.resolver)?;

    let mut accounts = Vec::with_capacity(config.accounts.len());
    for account in &config.accounts {
        accounts.push(build_account(account).await?);
    }

    let built = DdnsEngine::new(resolver, Arc::new(store), accounts, config.engine.clone())?;
    Ok(built)
}

#[cfg(feature = "http")]
fn build_resolver(config: &ResolverConfig) -> Result<Box<dyn AddressResolver>> {
    info!(
        "Resolving public addresses via {} and {}",
        config.ipv4.endpoint, config.ipv6.endpoint
    );
    Ok(Box::new(ddns_ip_http::HttpAddressResolver::new(config)?))
}

#[cfg(not(feature = "http"))]
fn build_resolver(_config: &ResolverConfig) -> Result<Box<dyn AddressResolver>> {
    anyhow::bail!("ddnsd was built without an address resolver (enable the `http` feature)")
}

async fn build_account(config: &AccountConfig) -> Result<ProviderAccount> {
    let token = read_api_token(Path::new(&config.credentials_file))
        .await
        .with_context(|| format!("account {}", config.account))?;
    let updater = build_updater(token)?;

    for zone in &config.zones {
        info!(
            "Account {}: zone {} manages {} record(s)",
            config.account,
            zone.id,
            zone.records.len()
        );
    }

    Ok(ProviderAccount::new(
        config.account.clone(),
        ZoneRegistry::from_config(&config.zones),
        updater,
    ))
}

#[cfg(feature = "cloudflare")]
fn build_updater(token: String) -> Result<Box<dyn ZoneUpdater>> {
    Ok(Box::new(ddns_provider_cloudflare::CloudflareZoneUpdater::from_env(token)?))
}

#[cfg(not(feature = "cloudflare"))]
fn build_updater(_token: String) -> Result<Box<dyn ZoneUpdater>> {
    anyhow::bail!("ddnsd was built without a DNS provider (enable the `cloudflare` feature)")
}

/// Read an API token from a credentials file
///
/// The file holds the token alone; surrounding whitespace is ignored.
async fn read_api_token(path: &Path) -> Result<String> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("unable to read credentials file {}", path.display()))?;

    let token = content.trim();
    if token.is_empty() {
        anyhow::bail!("credentials file {} is empty", path.display());
    }
    Ok(token.to_string())
}

/// Run the engine until a shutdown signal arrives
async fn run_engine(engine: DdnsEngine, mut events: mpsc::Receiver<EngineEvent>) -> Result<()> {
    let event_logger = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!("Engine event: {:?}", event);
        }
    });

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let mut engine_handle =
        tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    tokio::select! {
        signal = wait_for_shutdown() => {
            info!("Received shutdown signal: {}", signal?);
        }
        result = &mut engine_handle => {
            result.context("engine task panicked")??;
            anyhow::bail!("Engine stopped unexpectedly");
        }
    }

    info!("Shutting down daemon");
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, engine_handle).await {
        Ok(joined) => joined.context("engine task panicked")??,
        Err(_) => anyhow::bail!("Shutdown timeout after {:?}", SHUTDOWN_TIMEOUT),
    }

    let _ = event_logger.await;
    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(signal)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
