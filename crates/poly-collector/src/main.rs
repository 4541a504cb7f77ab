//! Polymarket order book collector - entry point.

use anyhow::Result;
use clap::Parser;
use poly_collector::AppConfig;
use poly_gamma::GammaClient;
use poly_manager::MarketManager;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Polymarket order book collector
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via POLY_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the output directory from the config file
    #[arg(short, long)]
    output: Option<String>,

    /// Write plain JSONL instead of zstd-compressed files
    #[arg(long)]
    no_compress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // TLS crypto provider must be installed before any WS connection.
    poly_ws::init_crypto();

    let args = Args::parse();

    // Config path: CLI arg > POLY_CONFIG env var > default.
    let config_path = args
        .config
        .or_else(|| std::env::var("POLY_CONFIG").ok())
        .unwrap_or_else(|| "config/collector.toml".to_string());

    let mut config = AppConfig::from_file(&config_path)?;
    if let Some(output) = args.output {
        config.storage.output_dir = output;
    }
    if args.no_compress {
        config.storage.compress = false;
    }
    config.validate()?;

    // Logging comes up after the config so its level applies; RUST_LOG
    // still overrides.
    poly_telemetry::init_logging(&config.logging.level)?;

    info!("Starting poly-collector v{}", env!("CARGO_PKG_VERSION"));
    info!(
        config_path = %config_path,
        series = config.manager.enabled_series().count(),
        output_dir = %config.storage.output_dir,
        compress = config.storage.compress,
        "Configuration loaded"
    );

    let gamma = GammaClient::with_timeout(config.discovery.request_timeout())?
        .with_base_url(&config.discovery.base_url)
        .with_early_start(config.discovery.early_start())
        .with_fallback_window(config.discovery.fallback_window());

    let manager = MarketManager::new(
        gamma,
        config.manager.clone(),
        config.storage.clone(),
        config.websocket.url.clone(),
        config.websocket.reconnect.clone(),
    );

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
        }
        shutdown.cancel();
    });

    manager.run(cancel).await;

    info!("Collector stopped");
    Ok(())
}
