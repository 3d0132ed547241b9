//! Bridge ledger service binary

use anyhow::Context;
use bridge_core::{Bridge, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting bridge ledger service");

    // Config path from the first argument, otherwise BRIDGE_* variables
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => Config::from_env().context("Failed to load config from environment")?,
    };
    tracing::debug!(config = %serde_json::to_string(&config)?, "Loaded configuration");

    let bridge = Bridge::open(config).await.context("Failed to open bridge")?;
    tracing::info!(pools = bridge.config().pools.len(), "Bridge opened successfully");

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down bridge ledger service");
    bridge.shutdown().await?;
    Ok(())
}
