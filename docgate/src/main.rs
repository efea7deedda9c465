use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use docgate::prelude::*;

/// Generic HTTP gateway over named document collections.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "docgate.toml")]
    config: PathBuf,

    /// Storage backend, overriding the configuration file
    #[arg(long)]
    backend: Option<BackendKind>,

    /// Port to listen on, overriding the configuration file and `PORT`
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = GatewayConfig::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    if let Some(backend) = cli.backend {
        config.database.backend = backend;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let store = open_store(&config)
        .await
        .context("failed to open document store")?;

    GatewayServer::new(config, store).start().await?;

    Ok(())
}
