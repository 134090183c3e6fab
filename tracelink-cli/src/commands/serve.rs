//! Run the tracelink HTTP server in the foreground

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracelink_core::{StoreBackend, open_store};
use tracelink_server::{AppState, ServerConfig, TracelinkServer};
use tracing::{info, warn};

use crate::config::{ConfigLoader, TracelinkConfig};

/// Arguments for the serve command
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Host to bind to (overrides config)
    #[arg(long)]
    pub host: Option<String>,
}

/// Run the serve command
pub async fn run(args: ServeArgs) -> Result<()> {
    let config = ConfigLoader::load()?;
    let server = build_server(&args, &config)?;

    info!(
        "Starting tracelink server on {} ({:?} store)",
        server.config().addr(),
        config.store.backend
    );
    server.run().await?;
    Ok(())
}

/// Apply flag overrides and wire the store, engine and auth together
fn build_server(args: &ServeArgs, config: &TracelinkConfig) -> Result<TracelinkServer> {
    let server_config = ServerConfig::new(
        args.host.clone().unwrap_or_else(|| config.server.host.clone()),
        args.port.unwrap_or(config.server.port),
    );

    if config.store.backend == StoreBackend::Memory {
        warn!("Using the in-memory store; records are lost on shutdown");
    }
    let store = open_store(&config.store).context("Failed to open record store")?;
    let state = AppState::new(store, &config.attribution, config.auth.clone())?;

    Ok(TracelinkServer::new(server_config, Arc::new(state)))
}
