//! Corridor fabric control plane daemon

#![warn(missing_docs)]
#![warn(clippy::all)]

use anyhow::Result;
use clap::Parser;
use corridor_core::{SharedClock, SystemClock};
use corridor_server::{ApiServer, AppState, FabricConfig, ServerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "corridor-server")]
#[command(about = "Corridor fabric control plane", long_about = None)]
struct Args {
    /// Bind address
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// JSON config file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Reconciler period in milliseconds; 0 disables it
    #[arg(long, default_value_t = 100)]
    reconcile_interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("corridor=info,tower_http=info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if args.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config = FabricConfig::load(args.config.as_deref())?;
    info!(
        config = ?args.config,
        fingerprint = %config.fingerprint(),
        devices = config.devices.len(),
        "configuration loaded"
    );

    let clock: SharedClock = Arc::new(SystemClock);
    let state = AppState::build(config, clock).await?;
    let server = ApiServer::new(
        ServerConfig::new()
            .with_bind(args.bind)
            .with_reconcile_interval(args.reconcile_interval_ms),
        state,
    );
    server.serve().await?;

    Ok(())
}
