//! Aggregator server: serves one global model over HTTP until Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use fallguard_fl::{server, telemetry, FedConfig, GlobalModelStore, MergePolicy};

#[derive(Debug, Parser)]
#[command(name = "fallguard-server", version, about = "Federated fall-detection aggregator")]
struct Args {
    /// Config file (YAML/TOML/JSON)
    #[arg(long, env = "FALLGUARD_CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Listen address, overrides `server.bind_addr`
    #[arg(long)]
    bind: Option<String>,

    /// Replace the global model with each update instead of averaging
    #[arg(long)]
    replace: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing("fallguard-server")?;
    let args = Args::parse();

    let cfg = FedConfig::load(args.config.as_deref()).context("loading configuration")?;
    let bind = args.bind.unwrap_or(cfg.server.bind_addr);
    let policy = if args.replace {
        MergePolicy::Replace
    } else {
        cfg.server.merge_policy
    };

    let store = Arc::new(GlobalModelStore::with_history_limit(
        policy,
        cfg.server.history_limit,
    ));
    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {}", bind))?;

    server::serve(listener, Arc::clone(&store), shutdown_signal()).await?;
    info!(round = store.round(), "aggregator stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = ?e, "failed to listen for ctrl-c");
    }
}
