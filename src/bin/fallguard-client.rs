//! Simulated wearable client: runs federated rounds against a remote aggregator.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

use fallguard_fl::{
    telemetry, ClientRoundRunner, DenseTrainer, FedConfig, HttpModelClient, Persona,
    RunnerSettings,
};

#[derive(Debug, Parser)]
#[command(name = "fallguard-client", version, about = "Simulated federated fall-detection client")]
struct Args {
    /// Persona to simulate: athlete, senior or average
    #[arg(long, default_value = "average")]
    persona: Persona,

    /// Number of sequential rounds to run
    #[arg(long, default_value_t = 1)]
    rounds: u32,

    /// Aggregator base URL, overrides `client.aggregator_url`
    #[arg(long)]
    url: Option<String>,

    /// Config file (YAML/TOML/JSON)
    #[arg(long, env = "FALLGUARD_CONFIG_FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing("fallguard-client")?;
    let args = Args::parse();

    let mut cfg = FedConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(url) = args.url {
        cfg.client.aggregator_url = url;
    }

    let service = Arc::new(HttpModelClient::from_config(&cfg.client)?);
    let trainer = Arc::new(DenseTrainer::from_config(&cfg.training));
    let runner = ClientRoundRunner::new(service, trainer, RunnerSettings::from_config(&cfg));

    let mut status = runner.subscribe();
    let watcher = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = status.borrow().to_string();
            info!(status = %current, "status");
        }
    });

    let mut failed = 0;
    for n in 1..=args.rounds {
        match runner.run_round(args.persona).await {
            Ok(report) => info!(
                n,
                round = report.new_round,
                local_fpr = %format!("{:.2}%", report.local_fpr * 100.0),
                loss = report.final_loss,
                "round finished"
            ),
            Err(_) => failed += 1,
        }
    }

    drop(runner);
    let _ = watcher.await;

    if failed > 0 {
        bail!("{} of {} rounds failed", failed, args.rounds);
    }
    Ok(())
}
