mod api;
mod constants;

use anyhow::Context;
use clap::Parser;
use constants::DEFAULT_LISTEN;
use ledger_core::{Ledger, LedgerConfig, ProofMode};
use std::{net::SocketAddr, path::PathBuf};
use tracing::{info, Level};

#[derive(Parser, Debug)]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, default_value = DEFAULT_LISTEN)]
    listen: String,

    /// JSON ledger config ({"difficulty", "reward", "proof"}); flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Rounds per block, or leading zero bits with --pow leading-zero-bits.
    /// Defaults to 1000000 rounds or 20 bits
    #[arg(long)]
    difficulty: Option<u64>,

    /// Amount credited to the miner of each block
    #[arg(long)]
    reward: Option<u64>,

    /// Proof of work mode: rounds | leading-zero-bits
    #[arg(long)]
    pow: Option<ProofMode>,
}

async fn load_config(args: &Args) -> anyhow::Result<LedgerConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            LedgerConfig::from_json_with_mode(&raw, args.pow)?
        }
        None => LedgerConfig::for_mode(args.pow.unwrap_or_default()),
    };
    if let Some(difficulty) = args.difficulty {
        config.difficulty = difficulty;
    }
    if let Some(reward) = args.reward {
        config.reward = reward;
    }
    Ok(config)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = load_config(&args).await?;
    let ledger = Ledger::new(&config).context("invalid ledger configuration")?;
    let app = api::router(api::AppState::new(ledger));

    let addr: SocketAddr = args.listen.parse()?;
    info!("ledger-node listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
