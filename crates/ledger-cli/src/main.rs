mod demo;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use ledger_core::{AccountId, ProofMode};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "CLI client for the minimal ledger node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:8080)
    #[arg(long, global = true, default_value = "http://127.0.0.1:8080")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a transaction
    Submit {
        /// Sender address (32 hex chars)
        #[arg(long)]
        from: AccountId,
        /// Recipient address (32 hex chars)
        #[arg(long)]
        to: AccountId,
        /// Amount
        #[arg(long)]
        amount: u64,
    },
    /// Mine the pending transactions into a new block
    Mine {
        /// Address credited with the block reward
        #[arg(long)]
        miner: AccountId,
    },
    /// Cancel every mining cycle in flight on the node
    Cancel,
    /// Print the full ledger
    Chain,
    /// Print the tip height and hash
    Head,
    /// Print a single block
    Block {
        /// Position in the chain
        index: u64,
    },
    /// Check the chain for tampering
    Validate,
    /// Print pending transactions
    Mempool,
    /// Generate fresh random addresses locally
    NewAddress {
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Run the mine-then-tamper walkthrough on a local in-memory ledger
    Demo {
        /// Defaults to 100000 rounds or 16 leading zero bits
        #[arg(long)]
        difficulty: Option<u64>,
        #[arg(long, default_value_t = 1)]
        reward: u64,
        /// Proof of work mode: rounds | leading-zero-bits
        #[arg(long, default_value_t = ProofMode::Rounds)]
        pow: ProofMode,
    },
}

#[derive(Serialize)]
struct Tx {
    from: AccountId,
    to: AccountId,
    amount: u64,
}

#[derive(Serialize)]
struct MineRequest {
    miner: AccountId,
}

async fn print_response(res: reqwest::Response) -> Result<()> {
    let status = res.status();
    let body = res.text().await?;
    debug!(%status, bytes = body.len(), "node response");
    println!("status: {}", status);
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{body}"),
    }
    if !status.is_success() {
        bail!("node answered {status}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let node = cli.node.trim_end_matches('/');
    let client = reqwest::Client::new();
    match cli.cmd {
        Command::Submit { from, to, amount } => {
            let tx = Tx { from, to, amount };
            let res = client.post(format!("{node}/tx")).json(&tx).send().await?;
            print_response(res).await?;
        }
        Command::Mine { miner } => {
            let res = client
                .post(format!("{node}/mine"))
                .json(&MineRequest { miner })
                .send()
                .await?;
            print_response(res).await?;
        }
        Command::Cancel => {
            let res = client.post(format!("{node}/mine/cancel")).send().await?;
            print_response(res).await?;
        }
        Command::Chain => {
            print_response(client.get(format!("{node}/chain")).send().await?).await?
        }
        Command::Head => {
            print_response(client.get(format!("{node}/chain/head")).send().await?).await?
        }
        Command::Block { index } => {
            print_response(client.get(format!("{node}/blocks/{index}")).send().await?).await?
        }
        Command::Validate => {
            print_response(client.get(format!("{node}/chain/validate")).send().await?).await?
        }
        Command::Mempool => {
            print_response(client.get(format!("{node}/mempool")).send().await?).await?
        }
        Command::NewAddress { count } => {
            for _ in 0..count {
                println!("{}", AccountId::random());
            }
        }
        Command::Demo {
            difficulty,
            reward,
            pow,
        } => demo::run(difficulty, reward, pow)?,
    }
    Ok(())
}
