use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ledger_core::balance::{balance_of, transactions_for};
use ledger_core::gateway::peer_endpoint;
use ledger_core::Chain;
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-wallet")]
#[command(about = "Wallet client for a ledger node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:8080)
    #[arg(long, global = true, env = "NODE_URL", default_value = "http://127.0.0.1:8080")]
    node: String,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show an account's balance and the transactions that touch it
    Balance {
        #[arg(long)]
        account: String,
    },
    /// Send funds to another account
    Send {
        /// Sender
        #[arg(long)]
        from: String,
        /// Recipient
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: f64,
        /// Fee paid to the miner of the block
        #[arg(long, default_value_t = 0.01)]
        fee: f64,
    },
}

#[derive(Serialize)]
struct TransferRequest<'a> {
    from: &'a str,
    to: &'a str,
    amount: f64,
    transaction_fee: f64,
}

/// Whether `balance` still covers `amount` plus `fee` with something left over.
fn can_afford(balance: f64, amount: f64, fee: f64) -> bool {
    balance - amount - fee > 0.0
}

async fn fetch_chain(client: &reqwest::Client, node: &str) -> Result<Chain> {
    let url = peer_endpoint(node, "blockchain");
    debug!(%url, "fetching chain");
    let chain = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("contacting {url}"))?
        .error_for_status()?
        .json()
        .await
        .context("decoding chain")?;
    Ok(chain)
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();
    match cli.cmd {
        Command::Balance { account } => {
            let chain = fetch_chain(&client, &cli.node).await?;
            println!("{account}: {}", balance_of(&chain, &account));
            for tx in transactions_for(&chain, &account) {
                println!(
                    "{}  {} -> {}  {} (fee {})",
                    tx.id(),
                    tx.from,
                    tx.to,
                    tx.amount,
                    tx.fee()
                );
            }
        }
        Command::Send { from, to, amount, fee } => {
            if from == to {
                bail!("sender and recipient are the same account");
            }
            let chain = fetch_chain(&client, &cli.node).await?;
            let balance = balance_of(&chain, &from);
            if !can_afford(balance, amount, fee) {
                bail!("{from} has {balance}, not enough to send {amount} with fee {fee}");
            }

            let body = serde_json::to_string(&TransferRequest {
                from: &from,
                to: &to,
                amount,
                transaction_fee: fee,
            })?;
            let res = client
                .post(peer_endpoint(&cli.node, "transaction"))
                .body(body)
                .send()
                .await?;
            let status = res.status();
            let text = res.text().await?;
            if !status.is_success() {
                bail!("node refused the transaction ({status}): {text}");
            }
            println!("{text}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_must_exceed_amount_and_fee() {
        assert!(can_afford(10.0, 5.0, 1.0));
        assert!(!can_afford(6.0, 5.0, 1.0));
        assert!(!can_afford(3.0, 5.0, 0.01));
    }

    #[test]
    fn send_parses_with_default_fee() {
        let cli = Cli::parse_from(["ledger-wallet", "send", "--from", "a", "--to", "b", "--amount", "2.5"]);
        let Command::Send { amount, fee, .. } = cli.cmd else {
            panic!("expected send");
        };
        assert_eq!(amount, 2.5);
        assert_eq!(fee, 0.01);
    }

    #[test]
    fn transfer_request_uses_node_field_names() {
        let body = serde_json::to_value(TransferRequest {
            from: "a",
            to: "b",
            amount: 1.0,
            transaction_fee: 0.5,
        })
        .unwrap();
        assert_eq!(body["transaction_fee"], 0.5);
        assert_eq!(body["from"], "a");
    }
}
