use std::{path::PathBuf, time::Duration};

use clap::Parser;
use ledger_core::coordinator::CoordinatorConfig;
use rand::Rng;

use crate::constants::TICK_SECS_RANGE;

#[derive(Parser, Debug, Clone)]
#[command(name = "ledger-node")]
#[command(about = "Mining node for the minimal ledger network")]
pub struct Args {
    /// Account credited with this node's mining fees
    #[arg(long, env = "MINER_ACCOUNT_ADDRESS")]
    pub miner_address: String,

    /// URL the other nodes reach this one at, e.g. http://node-1:5000
    #[arg(long, env = "NODE_URL")]
    pub node_url: String,

    /// Every node in the network, comma separated. This node is added when missing.
    #[arg(long, env = "NETWORK_NODES_URLS", value_delimiter = ',')]
    pub peers: Vec<String>,

    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub listen: String,

    /// Data directory for sled
    #[arg(long, default_value = "./data")]
    pub data_dir: PathBuf,

    /// Seconds between mining ticks; random in 50..=70 when unset
    #[arg(long, env = "MINER_SLEEP_TIME_IN_SECONDS")]
    pub tick_secs: Option<u64>,
}

impl Args {
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        let peers = self
            .peers
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        CoordinatorConfig::new(self.miner_address.clone(), self.node_url.clone(), peers)
    }

    pub fn tick_interval(&self) -> Duration {
        let secs = self
            .tick_secs
            .unwrap_or_else(|| rand::thread_rng().gen_range(TICK_SECS_RANGE));
        Duration::from_secs(secs.max(1))
    }
}
