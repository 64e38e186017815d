use std::time::Duration;

use anyhow::Result;
use ledger_core::coordinator::CoordinatorConfig;
use ledger_core::gateway::{peer_endpoint, PeerNetwork};
use ledger_core::{Chain, NodeState, PeerError};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::constants::{MINER_ADDRESS_HEADER, NODE_URL_HEADER, PEER_TIMEOUT_SECS};

/// Talks to other nodes over their HTTP API.
#[derive(Clone)]
pub struct HttpPeerNetwork {
    http: Client,
    node_url: String,
    miner_address: String,
}

fn unreachable(peer: &str, err: reqwest::Error) -> PeerError {
    PeerError::Unreachable {
        peer: peer.to_string(),
        reason: err.to_string(),
    }
}

fn faulty(peer: &str, reason: impl ToString) -> PeerError {
    PeerError::Protocol {
        peer: peer.to_string(),
        reason: reason.to_string(),
    }
}

impl HttpPeerNetwork {
    pub fn new(config: &CoordinatorConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(PEER_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            node_url: config.node_url.clone(),
            miner_address: config.miner_address.clone(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, peer: &str, path: &str) -> Result<T, PeerError> {
        let url = peer_endpoint(peer, path);
        debug!(%url, "GET");
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| unreachable(peer, e))?;
        if resp.status() != StatusCode::OK {
            return Err(faulty(peer, format!("GET /{path} returned {}", resp.status())));
        }
        resp.json::<T>().await.map_err(|e| faulty(peer, e))
    }
}

impl PeerNetwork for HttpPeerNetwork {
    async fn fetch_state(&self, peer: &str) -> Result<NodeState, PeerError> {
        self.get_json(peer, "state").await
    }

    async fn fetch_chain(&self, peer: &str) -> Result<Chain, PeerError> {
        self.get_json(peer, "blockchain").await
    }

    async fn push_chain(&self, peer: &str, chain: &Chain) -> Result<(), PeerError> {
        let resp = self
            .http
            .put(peer_endpoint(peer, "blockchain"))
            .header(NODE_URL_HEADER, &self.node_url)
            .header(MINER_ADDRESS_HEADER, &self.miner_address)
            .json(chain)
            .send()
            .await
            .map_err(|e| unreachable(peer, e))?;
        match resp.status() {
            StatusCode::ACCEPTED => Ok(()),
            status => Err(faulty(peer, format!("PUT /blockchain returned {status}"))),
        }
    }
}
