//! The seams between the mining logic and the outside world. They live in
//! `ledger-core` so the storage and node crates can implement them without a
//! circular dependency.

use std::future::Future;

use anyhow::Result;

use crate::error::PeerError;
use crate::{Chain, NodeState};

/// Persistence of one node's state and chain, keyed by miner address.
pub trait NodeStore: Send + Sync {
    /// The stored state, or `NodeState::new(address)` when none exists yet.
    fn load_state(&self, address: &str) -> Result<NodeState>;
    fn save_state(&self, state: &NodeState) -> Result<()>;
    /// Atomic read-modify-write of the stored state; returns the new value.
    /// `apply` may be called more than once if the store retries.
    fn update_state(&self, address: &str, apply: &mut dyn FnMut(&mut NodeState)) -> Result<NodeState>;
    /// The stored chain, or an empty one.
    fn load_chain(&self, address: &str) -> Result<Chain>;
    fn save_chain(&self, address: &str, chain: &Chain) -> Result<()>;
}

/// Calls to a single peer, identified by its base URL.
pub trait PeerNetwork: Send + Sync {
    fn fetch_state(&self, peer: &str) -> impl Future<Output = Result<NodeState, PeerError>> + Send;
    fn fetch_chain(&self, peer: &str) -> impl Future<Output = Result<Chain, PeerError>> + Send;
    fn push_chain(&self, peer: &str, chain: &Chain) -> impl Future<Output = Result<(), PeerError>> + Send;
}

/// Compare peer URLs ignoring a trailing slash.
pub fn same_peer(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

/// `base` joined with `path`, with exactly one slash between them.
pub fn peer_endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
