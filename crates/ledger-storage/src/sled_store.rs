use anyhow::{Context, Result};
use ledger_core::gateway::NodeStore;
use ledger_core::{Chain, NodeState};
use serde::de::DeserializeOwned;
use sled::{Db, Tree};
use std::path::Path;
use tracing::{debug, info};

const TREE_STATES: &str = "states";
const TREE_CHAINS: &str = "chains";

/// Node state and chain for any number of miners, keyed by miner address.
/// Values are stored as JSON, the same shape the HTTP API serves.
#[derive(Clone)]
pub struct SledStore {
  db: Db,
}

impl SledStore {
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
    let db = sled::open(path.as_ref())
      .with_context(|| format!("opening sled store at {}", path.as_ref().display()))?;
    info!("sled store opened");
    Ok(Self { db })
  }

  fn states(&self) -> Result<Tree> {
    Ok(self.db.open_tree(TREE_STATES)?)
  }

  fn chains(&self) -> Result<Tree> {
    Ok(self.db.open_tree(TREE_CHAINS)?)
  }

  pub fn close(&self) -> Result<()> {
    self.db.flush()?;
    Ok(())
  }

  /// Drop every stored state and chain.
  pub fn clear(&self) -> Result<()> {
    self.states()?.clear()?;
    self.chains()?.clear()?;
    self.db.flush()?;
    Ok(())
  }
}

fn decode<T: DeserializeOwned>(bytes: &[u8], what: &str, address: &str) -> Result<T> {
  serde_json::from_slice(bytes).with_context(|| format!("corrupt {what} stored for {address}"))
}

impl NodeStore for SledStore {
  fn load_state(&self, address: &str) -> Result<NodeState> {
    match self.states()?.get(address.as_bytes())? {
      Some(bytes) => decode(&bytes, "state", address),
      None => Ok(NodeState::new(address)),
    }
  }

  fn save_state(&self, state: &NodeState) -> Result<()> {
    let bytes = serde_json::to_vec(state)?;
    self
      .states()?
      .insert(state.miner_account_address.as_bytes(), bytes)?;
    self.db.flush()?;
    Ok(())
  }

  fn update_state(&self, address: &str, apply: &mut dyn FnMut(&mut NodeState)) -> Result<NodeState> {
    let tree = self.states()?;
    let mut failure: Option<anyhow::Error> = None;

    // sled may rerun the closure on contention, so it must start from `current` every time
    let updated = tree.update_and_fetch(address.as_bytes(), |current| {
      let state = match current {
        Some(bytes) => serde_json::from_slice::<NodeState>(bytes),
        None => Ok(NodeState::new(address)),
      };
      let encoded = state.and_then(|mut state| {
        apply(&mut state);
        serde_json::to_vec(&state)
      });
      match encoded {
        Ok(bytes) => {
          failure = None;
          Some(bytes)
        }
        Err(err) => {
          failure = Some(err.into());
          current.map(<[u8]>::to_vec)
        }
      }
    })?;

    if let Some(err) = failure {
      return Err(err.context(format!("updating state for {address}")));
    }
    self.db.flush()?;
    let bytes = updated.with_context(|| format!("state for {address} vanished during update"))?;
    debug!(address, "state updated");
    decode(&bytes, "state", address)
  }

  fn load_chain(&self, address: &str) -> Result<Chain> {
    match self.chains()?.get(address.as_bytes())? {
      Some(bytes) => decode(&bytes, "chain", address),
      None => Ok(Chain::new()),
    }
  }

  fn save_chain(&self, address: &str, chain: &Chain) -> Result<()> {
    let bytes = serde_json::to_vec(chain)?;
    self.chains()?.insert(address.as_bytes(), bytes)?;
    self.db.flush()?;
    debug!(address, blocks = chain.len(), "chain saved");
    Ok(())
  }
}
