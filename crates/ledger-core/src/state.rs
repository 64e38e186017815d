use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_POW_DIFFICULTY, POW_TARGET_TIME_SECS};
use crate::Transaction;

/// Everything one node knows about itself. Only the owning node writes it;
/// peers read snapshots over `GET /state`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
    pub miner_account_address: String,
    pub currently_mining: bool,
    pub pending_transactions: Vec<Transaction>,
    /// Rejected for insufficient funds.
    pub failing_transactions: Vec<Transaction>,
    /// Accepted and handed to the miner.
    pub verified_transactions: Vec<Transaction>,
    pub idx_last_block_mined: u64,
    pub difficulty_level_for_last_block_mined: u32,
    pub mining_time_for_last_block_mined: f64,
    pub all_miners_addresses_in_the_network: BTreeSet<String>,
}

impl NodeState {
    pub fn new(miner_account_address: impl Into<String>) -> Self {
        let miner_account_address = miner_account_address.into();
        Self {
            all_miners_addresses_in_the_network: BTreeSet::from([miner_account_address.clone()]),
            miner_account_address,
            currently_mining: false,
            pending_transactions: Vec::new(),
            failing_transactions: Vec::new(),
            verified_transactions: Vec::new(),
            idx_last_block_mined: 0,
            difficulty_level_for_last_block_mined: DEFAULT_POW_DIFFICULTY,
            mining_time_for_last_block_mined: POW_TARGET_TIME_SECS,
        }
    }

    /// Take the first pending entry equal to `tx` out of the queue.
    pub fn take_pending(&mut self, tx: &Transaction) -> Option<Transaction> {
        let pos = self.pending_transactions.iter().position(|p| p == tx)?;
        Some(self.pending_transactions.remove(pos))
    }
}

/// Difficulty and duration reported for the most recently mined block seen
/// across a set of node states.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LastMiningInfo {
    pub idx_last_block_mined: u64,
    pub difficulty: u32,
    pub duration_secs: f64,
}

/// Pick the state with the highest `idx_last_block_mined`; the earliest one
/// wins a tie.
pub fn latest_mining_info<'a>(states: impl IntoIterator<Item = &'a NodeState>) -> Option<LastMiningInfo> {
    let mut latest: Option<&NodeState> = None;
    for state in states {
        if latest.is_none_or(|best| state.idx_last_block_mined > best.idx_last_block_mined) {
            latest = Some(state);
        }
    }
    latest.map(|s| LastMiningInfo {
        idx_last_block_mined: s.idx_last_block_mined,
        difficulty: s.difficulty_level_for_last_block_mined,
        duration_secs: s.mining_time_for_last_block_mined,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_defaults() {
        let state = NodeState::new("miner-1");
        assert_eq!(state.miner_account_address, "miner-1");
        assert!(!state.currently_mining);
        assert!(state.pending_transactions.is_empty());
        assert_eq!(state.idx_last_block_mined, 0);
        assert_eq!(state.difficulty_level_for_last_block_mined, DEFAULT_POW_DIFFICULTY);
        assert_eq!(state.mining_time_for_last_block_mined, POW_TARGET_TIME_SECS);
        assert!(state.all_miners_addresses_in_the_network.contains("miner-1"));
    }

    #[test]
    fn state_json_field_names() {
        let json = serde_json::to_value(NodeState::new("m")).unwrap();
        for key in [
            "miner_account_address",
            "currently_mining",
            "pending_transactions",
            "failing_transactions",
            "verified_transactions",
            "idx_last_block_mined",
            "difficulty_level_for_last_block_mined",
            "mining_time_for_last_block_mined",
            "all_miners_addresses_in_the_network",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert!(json["all_miners_addresses_in_the_network"].is_array());
    }

    #[test]
    fn take_pending_removes_one_copy() {
        let mut state = NodeState::new("m");
        let tx = Transaction::transfer("a", "b", 1.0, 5.0);
        state.pending_transactions = vec![tx.clone(), tx.clone()];
        assert_eq!(state.take_pending(&tx), Some(tx.clone()));
        assert_eq!(state.pending_transactions.len(), 1);
        let other = Transaction::transfer("a", "c", 1.0, 5.0);
        assert_eq!(state.take_pending(&other), None);
    }

    #[test]
    fn latest_mining_info_prefers_highest_index() {
        let mut a = NodeState::new("a");
        a.idx_last_block_mined = 3;
        a.difficulty_level_for_last_block_mined = 6;
        a.mining_time_for_last_block_mined = 42.0;
        let mut b = NodeState::new("b");
        b.idx_last_block_mined = 5;
        b.difficulty_level_for_last_block_mined = 7;
        b.mining_time_for_last_block_mined = 80.0;
        let mut c = NodeState::new("c");
        c.idx_last_block_mined = 5;
        c.difficulty_level_for_last_block_mined = 1;

        let info = latest_mining_info([&a, &b, &c]).unwrap();
        assert_eq!(info.idx_last_block_mined, 5);
        assert_eq!(info.difficulty, 7);
        assert_eq!(info.duration_secs, 80.0);
        assert_eq!(latest_mining_info(std::iter::empty()), None);
    }
}
