//! One node's mining tick.
//!
//! A tick walks `Idle -> Polling -> (Skipped | Mining) -> Idle`:
//!
//! * **Polling** reads every other peer's state, stopping at the first one
//!   that reports it is mining, and merges the miner addresses it saw.
//! * **Skipped** when nothing is pending or a peer is already mining.
//! * **Mining** announces `currently_mining`, resolves the consensus chain,
//!   routes the best-paying pending transactions to `verified` or `failing`,
//!   mines a block for the verified ones, commits it locally and pushes the
//!   new chain to every peer.
//!
//! The "someone is mining" flag is advisory. Two nodes can pass Polling in
//! the same window and both mine; the next consensus vote settles it.

use std::collections::BTreeSet;
use std::iter;
use std::sync::Arc;

use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::balance::has_sufficient_funds;
use crate::constants::{DEFAULT_POW_DIFFICULTY, MAX_TRANSACTIONS_PER_BLOCK, POW_TARGET_TIME_SECS};
use crate::error::{LedgerError, Result};
use crate::gateway::{same_peer, NodeStore, PeerNetwork};
use crate::mine::{mine, MinedBlock};
use crate::state::{latest_mining_info, LastMiningInfo};
use crate::{consensus, Chain, NodeState, Transaction};

#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    pub miner_address: String,
    pub node_url: String,
    /// Every node in the network, this one included.
    pub peer_urls: Vec<String>,
    pub max_transactions_per_block: usize,
}

impl CoordinatorConfig {
    /// `node_url` is added to `peer_urls` when missing.
    pub fn new(miner_address: impl Into<String>, node_url: impl Into<String>, mut peer_urls: Vec<String>) -> Self {
        let node_url = node_url.into();
        if !peer_urls.iter().any(|p| same_peer(p, &node_url)) {
            peer_urls.push(node_url.clone());
        }
        Self {
            miner_address: miner_address.into(),
            node_url,
            peer_urls,
            max_transactions_per_block: MAX_TRANSACTIONS_PER_BLOCK,
        }
    }

    pub fn other_peers(&self) -> impl Iterator<Item = &str> {
        self.peer_urls
            .iter()
            .map(String::as_str)
            .filter(|p| !same_peer(p, &self.node_url))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SkipReason {
    NoPendingTransactions,
    PeerMining { miner: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct MinedSummary {
    pub index: u64,
    pub hash: String,
    pub difficulty: u32,
    pub duration_secs: f64,
    pub verified: usize,
    pub failed: usize,
    pub propagated_to: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TickOutcome {
    Skipped(SkipReason),
    /// Every candidate lacked funds; nothing was mined.
    NoBlock { failed: usize },
    Mined(MinedSummary),
}

/// Highest fees first. The sort is stable, so equal fees keep submission order.
pub fn rank_pending(pending: &[Transaction], limit: usize) -> Vec<Transaction> {
    let mut ranked = pending.to_vec();
    ranked.sort_by(|a, b| b.fee().total_cmp(&a.fee()));
    ranked.truncate(limit);
    ranked
}

/// Two ledger entries per transaction: the fee to the miner, then the transfer.
pub fn block_entries(kept: &[Transaction], miner_address: &str) -> Vec<Transaction> {
    kept.iter()
        .flat_map(|tx| {
            [
                Transaction::transfer(&tx.from, miner_address, tx.fee(), tx.timestamp),
                Transaction::transfer(&tx.from, &tx.to, tx.amount, tx.timestamp),
            ]
        })
        .collect()
}

pub struct Coordinator<S, N> {
    config: CoordinatorConfig,
    store: Arc<S>,
    network: N,
}

impl<S: NodeStore, N: PeerNetwork> Coordinator<S, N> {
    pub fn new(config: CoordinatorConfig, store: Arc<S>, network: N) -> Self {
        Self {
            config,
            store,
            network,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    /// Run one tick to completion. `currently_mining` is persisted as
    /// `false` on every path out of the tick.
    pub async fn tick(&self) -> Result<TickOutcome> {
        let span = info_span!("tick", miner = %self.config.miner_address);
        self.run_tick().instrument(span).await
    }

    async fn run_tick(&self) -> Result<TickOutcome> {
        let peer_states = self.poll_peers().await;
        let seen: BTreeSet<String> = peer_states
            .iter()
            .map(|s| s.miner_account_address.clone())
            .collect();
        // ticks never overlap, so a raised flag here was left by an interrupted one
        let state = self.update_state(|s| {
            s.currently_mining = false;
            s.all_miners_addresses_in_the_network.extend(seen.iter().cloned());
            s.all_miners_addresses_in_the_network
                .insert(s.miner_account_address.clone());
        })?;

        if state.pending_transactions.is_empty() {
            info!("No pending transactions, skipping");
            return Ok(TickOutcome::Skipped(SkipReason::NoPendingTransactions));
        }

        if let Some(busy) = peer_states.iter().find(|s| s.currently_mining) {
            info!(
                peer = %busy.miner_account_address,
                "another node is currently mining, skipping"
            );
            self.set_mining(false)?;
            return Ok(TickOutcome::Skipped(SkipReason::PeerMining {
                miner: busy.miner_account_address.clone(),
            }));
        }

        let state = self.set_mining(true)?;
        let outcome = self.mine_pending(state, &peer_states).await;

        if let Err(err) = self.set_mining(false) {
            error!(%err, "could not clear the mining flag");
            if outcome.is_ok() {
                return Err(err);
            }
        }
        match &outcome {
            Ok(TickOutcome::Mined(summary)) => info!(
                index = summary.index,
                difficulty = summary.difficulty,
                duration_secs = summary.duration_secs,
                "Block {} was mined successfully",
                summary.hash
            ),
            Ok(_) => {}
            Err(err) => error!(%err, "mining tick aborted"),
        }
        outcome
    }

    /// Snapshots from every other peer, up to and including the first one
    /// that is mining. Unreachable peers are left out.
    async fn poll_peers(&self) -> Vec<NodeState> {
        let mut states = Vec::new();
        for peer in self.config.other_peers() {
            match self.network.fetch_state(peer).await {
                Ok(state) => {
                    let busy = state.currently_mining;
                    states.push(state);
                    if busy {
                        debug!(peer, "peer is mining, polling stopped early");
                        break;
                    }
                }
                Err(err) => warn!(%err, "state poll failed"),
            }
        }
        states
    }

    async fn consensus_chain(&self) -> Result<Chain> {
        let mut chains = Vec::with_capacity(self.config.peer_urls.len());
        for peer in &self.config.peer_urls {
            match self.network.fetch_chain(peer).await {
                Ok(chain) => match chain.verify() {
                    Ok(()) => chains.push(chain),
                    Err(err) => warn!(peer = %peer, %err, "discarding invalid chain"),
                },
                Err(err) => warn!(%err, "chain fetch failed"),
            }
        }
        consensus::resolve(chains)
    }

    async fn mine_pending(&self, state: NodeState, peer_states: &[NodeState]) -> Result<TickOutcome> {
        let mut chain = self.consensus_chain().await?;

        let candidates = rank_pending(
            &state.pending_transactions,
            self.config.max_transactions_per_block,
        );
        let mut kept = Vec::with_capacity(candidates.len());
        let mut failed = 0;
        for tx in candidates {
            let funded = has_sufficient_funds(&chain, &tx);
            let mut taken = false;
            self.update_state(|s| {
                taken = match s.take_pending(&tx) {
                    Some(tx) if funded => {
                        s.verified_transactions.push(tx);
                        true
                    }
                    Some(tx) => {
                        s.failing_transactions.push(tx);
                        true
                    }
                    None => false,
                };
            })?;
            if !taken {
                continue;
            }
            if funded {
                kept.push(tx);
            } else {
                warn!(
                    from = %tx.from,
                    amount = tx.amount,
                    fee = tx.fee(),
                    "sender does not have enough funds, transaction ignored"
                );
                failed += 1;
            }
        }

        if kept.is_empty() {
            return Ok(TickOutcome::NoBlock { failed });
        }

        let prior = latest_mining_info(peer_states.iter().chain(iter::once(&state))).unwrap_or(
            LastMiningInfo {
                idx_last_block_mined: 0,
                difficulty: DEFAULT_POW_DIFFICULTY,
                duration_secs: POW_TARGET_TIME_SECS,
            },
        );
        let entries = block_entries(&kept, &self.config.miner_address);
        let mined = self.run_pow(&chain, entries, prior).await?;

        chain.append(mined.block.clone())?;
        self.store.save_chain(&self.config.miner_address, &chain)?;
        self.update_state(|s| {
            s.idx_last_block_mined = mined.block.index;
            s.difficulty_level_for_last_block_mined = mined.difficulty;
            s.mining_time_for_last_block_mined = mined.duration_secs;
        })?;

        let propagated_to = self.broadcast(&chain).await;

        Ok(TickOutcome::Mined(MinedSummary {
            index: mined.block.index,
            hash: mined.hash,
            difficulty: mined.difficulty,
            duration_secs: mined.duration_secs,
            verified: kept.len(),
            failed,
            propagated_to,
        }))
    }

    /// The nonce search is CPU bound, so it runs on the blocking pool.
    async fn run_pow(&self, chain: &Chain, entries: Vec<Transaction>, prior: LastMiningInfo) -> Result<MinedBlock> {
        let chain = chain.clone();
        tokio::task::spawn_blocking(move || mine(&chain, entries, prior.difficulty, prior.duration_secs))
            .await
            .map_err(|e| LedgerError::MiningAborted(e.to_string()))?
    }

    /// Push `chain` to every other peer; returns how many accepted it.
    async fn broadcast(&self, chain: &Chain) -> usize {
        let mut accepted = 0;
        for peer in self.config.other_peers() {
            match self.network.push_chain(peer, chain).await {
                Ok(()) => accepted += 1,
                Err(err) => warn!(%err, "chain propagation failed"),
            }
        }
        accepted
    }

    fn set_mining(&self, mining: bool) -> Result<NodeState> {
        self.update_state(|s| s.currently_mining = mining)
    }

    fn update_state(&self, mut apply: impl FnMut(&mut NodeState)) -> Result<NodeState> {
        Ok(self
            .store
            .update_state(&self.config.miner_address, &mut apply)?)
    }
}
