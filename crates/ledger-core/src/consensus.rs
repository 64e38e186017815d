//! Majority vote over the last block hash of every chain the peers returned.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{LedgerError, Result};
use crate::Chain;

/// Number of chains ending in each distinct last-block hash, in ascending
/// hash order. Empty chains cast no vote.
pub fn tally(chains: &[Chain]) -> BTreeMap<String, usize> {
    let mut votes = BTreeMap::new();
    for hash in chains.iter().filter_map(Chain::last_hash) {
        *votes.entry(hash).or_insert(0) += 1;
    }
    votes
}

/// The hash with the most votes. Ties go to the lexicographically smallest
/// hash so every node picks the same winner whatever order its peers answered in.
pub fn winning_hash(votes: &BTreeMap<String, usize>) -> Option<&str> {
    let mut best: Option<(&str, usize)> = None;
    for (hash, &count) in votes {
        match best {
            Some((_, top)) if top >= count => {}
            _ => best = Some((hash.as_str(), count)),
        }
    }
    best.map(|(hash, _)| hash)
}

/// Pick the chain most peers agree on.
pub fn resolve(peer_chains: Vec<Chain>) -> Result<Chain> {
    let votes = tally(&peer_chains);
    let winner = winning_hash(&votes)
        .ok_or(LedgerError::NoPeersReachable)?
        .to_string();
    debug!(?votes, %winner, "consensus tally");

    peer_chains
        .into_iter()
        .find(|chain| chain.last_hash().as_deref() == Some(winner.as_str()))
        .ok_or(LedgerError::ConsensusUnreachable(winner))
}
