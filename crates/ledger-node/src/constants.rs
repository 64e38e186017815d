use std::ops::RangeInclusive;

/// Base URL of the node pushing a chain; checked against the peer list.
pub const NODE_URL_HEADER: &str = "node-url";
pub const MINER_ADDRESS_HEADER: &str = "miner-address";

/// Tick interval picked at random when none is configured, so miners
/// started together don't keep colliding.
pub(crate) const TICK_SECS_RANGE: RangeInclusive<u64> = 50..=70;
pub(crate) const PEER_TIMEOUT_SECS: u64 = 10;
