use thiserror::Error;

/// Rejections of client-submitted transactions or peer-submitted chains.
/// These go back to the caller and never abort a mining tick.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("transaction has no sender")]
    MissingSender,
    #[error("transaction has no recipient")]
    MissingRecipient,
    #[error("transaction amount must be greater than zero")]
    NonPositiveAmount,
    #[error("transaction fee must be at least 0.01")]
    FeeTooLow,
    #[error("chain has no blocks")]
    EmptyChain,
    #[error("block {index} does not link to its predecessor")]
    BrokenLink { index: u64 },
    #[error("block at position {position} has index {index}")]
    IndexGap { position: usize, index: u64 },
    #[error("first block is not a genesis block")]
    BadGenesis,
}

/// Failure talking to one peer. The caller logs it and carries on without
/// that peer's contribution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PeerError {
    #[error("{peer} not available at this moment: {reason}")]
    Unreachable { peer: String, reason: String },
    #[error("{peer} is faulty: {reason}")]
    Protocol { peer: String, reason: String },
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("no peer returned a usable chain")]
    NoPeersReachable,
    #[error("consensus was not reached: no chain ends in winning hash {0}")]
    ConsensusUnreachable(String),
    #[error("mining task did not complete: {0}")]
    MiningAborted(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;
