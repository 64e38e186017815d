use std::time::Instant;

use tracing::{debug, info};

use crate::constants::{HASH_HEX_SIZE, POW_TARGET_TIME_SECS, POW_TIME_TOLERANCE_SECS};
use crate::error::{Result, ValidationError};
use crate::{now_timestamp, Block, BlockData, Chain, Transaction};

/// A block that satisfies its difficulty, plus the values the next round
/// adapts from.
#[derive(Clone, Debug)]
pub struct MinedBlock {
    pub block: Block,
    pub hash: String,
    pub difficulty: u32,
    pub duration_secs: f64,
}

/// Step the difficulty by at most one towards the target block time.
/// Saturates at 0 and at `HASH_HEX_SIZE`, where the step becomes 0.
pub fn adjust_difficulty(prior_difficulty: u32, prior_duration_secs: f64) -> u32 {
    if prior_duration_secs > POW_TARGET_TIME_SECS + POW_TIME_TOLERANCE_SECS {
        debug!(prior_duration_secs, "mining was too slow last time, lowering difficulty");
        prior_difficulty.saturating_sub(1)
    } else if prior_duration_secs < POW_TARGET_TIME_SECS - POW_TIME_TOLERANCE_SECS {
        debug!(prior_duration_secs, "mining was too fast last time, raising difficulty");
        (prior_difficulty + 1).min(HASH_HEX_SIZE as u32)
    } else {
        prior_difficulty
    }
}

/// True when the first `difficulty` hex characters of `hash` are all `'0'`.
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let difficulty = difficulty as usize;
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}

/// Mine the block that extends `chain` with `transactions`.
///
/// Plain sequential nonce search starting at the predecessor's nonce + 1.
/// Blocks the calling thread until a hash is found, so async callers should
/// run it on a blocking worker.
pub fn mine(
    chain: &Chain,
    transactions: Vec<Transaction>,
    prior_difficulty: u32,
    prior_duration_secs: f64,
) -> Result<MinedBlock> {
    let previous = chain.last().ok_or(ValidationError::EmptyChain)?;
    let difficulty = adjust_difficulty(prior_difficulty, prior_duration_secs);

    let mut block = Block {
        index: previous.index + 1,
        timestamp: now_timestamp(),
        data: BlockData {
            nonce: previous.data.nonce + 1,
            transactions,
        },
        previous_hash: previous.content_hash(),
    };

    let start = Instant::now();
    let hash = loop {
        let hash = block.content_hash();
        if meets_difficulty(&hash, difficulty) {
            break hash;
        }
        block.data.nonce = block.data.nonce.wrapping_add(1);
    };
    let duration_secs = start.elapsed().as_secs_f64();

    info!(
        index = block.index,
        nonce = block.data.nonce,
        difficulty,
        duration_secs,
        "Mined block {hash}"
    );

    Ok(MinedBlock {
        block,
        hash,
        difficulty,
        duration_secs,
    })
}
