pub mod balance;
pub mod consensus;
pub mod constants;
pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod mine;
pub mod state;
pub mod validation;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

pub use chain::Chain;
pub use error::{LedgerError, PeerError, ValidationError};
pub use state::NodeState;

/// Seconds since the epoch, with sub-second precision.
pub fn now_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

fn canonical_json<T: Serialize + ?Sized>(value: &T) -> Vec<u8> {
    // serde_json only fails on non-string map keys, and these types have no maps.
    serde_json::to_vec(value).expect("ledger values always serialize to JSON")
}

/// A ledger entry. Submitted transfers carry a `transaction_fee`; entries
/// written into blocks (fee payments, transfers, genesis funding) do not.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub from: String,
    pub to: String,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_fee: Option<f64>,
    pub timestamp: f64,
}

#[derive(Serialize)]
struct TransactionIdPreimage<'a> {
    from: &'a str,
    to: &'a str,
    amount: f64,
    timestamp: f64,
}

impl Transaction {
    pub fn transfer(from: impl Into<String>, to: impl Into<String>, amount: f64, timestamp: f64) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            amount,
            transaction_fee: None,
            timestamp,
        }
    }

    pub fn fee(&self) -> f64 {
        self.transaction_fee.unwrap_or(0.0)
    }

    /// Display id for clients. Not stored anywhere and not part of any block hash.
    pub fn id(&self) -> String {
        let preimage = TransactionIdPreimage {
            from: &self.from,
            to: &self.to,
            amount: self.amount,
            timestamp: self.timestamp,
        };
        hex::encode(Sha256::digest(canonical_json(&preimage)))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockData {
    pub nonce: u64,
    pub transactions: Vec<Transaction>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: f64,
    pub data: BlockData,
    pub previous_hash: String,
}

impl Block {
    /// SHA-256 over `index`, `timestamp`, `data` and `previous_hash`, in that
    /// order and without separators. The index is written as a decimal
    /// integer; the other three use their serde_json form, so field order
    /// and float formatting are fixed by the types.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.index.to_string().as_bytes());
        hasher.update(canonical_json(&self.timestamp));
        hasher.update(canonical_json(&self.data));
        hasher.update(self.previous_hash.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.previous_hash == constants::ZERO_HASH
    }
}

pub mod chain {
    use super::*;
    use crate::constants::{GENESIS_ACCOUNT, GENESIS_NONCE, NETWORK_ACCOUNT, TOTAL_SUPPLY, ZERO_HASH};
    use crate::error::ValidationError;

    /// An owned, contiguous run of blocks starting at genesis. Links are
    /// checked by position, never through references between blocks.
    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Chain {
        blocks: Vec<Block>,
    }

    impl Chain {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_genesis() -> Self {
            Self {
                blocks: vec![genesis_block()],
            }
        }

        /// Rebuild a chain received from elsewhere, rejecting it unless every
        /// link holds.
        pub fn from_blocks(blocks: Vec<Block>) -> Result<Self, ValidationError> {
            let chain = Self { blocks };
            chain.verify()?;
            Ok(chain)
        }

        pub fn blocks(&self) -> &[Block] {
            &self.blocks
        }

        pub fn into_blocks(self) -> Vec<Block> {
            self.blocks
        }

        pub fn len(&self) -> usize {
            self.blocks.len()
        }

        pub fn is_empty(&self) -> bool {
            self.blocks.is_empty()
        }

        pub fn last(&self) -> Option<&Block> {
            self.blocks.last()
        }

        pub fn last_hash(&self) -> Option<String> {
            self.last().map(Block::content_hash)
        }

        pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
            self.blocks.iter().flat_map(|b| b.data.transactions.iter())
        }

        /// Append a block that extends the current tip.
        pub fn append(&mut self, block: Block) -> Result<(), ValidationError> {
            match self.blocks.last() {
                None if block.is_genesis() => {}
                None => return Err(ValidationError::BadGenesis),
                Some(last) => {
                    if block.index != last.index + 1 {
                        return Err(ValidationError::IndexGap {
                            position: self.blocks.len(),
                            index: block.index,
                        });
                    }
                    if block.previous_hash != last.content_hash() {
                        return Err(ValidationError::BrokenLink { index: block.index });
                    }
                }
            }
            self.blocks.push(block);
            Ok(())
        }

        pub fn verify(&self) -> Result<(), ValidationError> {
            let first = self.blocks.first().ok_or(ValidationError::EmptyChain)?;
            if !first.is_genesis() {
                return Err(ValidationError::BadGenesis);
            }
            for (position, pair) in self.blocks.windows(2).enumerate() {
                let (prev, block) = (&pair[0], &pair[1]);
                if block.index != prev.index + 1 {
                    return Err(ValidationError::IndexGap {
                        position: position + 1,
                        index: block.index,
                    });
                }
                if block.previous_hash != prev.content_hash() {
                    return Err(ValidationError::BrokenLink { index: block.index });
                }
            }
            Ok(())
        }
    }

    /// Index 0, a single transaction funding the network account with the
    /// whole money supply, and the all-zero predecessor hash.
    pub fn genesis_block() -> Block {
        let now = now_timestamp();
        Block {
            index: 0,
            timestamp: now,
            data: BlockData {
                nonce: GENESIS_NONCE,
                transactions: vec![Transaction::transfer(
                    GENESIS_ACCOUNT,
                    NETWORK_ACCOUNT,
                    TOTAL_SUPPLY,
                    now,
                )],
            },
            previous_hash: ZERO_HASH.to_string(),
        }
    }
}
