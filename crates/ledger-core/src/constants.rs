pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

pub const GENESIS_ACCOUNT: &str = "genesis";
pub const NETWORK_ACCOUNT: &str = "network";
pub const TOTAL_SUPPLY: f64 = 1_000_000_000.0;
pub const GENESIS_NONCE: u64 = 1;

pub const MIN_TRANSACTION_FEE: f64 = 0.01;
pub const MAX_TRANSACTIONS_PER_BLOCK: usize = 10;

pub const POW_TARGET_TIME_SECS: f64 = 60.0;
pub const POW_TIME_TOLERANCE_SECS: f64 = 10.0;
pub const DEFAULT_POW_DIFFICULTY: u32 = 4;
