pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const DEFAULT_WORKERS: usize = 5;
pub const DEFAULT_DIFFICULTY: u8 = 4;
pub const GENESIS_PAYLOAD: &str = "Genesis Block";
/// Nonces tried between two reads of the stop flag.
pub const CANCEL_POLL_INTERVAL: u64 = 4096;
/// Nonces handed to the rayon pool per round of a parallel search.
pub const PARALLEL_BATCH: u64 = 1 << 16;
