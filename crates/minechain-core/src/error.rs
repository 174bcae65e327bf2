use crate::{BlockHash, Block};
use thiserror::Error;

/// Failure of a nonce search. Both cases are terminal for the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PowError {
    #[error("nonce space exhausted without meeting the difficulty")]
    NonceSpaceExhausted,
    #[error("search cancelled")]
    Cancelled,
}

/// Why a candidate block was refused by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppendError {
    #[error("candidate index {got} does not extend the tip (expected {expected})")]
    IndexMismatch { expected: u64, got: u64 },
    #[error("candidate prev_hash {got} does not match tip hash {expected}")]
    PrevHashMismatch { expected: BlockHash, got: BlockHash },
    #[error("candidate timestamp {got} is older than the tip's {previous}")]
    TimestampRegression { previous: u64, got: u64 },
    #[error("block {index} carries a hash that does not match its fields")]
    HashMismatch { index: u64 },
    #[error("block {index} hash does not have {required} leading zero hex digits")]
    InsufficientWork { index: u64, required: u8 },
}

impl AppendError {
    /// True when another worker claimed the position first. Such rejections
    /// are expected and the candidate should be rebuilt on the new tip.
    pub fn is_contention(&self) -> bool {
        matches!(
            self,
            AppendError::IndexMismatch { .. } | AppendError::PrevHashMismatch { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("chain is empty")]
    Empty,
    #[error("first block is not the genesis sentinel")]
    BadGenesis,
    #[error("block {index} is invalid: {source}")]
    InvalidBlock {
        index: u64,
        #[source]
        source: AppendError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("at least one worker is required")]
    NoWorkers,
    #[error("difficulty must be between 1 and 64 leading zero hex digits, got {0}")]
    DifficultyOutOfRange(u8),
    #[error("invalid difficulty {0:?}")]
    InvalidDifficulty(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HashParseError {
    #[error("expected 64 hex characters, got {0}")]
    Length(usize),
    #[error(transparent)]
    Hex(#[from] hex::FromHexError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MinerError {
    #[error("miner {worker_id}: {source}")]
    Pow {
        worker_id: usize,
        #[source]
        source: PowError,
    },
    #[error("miner {worker_id} produced a block the ledger refused: {source}")]
    Rejected {
        worker_id: usize,
        #[source]
        source: AppendError,
    },
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to spawn miner thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("miner {worker_id} panicked")]
    WorkerPanicked { worker_id: usize },
    #[error(transparent)]
    Miner(#[from] MinerError),
    #[error("timed out with {completed} of {workers} miners finished")]
    TimedOut {
        completed: usize,
        workers: usize,
        chain: Vec<Block>,
    },
    #[error("final chain failed verification: {0}")]
    InvalidChain(#[from] ChainError),
}
