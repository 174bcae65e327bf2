//! The shared chain. All mutation goes through [`Ledger::append`].

use crate::{chain, clock::unix_now, AppendError, Block, ChainError, Difficulty};
use parking_lot::RwLock;
use tracing::{debug, info};

/// In-memory, append-only chain of finalized blocks.
///
/// Share it between workers with an `Arc`; readers take the read lock only
/// long enough to clone, and `append` holds the write lock for the linkage
/// check and the push.
#[derive(Debug)]
pub struct Ledger {
    // Never empty: genesis is pushed at construction.
    blocks: RwLock<Vec<Block>>,
    difficulty: Difficulty,
}

impl Ledger {
    pub fn new(difficulty: Difficulty) -> Self {
        Self::with_genesis_timestamp(difficulty, unix_now())
    }

    pub fn with_genesis_timestamp(difficulty: Difficulty, timestamp: u64) -> Self {
        let genesis = Block::genesis(timestamp);
        info!(difficulty = difficulty.zeros(), "ledger created with genesis block");
        Self {
            blocks: RwLock::new(vec![genesis]),
            difficulty,
        }
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Copy of the most recently accepted block.
    pub fn tip(&self) -> Block {
        let blocks = self.blocks.read();
        blocks[blocks.len() - 1].clone()
    }

    /// Try to extend the chain with `candidate`.
    ///
    /// Hash and difficulty are checked before taking the lock. Index,
    /// `prev_hash` and timestamp are checked against the tip under the write
    /// lock, so of two candidates built on the same tip only the first one in
    /// wins. Returns the accepted index; on error nothing is stored.
    pub fn append(&self, candidate: Block) -> Result<u64, AppendError> {
        chain::check_work(&candidate, self.difficulty)?;

        let mut blocks = self.blocks.write();
        let tip = &blocks[blocks.len() - 1];
        if let Err(e) = chain::check_link(tip, &candidate) {
            debug!(index = candidate.index, reason = %e, "append rejected");
            return Err(e);
        }
        let index = candidate.index;
        blocks.push(candidate);
        Ok(index)
    }

    /// Every block from genesis to the current tip, in order.
    pub fn snapshot(&self) -> Vec<Block> {
        self.blocks.read().clone()
    }

    /// Index of the tip; the chain holds `height() + 1` blocks.
    pub fn height(&self) -> u64 {
        (self.blocks.read().len() - 1) as u64
    }

    pub fn verify(&self) -> Result<(), ChainError> {
        chain::verify(&self.snapshot(), self.difficulty)
    }
}
