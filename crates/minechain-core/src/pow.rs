use crate::{
    constants::{CANCEL_POLL_INTERVAL, DEFAULT_DIFFICULTY, HASH_HEX_SIZE, PARALLEL_BATCH},
    BlockHash, ConfigError, PowError, Preimage,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    str::FromStr,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
};
use tracing::trace;

/// Number of leading `'0'` hex characters a block hash must carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Difficulty(u8);

impl Difficulty {
    pub fn new(zeros: u8) -> Result<Self, ConfigError> {
        if zeros == 0 || zeros as usize > HASH_HEX_SIZE {
            return Err(ConfigError::DifficultyOutOfRange(zeros));
        }
        Ok(Self(zeros))
    }

    pub fn zeros(self) -> u8 {
        self.0
    }

    pub fn is_met_by(self, hash: &BlockHash) -> bool {
        leading_zero_nibbles(hash) >= u32::from(self.0)
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self(DEFAULT_DIFFICULTY)
    }
}

impl TryFrom<u8> for Difficulty {
    type Error = ConfigError;

    fn try_from(zeros: u8) -> Result<Self, Self::Error> {
        Self::new(zeros)
    }
}

impl From<Difficulty> for u8 {
    fn from(d: Difficulty) -> u8 {
        d.0
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Difficulty {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let zeros: u8 = s
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidDifficulty(s.to_string()))?;
        Self::new(zeros)
    }
}

/// Count of leading zero hex digits (nibbles) in the hash. Equal to the
/// number of leading `'0'` characters of its hex rendering.
pub fn leading_zero_nibbles(hash: &BlockHash) -> u32 {
    let mut total = 0u32;
    for b in hash.as_bytes() {
        if *b == 0 {
            total += 2;
        } else {
            if *b < 0x10 {
                total += 1;
            }
            break;
        }
    }
    total
}

/// A nonce meeting the difficulty, its hash, and how many hashes were
/// computed to find it. That is `nonce + 1` for a linear scan; a parallel
/// search also counts the nonces its batch evaluated past the winner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Solution {
    pub nonce: u64,
    pub hash: BlockHash,
    pub attempts: u64,
}

impl Solution {
    fn at(nonce: u64, hash: BlockHash) -> Self {
        Self {
            nonce,
            hash,
            attempts: nonce.saturating_add(1),
        }
    }
}

/// Linear scan from nonce 0; returns the smallest nonce whose hash meets
/// `difficulty`.
pub fn mine(preimage: &Preimage, difficulty: Difficulty) -> Result<Solution, PowError> {
    mine_cancellable(preimage, difficulty, &AtomicBool::new(false))
}

/// Same as [`mine`], but gives up with [`PowError::Cancelled`] once `stop`
/// is raised. The flag is read every `CANCEL_POLL_INTERVAL` nonces.
pub fn mine_cancellable(
    preimage: &Preimage,
    difficulty: Difficulty,
    stop: &AtomicBool,
) -> Result<Solution, PowError> {
    for nonce in 0..=u64::MAX {
        if nonce % CANCEL_POLL_INTERVAL == 0 && stop.load(Ordering::Relaxed) {
            return Err(PowError::Cancelled);
        }
        let hash = preimage.hash_with_nonce(nonce);
        if difficulty.is_met_by(&hash) {
            trace!(index = preimage.index, nonce, "nonce found");
            return Ok(Solution::at(nonce, hash));
        }
    }
    Err(PowError::NonceSpaceExhausted)
}

/// Splits the nonce range across the rayon pool in batches of
/// `PARALLEL_BATCH`. `find_map_first` keeps the result identical to the
/// linear scan: the smallest qualifying nonce wins. Work past the winner is
/// bounded by the batch it falls in.
pub fn mine_parallel(
    preimage: &Preimage,
    difficulty: Difficulty,
    stop: &AtomicBool,
) -> Result<Solution, PowError> {
    mine_batched(preimage, difficulty, stop, PARALLEL_BATCH)
}

fn mine_batched(
    preimage: &Preimage,
    difficulty: Difficulty,
    stop: &AtomicBool,
    batch: u64,
) -> Result<Solution, PowError> {
    let batch = batch.max(1);
    let hashed = AtomicU64::new(0);
    let mut start = 0u64;
    loop {
        if stop.load(Ordering::Relaxed) {
            return Err(PowError::Cancelled);
        }
        let end = start.saturating_add(batch - 1);
        let found = (start..=end).into_par_iter().find_map_first(|nonce| {
            hashed.fetch_add(1, Ordering::Relaxed);
            let hash = preimage.hash_with_nonce(nonce);
            difficulty.is_met_by(&hash).then_some((nonce, hash))
        });
        if let Some((nonce, hash)) = found {
            let attempts = hashed.load(Ordering::Relaxed);
            trace!(index = preimage.index, nonce, attempts, "nonce found");
            return Ok(Solution {
                nonce,
                hash,
                attempts,
            });
        }
        if end == u64::MAX {
            return Err(PowError::NonceSpaceExhausted);
        }
        start = end + 1;
    }
}
