pub mod clock;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod miner;
pub mod pow;

use constants::{GENESIS_PAYLOAD, HASH_HEX_SIZE, HASH_SIZE};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::{fmt, str::FromStr};

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::MiningConfig;
pub use coordinator::{default_payloads, Coordinator, RunReport};
pub use error::{
    AppendError, ChainError, ConfigError, CoordinatorError, HashParseError, MinerError, PowError,
};
pub use ledger::Ledger;
pub use miner::{Attempt, Miner, MinerReport, MinerState, SearchMode};
pub use pow::{Difficulty, Solution};

/// SHA-256 digest of a block preimage. Displayed and serialized as 64
/// lowercase hex characters.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockHash([u8; HASH_SIZE]);

impl BlockHash {
    /// Genesis sentinel, `"0" * 64`.
    pub const ZERO: BlockHash = BlockHash([0u8; HASH_SIZE]);

    pub const fn from_bytes(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.to_hex())
    }
}

impl FromStr for BlockHash {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != HASH_HEX_SIZE {
            return Err(HashParseError::Length(s.len()));
        }
        let mut out = [0u8; HASH_SIZE];
        hex::decode_to_slice(s, &mut out)?;
        Ok(Self(out))
    }
}

impl Serialize for BlockHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BlockHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Renders `n` as exactly 20 ASCII decimal digits, zero padded.
/// `u64::MAX` has 20 digits so every value fits.
fn decimal20(mut n: u64) -> [u8; 20] {
    let mut out = [b'0'; 20];
    for slot in out.iter_mut().rev() {
        *slot = b'0' + (n % 10) as u8;
        n /= 10;
    }
    out
}

/// The fixed part of a candidate block; the nonce is varied by the search.
///
/// Encoding, in order, with no separators:
///
/// ```text
/// index:020 | timestamp:020 | payload_len:020 | payload | prev_hash (64 hex) | nonce:020
/// ```
///
/// Every integer is fixed width and the payload is length-prefixed, so no two
/// distinct field tuples share an encoding.
#[derive(Clone)]
pub struct Preimage {
    pub index: u64,
    pub timestamp: u64,
    pub payload: String,
    pub prev_hash: BlockHash,
    midstate: Sha256,
}

impl Preimage {
    pub fn new(index: u64, timestamp: u64, payload: impl Into<String>, prev_hash: BlockHash) -> Self {
        let payload = payload.into();
        let mut midstate = Sha256::new();
        midstate.update(decimal20(index));
        midstate.update(decimal20(timestamp));
        midstate.update(decimal20(payload.len() as u64));
        midstate.update(payload.as_bytes());
        midstate.update(prev_hash.to_hex().as_bytes());
        Self {
            index,
            timestamp,
            payload,
            prev_hash,
            midstate,
        }
    }

    pub fn hash_with_nonce(&self, nonce: u64) -> BlockHash {
        let mut hasher = self.midstate.clone();
        hasher.update(decimal20(nonce));
        BlockHash(hasher.finalize().into())
    }

    /// Finalize into a block using a nonce found by the search.
    pub fn into_block(self, solution: &Solution) -> Block {
        Block {
            index: self.index,
            timestamp: self.timestamp,
            payload: self.payload,
            prev_hash: self.prev_hash,
            hash: solution.hash,
            nonce: solution.nonce,
        }
    }
}

impl fmt::Debug for Preimage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preimage")
            .field("index", &self.index)
            .field("timestamp", &self.timestamp)
            .field("payload", &self.payload)
            .field("prev_hash", &self.prev_hash)
            .finish()
    }
}

/// Hash of `(index, timestamp, payload, prev_hash, nonce)`.
pub fn block_hash(
    index: u64,
    timestamp: u64,
    payload: &str,
    prev_hash: &BlockHash,
    nonce: u64,
) -> BlockHash {
    Preimage::new(index, timestamp, payload, *prev_hash).hash_with_nonce(nonce)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: u64,
    pub payload: String,
    pub prev_hash: BlockHash,
    pub hash: BlockHash,
    pub nonce: u64,
}

impl Block {
    /// Fixed sentinel at index 0. It carries no proof of work.
    pub fn genesis(timestamp: u64) -> Self {
        Self {
            index: 0,
            timestamp,
            payload: GENESIS_PAYLOAD.to_string(),
            prev_hash: BlockHash::ZERO,
            hash: BlockHash::ZERO,
            nonce: 0,
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.prev_hash == BlockHash::ZERO && self.hash == BlockHash::ZERO
    }

    pub fn compute_hash(&self) -> BlockHash {
        block_hash(
            self.index,
            self.timestamp,
            &self.payload,
            &self.prev_hash,
            self.nonce,
        )
    }
}

pub mod chain {
    use super::{AppendError, Block, ChainError, Difficulty};

    /// Checks that do not depend on the chain: the stored hash matches the
    /// fields and meets the difficulty.
    pub fn check_work(block: &Block, difficulty: Difficulty) -> Result<(), AppendError> {
        if block.compute_hash() != block.hash {
            return Err(AppendError::HashMismatch { index: block.index });
        }
        if !difficulty.is_met_by(&block.hash) {
            return Err(AppendError::InsufficientWork {
                index: block.index,
                required: difficulty.zeros(),
            });
        }
        Ok(())
    }

    /// Checks that `block` is the direct successor of `prev`.
    pub fn check_link(prev: &Block, block: &Block) -> Result<(), AppendError> {
        let expected = prev.index + 1;
        if block.index != expected {
            return Err(AppendError::IndexMismatch {
                expected,
                got: block.index,
            });
        }
        if block.prev_hash != prev.hash {
            return Err(AppendError::PrevHashMismatch {
                expected: prev.hash,
                got: block.prev_hash,
            });
        }
        if block.timestamp < prev.timestamp {
            return Err(AppendError::TimestampRegression {
                previous: prev.timestamp,
                got: block.timestamp,
            });
        }
        Ok(())
    }

    /// Verify a whole chain from genesis to tip.
    ///
    /// Linkage is checked against the stored hash of the parent, so block 1
    /// links to the genesis sentinel.
    pub fn verify(blocks: &[Block], difficulty: Difficulty) -> Result<(), ChainError> {
        let (genesis, rest) = blocks.split_first().ok_or(ChainError::Empty)?;
        if !genesis.is_genesis() {
            return Err(ChainError::BadGenesis);
        }
        let mut prev = genesis;
        for block in rest {
            check_work(block, difficulty)
                .and_then(|_| check_link(prev, block))
                .map_err(|source| ChainError::InvalidBlock {
                    index: block.index,
                    source,
                })?;
            prev = block;
        }
        Ok(())
    }
}
