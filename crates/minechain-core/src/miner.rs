use crate::{
    clock::{Clock, SystemClock},
    pow, AppendError, Block, Ledger, MinerError, PowError, Preimage, Solution,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::{debug, info, info_span};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SearchMode {
    /// One thread per worker, linear scan.
    #[default]
    Sequential,
    /// Each worker splits its nonce range over the rayon pool.
    Parallel,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MinerState {
    Searching,
    Accepted(Block),
}

/// Outcome of a single search-and-append round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Attempt {
    Accepted(Block),
    /// Another worker extended the chain first.
    Rejected(AppendError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MinerReport {
    pub worker_id: usize,
    pub block: Block,
    /// Append attempts, including the one that succeeded.
    pub attempts: u64,
    /// Nonces hashed over all rounds.
    pub hashes: u64,
}

/// A worker that extends the ledger with one payload.
pub struct Miner {
    id: usize,
    payload: String,
    ledger: Arc<Ledger>,
    stop_signal: Arc<AtomicBool>,
    search_mode: SearchMode,
    clock: Arc<dyn Clock>,
    attempts: u64,
    hashes: u64,
}

impl Miner {
    pub fn new(id: usize, payload: impl Into<String>, ledger: Arc<Ledger>) -> Self {
        Self {
            id,
            payload: payload.into(),
            ledger,
            stop_signal: Arc::new(AtomicBool::new(false)),
            search_mode: SearchMode::default(),
            clock: Arc::new(SystemClock),
            attempts: 0,
            hashes: 0,
        }
    }

    pub fn with_stop_signal(mut self, stop_signal: Arc<AtomicBool>) -> Self {
        self.stop_signal = stop_signal;
        self
    }

    pub fn with_search_mode(mut self, search_mode: SearchMode) -> Self {
        self.search_mode = search_mode;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Fixed fields of the block that would follow `tip`. The timestamp never
    /// goes below the tip's so the chain stays non-decreasing.
    pub fn candidate_for(&self, tip: &Block) -> Preimage {
        Preimage::new(
            tip.index + 1,
            self.clock.now().max(tip.timestamp),
            self.payload.clone(),
            tip.hash,
        )
    }

    fn search(&self, preimage: &Preimage) -> Result<Solution, PowError> {
        let difficulty = self.ledger.difficulty();
        match self.search_mode {
            SearchMode::Sequential => pow::mine_cancellable(preimage, difficulty, &self.stop_signal),
            SearchMode::Parallel => pow::mine_parallel(preimage, difficulty, &self.stop_signal),
        }
    }

    /// Read the tip and run the proof-of-work search against it. No lock is
    /// held while searching.
    pub fn prepare(&mut self) -> Result<Block, MinerError> {
        let tip = self.ledger.tip();
        let preimage = self.candidate_for(&tip);
        let solution = self.search(&preimage).map_err(|source| MinerError::Pow {
            worker_id: self.id,
            source,
        })?;
        self.hashes = self.hashes.saturating_add(solution.attempts);
        Ok(preimage.into_block(&solution))
    }

    /// Hand a prepared block to the ledger. Contention comes back as
    /// [`Attempt::Rejected`]; any other refusal means the block was malformed
    /// and is fatal.
    pub fn submit(&mut self, block: Block) -> Result<Attempt, MinerError> {
        self.attempts += 1;
        match self.ledger.append(block.clone()) {
            Ok(_) => Ok(Attempt::Accepted(block)),
            Err(e) if e.is_contention() => Ok(Attempt::Rejected(e)),
            Err(source) => Err(MinerError::Rejected {
                worker_id: self.id,
                source,
            }),
        }
    }

    /// One full round: fresh tip, search, append.
    pub fn attempt(&mut self) -> Result<Attempt, MinerError> {
        let block = self.prepare()?;
        self.submit(block)
    }

    /// Retry rounds until the payload is on the chain. A lost race discards
    /// the stale search and starts over from the new tip.
    pub fn run(mut self) -> Result<MinerReport, MinerError> {
        let span = info_span!("miner", id = self.id);
        let _enter = span.enter();

        let mut state = MinerState::Searching;
        loop {
            state = match state {
                MinerState::Searching => match self.attempt()? {
                    Attempt::Accepted(block) => MinerState::Accepted(block),
                    Attempt::Rejected(reason) => {
                        debug!(%reason, attempts = self.attempts, "lost race, retrying on new tip");
                        if self.stop_signal.load(Ordering::Relaxed) {
                            return Err(MinerError::Pow {
                                worker_id: self.id,
                                source: PowError::Cancelled,
                            });
                        }
                        MinerState::Searching
                    }
                },
                MinerState::Accepted(block) => {
                    info!(
                        index = block.index,
                        nonce = block.nonce,
                        hash = %block.hash,
                        attempts = self.attempts,
                        "block accepted"
                    );
                    return Ok(MinerReport {
                        worker_id: self.id,
                        block,
                        attempts: self.attempts,
                        hashes: self.hashes,
                    });
                }
            };
        }
    }
}
