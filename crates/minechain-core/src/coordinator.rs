//! Spawns the miner pool, waits for it, and hands back the final chain.

use crate::{
    chain, Block, ConfigError, CoordinatorError, Ledger, Miner, MinerError, MinerReport,
    MiningConfig, PowError,
};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, RecvTimeoutError},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};
use tracing::{error, info, warn};

/// `"Block 1"` through `"Block n"`.
pub fn default_payloads(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("Block {i}")).collect()
}

#[derive(Clone, Debug)]
pub struct RunReport {
    /// Genesis to tip, in acceptance order.
    pub chain: Vec<Block>,
    /// One per worker, sorted by the index each one claimed.
    pub reports: Vec<MinerReport>,
    pub elapsed: Duration,
}

pub struct Coordinator {
    config: MiningConfig,
}

impl Coordinator {
    pub fn new(config: MiningConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MiningConfig {
        &self.config
    }

    /// Run `config.workers` miners with [`default_payloads`].
    pub fn run_default(&self) -> Result<RunReport, CoordinatorError> {
        self.config.validate()?;
        self.run(default_payloads(self.config.workers))
    }

    /// One miner thread per payload against a fresh ledger. Returns once
    /// every miner has landed its block, or the timeout has passed.
    pub fn run<I, S>(&self, payloads: I) -> Result<RunReport, CoordinatorError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let payloads: Vec<String> = payloads.into_iter().map(Into::into).collect();
        if payloads.is_empty() {
            return Err(ConfigError::NoWorkers.into());
        }
        let workers = payloads.len();
        let started = Instant::now();

        let ledger = Arc::new(Ledger::new(self.config.difficulty));
        let stop_signal = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = mpsc::channel::<usize>();

        info!(
            workers,
            difficulty = self.config.difficulty.zeros(),
            search_mode = ?self.config.search_mode,
            "starting miners"
        );

        let mut handles = Vec::with_capacity(workers);
        for (i, payload) in payloads.into_iter().enumerate() {
            let worker_id = i + 1;
            let miner = Miner::new(worker_id, payload, Arc::clone(&ledger))
                .with_stop_signal(Arc::clone(&stop_signal))
                .with_search_mode(self.config.search_mode);
            let done_tx = done_tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("miner-{worker_id}"))
                .spawn(move || {
                    let outcome = miner.run();
                    let _ = done_tx.send(worker_id);
                    outcome
                });
            match spawned {
                Ok(handle) => handles.push((worker_id, handle)),
                Err(e) => {
                    stop_signal.store(true, Ordering::Relaxed);
                    for (_, handle) in handles {
                        let _ = handle.join();
                    }
                    return Err(CoordinatorError::Spawn(e));
                }
            }
        }
        drop(done_tx);

        let timed_out = self.wait_for(&done_rx, workers, started);
        if timed_out {
            warn!(timeout = ?self.config.timeout, "timeout reached, cancelling miners");
            stop_signal.store(true, Ordering::Relaxed);
        }

        let mut reports = Vec::with_capacity(workers);
        let mut failure = None;
        for (worker_id, handle) in handles {
            match handle.join() {
                Ok(Ok(report)) => reports.push(report),
                Ok(Err(MinerError::Pow {
                    source: PowError::Cancelled,
                    ..
                })) if timed_out => {}
                Ok(Err(e)) => {
                    error!(worker_id, error = %e, "miner failed");
                    failure.get_or_insert(CoordinatorError::Miner(e));
                }
                Err(_) => {
                    error!(worker_id, "miner panicked");
                    failure.get_or_insert(CoordinatorError::WorkerPanicked { worker_id });
                }
            }
        }

        let chain = ledger.snapshot();
        if let Some(e) = failure {
            return Err(e);
        }
        if timed_out {
            return Err(CoordinatorError::TimedOut {
                completed: reports.len(),
                workers,
                chain,
            });
        }

        chain::verify(&chain, self.config.difficulty)?;
        reports.sort_by_key(|r| r.block.index);
        let elapsed = started.elapsed();
        info!(blocks = chain.len(), ?elapsed, "all miners finished");
        Ok(RunReport {
            chain,
            reports,
            elapsed,
        })
    }

    /// Block until `workers` completions arrive or the deadline passes.
    /// Returns true on timeout.
    fn wait_for(&self, done_rx: &mpsc::Receiver<usize>, workers: usize, started: Instant) -> bool {
        let deadline = self.config.timeout.map(|t| started + t);
        let mut finished = 0;
        while finished < workers {
            let received = match deadline {
                Some(deadline) => {
                    done_rx.recv_timeout(deadline.saturating_duration_since(Instant::now()))
                }
                None => done_rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(_) => finished += 1,
                Err(RecvTimeoutError::Timeout) => return true,
                // A miner panicked before reporting; join() surfaces it.
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Difficulty;

    fn config(zeros: u8) -> MiningConfig {
        MiningConfig::default().with_difficulty(Difficulty::new(zeros).unwrap())
    }

    #[test]
    fn default_payload_labels() {
        assert_eq!(default_payloads(3), vec!["Block 1", "Block 2", "Block 3"]);
        assert!(default_payloads(0).is_empty());
    }

    #[test]
    fn two_workers_fill_two_slots() {
        let report = Coordinator::new(config(1)).run(["X", "Y"]).unwrap();
        let chain = &report.chain;
        assert_eq!(chain.len(), 3);
        assert!(chain[0].is_genesis());
        assert!(chain[1].hash.to_hex().starts_with('0'));
        assert!(chain[2].hash.to_hex().starts_with('0'));

        let mut payloads = vec![chain[1].payload.as_str(), chain[2].payload.as_str()];
        payloads.sort();
        assert_eq!(payloads, vec!["X", "Y"]);

        assert_eq!(report.reports.len(), 2);
        assert_eq!(report.reports[0].block, chain[1]);
        assert_eq!(report.reports[1].block, chain[2]);
    }

    #[test]
    fn run_default_uses_worker_count() {
        let report = Coordinator::new(config(1).with_workers(3))
            .run_default()
            .unwrap();
        assert_eq!(report.chain.len(), 4);
    }

    #[test]
    fn empty_payloads_rejected() {
        let err = Coordinator::new(config(1))
            .run(Vec::<String>::new())
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::Config(ConfigError::NoWorkers)));
    }

    #[test]
    fn timeout_cancels_hopeless_search() {
        let config = config(64).with_timeout(Duration::from_millis(100));
        let err = Coordinator::new(config).run(["X", "Y"]).unwrap_err();
        match err {
            CoordinatorError::TimedOut {
                completed,
                workers,
                chain,
            } => {
                assert_eq!(completed, 0);
                assert_eq!(workers, 2);
                assert_eq!(chain.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
