use crate::{constants::DEFAULT_WORKERS, ConfigError, Difficulty, SearchMode};
use std::time::Duration;

/// Knobs for a mining run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MiningConfig {
    /// Workers to spawn when no explicit payloads are given.
    pub workers: usize,
    pub difficulty: Difficulty,
    pub search_mode: SearchMode,
    /// Give up and cancel outstanding searches after this long.
    pub timeout: Option<Duration>,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            difficulty: Difficulty::default(),
            search_mode: SearchMode::Sequential,
            timeout: None,
        }
    }
}

impl MiningConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_search_mode(mut self, search_mode: SearchMode) -> Self {
        self.search_mode = search_mode;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        Ok(())
    }
}
