use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, TimeoutMs};

/// Settings of a worker pool queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoolConfig {
    /// Number of workers, i.e. how many tasks may execute at once.
    pub workers: usize,
    /// Per-task execution timeout.
    ///
    /// When it expires the worker treats the task as abandoned and fetches the next one.
    /// `None` disables the timer: a worker then waits for the task to settle on its own.
    pub timeout_ms: Option<TimeoutMs>,
}

impl PoolConfig {
    pub fn new(workers: usize, timeout_ms: TimeoutMs) -> Self {
        Self {
            workers,
            timeout_ms: Some(timeout_ms),
        }
    }

    #[inline]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[inline]
    pub fn with_timeout_ms(mut self, timeout_ms: TimeoutMs) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    #[inline]
    pub fn without_timeout(mut self) -> Self {
        self.timeout_ms = None;
        self
    }

    /// Task timeout as a [`Duration`], if enabled.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.timeout_ms == Some(0) {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(1, 1_000)
    }
}
