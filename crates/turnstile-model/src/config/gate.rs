use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, TimeoutMs};

/// Settings of a single-flight gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GateConfig {
    /// How long the running operation may hold the gate before the watchdog evicts it.
    pub idle_timeout_ms: TimeoutMs,
}

impl GateConfig {
    pub fn new(idle_timeout_ms: TimeoutMs) -> Self {
        Self { idle_timeout_ms }
    }

    #[inline]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.idle_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self::new(2 * 60 * 1_000)
    }
}
