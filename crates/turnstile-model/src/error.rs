use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("worker pool needs at least one worker")]
    NoWorkers,
    #[error("timeout must be greater than zero (use no timeout to disable it)")]
    ZeroTimeout,
}
