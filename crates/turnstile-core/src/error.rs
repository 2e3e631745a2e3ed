use thiserror::Error;
use turnstile_model::{ConfigError, WorkerId};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),

    #[error("no tokio runtime available to drive the coordinator")]
    NoRuntime,

    #[error("unknown worker: {0}")]
    UnknownWorker(WorkerId),
}
