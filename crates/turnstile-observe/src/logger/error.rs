use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("unknown log format {0:?}; expected text, json or journald")]
    UnknownFormat(String),

    #[error("journald output needs Linux and the `journald` feature")]
    JournaldUnavailable,

    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,

    #[error("failed to install tracing subscriber: {0}")]
    Install(String),

    #[error("invalid filter directive {directive:?}: {reason}")]
    InvalidFilter { directive: String, reason: String },
}
