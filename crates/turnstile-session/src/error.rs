use thiserror::Error;
use turnstile_core::CoreError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("login failed: {0}")]
    Login(String),

    #[error("session probe failed: {0}")]
    Probe(String),

    #[error("no valid session after {logins} logins")]
    Exhausted { logins: u32 },

    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

#[derive(Debug, Error)]
pub enum TokenError {
    /// The token endpoint asked to retry later.
    #[error("token endpoint busy")]
    Busy,

    #[error("token request rejected: {code}: {message}")]
    Rejected { code: i64, message: String },

    #[error("token request failed: {0}")]
    Transport(String),

    #[error("core error: {0}")]
    Core(#[from] CoreError),
}
