//! Consumers of the coordination layer.
//!
//! - [`SessionGuard`]: keeps a remote session alive; concurrent callers share one check-login
//!   routine through a [`SingleFlightGate`](turnstile_core::SingleFlightGate).
//! - [`AccessToken`]: cached bearer token refreshed through a one-worker
//!   [`WorkerPoolQueue`](turnstile_core::WorkerPoolQueue).
//! - [`poll_loop`]: fixed-pace driver for periodic rounds.
//!
//! Remote collaborators stay behind [`Authenticator`] and [`TokenSource`].

mod error;
pub use error::{SessionError, TokenError};

mod guard;
pub use guard::{Authenticator, DEFAULT_MAX_LOGINS, SessionGuard};

mod token;
pub use token::{
    AccessToken, DEFAULT_BUSY_RETRIES, EXPIRY_MARGIN, Grant, REFRESH_TIMEOUT_MS, TokenSource,
};

mod poll;
pub use poll::poll_loop;
