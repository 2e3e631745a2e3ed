//! Plain data shared by the turnstile coordinators and their consumers.
//!
//! Nothing in here spawns, locks or sleeps: identifiers, settlement outcomes
//! and the configuration structs that hosts deserialize before building a
//! [`WorkerPoolQueue`] or a [`SingleFlightGate`].
//!
//! [`WorkerPoolQueue`]: https://docs.rs/turnstile-core
//! [`SingleFlightGate`]: https://docs.rs/turnstile-core

mod domain;
pub use domain::*;

mod config;
pub use config::*;

mod error;
pub use error::ConfigError;
