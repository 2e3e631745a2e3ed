//! # Admission-controlled task coordination.
//!
//! Two coordinators serialize access to slow, fallible, shareable operations:
//!
//! - [`SingleFlightGate`]: one operation at a time, FIFO, with an idle-timeout
//!   watchdog that frees the slot when the running operation hangs.
//! - [`WorkerPoolQueue`]: `N` workers pulling [`Task`]s in FIFO order, each task
//!   bounded by an execution timeout after which its worker moves on.
//!
//! ## Rules
//! - Operations run in the caller's context; coordinators only decide *when*.
//! - Eviction or timeout frees the coordinator's slot, it never aborts the operation.
//! - A caller observes its operation's own output and nothing else.

pub mod error;
pub use error::CoreError;

pub mod event;
pub use event::{Bus, Event, EventKind, Subscribe};

pub mod task;
pub use task::{Finish, Task};

pub mod pool;
pub use pool::{Fetch, WorkerPoolQueue};

pub mod gate;
pub use gate::SingleFlightGate;

pub mod prelude {
    pub use crate::error::CoreError;
    pub use crate::event::{Event, EventKind, Subscribe};
    pub use crate::gate::SingleFlightGate;
    pub use crate::pool::WorkerPoolQueue;
    pub use turnstile_model::{GateConfig, PoolConfig, Settlement};
}
