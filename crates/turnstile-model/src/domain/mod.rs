mod task_id;
pub use task_id::TaskId;

mod worker_id;
pub use worker_id::WorkerId;

mod settlement;
pub use settlement::Settlement;

/// Timeout value in milliseconds.
///
/// Used by coordinator configs wherever an explicit time limit is required.
pub type TimeoutMs = u64;
