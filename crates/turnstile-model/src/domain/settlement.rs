use serde::{Deserialize, Serialize};

/// How a task left the pending state.
///
/// A task settles exactly once. Settlement only drives queue progression:
/// the submitter's own result travels separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Settlement {
    /// The completion signal fired before the timer.
    Finished,
    /// The timer fired first; the operation may still be running.
    TimedOut,
    /// Every completion handle was dropped without firing.
    Abandoned,
}

impl Settlement {
    /// Returns `true` if the task was released by its timer.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Settlement::TimedOut)
    }

    /// Short label used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Settlement::Finished => "finished",
            Settlement::TimedOut => "timedOut",
            Settlement::Abandoned => "abandoned",
        }
    }
}
