//! # Coordinator lifecycle events.
//!
//! Both coordinators describe what they do as [`Event`]s and hand them to every
//! registered [`Subscribe`] implementation through a [`Bus`].
//! Logging and metrics live in subscribers, not in the coordinators.
//!
//! ## Ordering
//! Events are emitted outside the coordinators' locks, from whichever task caused them.
//! On a multi-threaded runtime a subscriber may therefore see `TaskDequeued` or `GateGranted`
//! before the matching `TaskEnqueued` / `GateAdmitted`. `queued` is a snapshot taken when the
//! event was built; subscribers keeping a running depth should count enqueue and dequeue
//! events instead of storing the last snapshot.

pub(crate) mod bus;
pub use bus::{Bus, Subscribe};

use turnstile_model::{Settlement, TaskId, TimeoutMs, WorkerId};

/// Which coordinator emitted an event.
pub const SOURCE_POOL: &str = "pool";
pub const SOURCE_GATE: &str = "gate";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // pool: tasks
    TaskEnqueued,
    /// A fetch took the task off the queue.
    TaskDequeued,
    TaskStarted,
    TaskSettled,
    TaskTimedOut,
    TaskAbandoned,

    // pool: workers
    FetchRetracted,
    WorkerStarted,
    WorkerStopped,

    // gate
    GateAdmitted,
    GateGranted,
    GateReleased,
    GateEvicted,
    GateSkipped,
}

impl EventKind {
    /// Event kind reporting a task that settled the given way.
    pub fn for_settlement(settlement: Settlement) -> Self {
        match settlement {
            Settlement::Finished => EventKind::TaskSettled,
            Settlement::TimedOut => EventKind::TaskTimedOut,
            Settlement::Abandoned => EventKind::TaskAbandoned,
        }
    }
}

/// Single coordinator event.
///
/// Optional fields are filled only when they mean something for `kind`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    /// `"pool"` or `"gate"`.
    pub source: &'static str,
    pub task: Option<TaskId>,
    pub worker: Option<WorkerId>,
    pub settlement: Option<Settlement>,
    pub timeout_ms: Option<TimeoutMs>,
    /// Queue depth observed right after the event.
    pub queued: Option<usize>,
}

impl Event {
    pub fn new(kind: EventKind, source: &'static str) -> Self {
        Self {
            kind,
            source,
            task: None,
            worker: None,
            settlement: None,
            timeout_ms: None,
            queued: None,
        }
    }

    #[inline]
    pub fn with_task(mut self, task: TaskId) -> Self {
        self.task = Some(task);
        self
    }

    #[inline]
    pub fn with_worker(mut self, worker: WorkerId) -> Self {
        self.worker = Some(worker);
        self
    }

    #[inline]
    pub fn with_settlement(mut self, settlement: Settlement) -> Self {
        self.settlement = Some(settlement);
        self
    }

    #[inline]
    pub fn with_timeout_ms(mut self, timeout_ms: TimeoutMs) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    #[inline]
    pub fn with_queued(mut self, queued: usize) -> Self {
        self.queued = Some(queued);
        self
    }
}
