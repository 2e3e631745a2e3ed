use tracing::{debug, trace, warn};
use turnstile_core::{Event, EventKind};

#[inline]
pub fn message_for(kind: EventKind) -> &'static str {
    match kind {
        // pool: tasks
        EventKind::TaskEnqueued => "task enqueued",
        EventKind::TaskDequeued => "task taken off the queue",
        EventKind::TaskStarted => "task handed to a worker",
        EventKind::TaskSettled => "task finished",
        EventKind::TaskTimedOut => "task exceeded its timeout; worker moves on",
        EventKind::TaskAbandoned => "task abandoned by its submitter",

        // pool: workers
        EventKind::FetchRetracted => "worker fetch retracted",
        EventKind::WorkerStarted => "worker started fetching",
        EventKind::WorkerStopped => "worker stopped",

        // gate
        EventKind::GateAdmitted => "operation admitted to the gate",
        EventKind::GateGranted => "gate granted to operation",
        EventKind::GateReleased => "gate released",
        EventKind::GateEvicted => "gate watchdog evicted a hung operation",
        EventKind::GateSkipped => "admission skipped (caller gone)",
    }
}

#[inline]
pub fn log_event(e: &Event) {
    let msg = message_for(e.kind);
    let task = e.task.map(|t| t.get()).unwrap_or(0);
    let worker = e.worker.map(|w| w.get()).unwrap_or(0);
    let queued = e.queued.unwrap_or(0);

    match e.kind {
        // bookkeeping
        EventKind::TaskEnqueued
        | EventKind::TaskDequeued
        | EventKind::FetchRetracted
        | EventKind::GateAdmitted
        | EventKind::GateReleased
        | EventKind::GateSkipped => trace!(source = e.source, task, queued, "{msg}"),
        EventKind::TaskSettled => trace!(source = e.source, task, worker, "{msg}"),

        // lifecycle
        EventKind::TaskStarted => debug!(source = e.source, task, worker, queued, "{msg}"),
        EventKind::GateGranted => debug!(source = e.source, task, queued, "{msg}"),
        EventKind::WorkerStarted | EventKind::WorkerStopped => {
            debug!(source = e.source, worker, "{msg}")
        }
        EventKind::TaskAbandoned => debug!(source = e.source, task, worker, "{msg}"),

        // liveness escapes
        EventKind::TaskTimedOut => warn!(
            source = e.source,
            task,
            worker,
            timeout_ms = e.timeout_ms.unwrap_or(0),
            "{msg}"
        ),
        EventKind::GateEvicted => warn!(
            source = e.source,
            task,
            queued,
            timeout_ms = e.timeout_ms.unwrap_or(0),
            "{msg}"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnstile_model::{Settlement, TaskId, WorkerId};

    #[test]
    fn every_kind_has_a_message() {
        let kinds = [
            EventKind::TaskEnqueued,
            EventKind::TaskDequeued,
            EventKind::TaskStarted,
            EventKind::TaskSettled,
            EventKind::TaskTimedOut,
            EventKind::TaskAbandoned,
            EventKind::FetchRetracted,
            EventKind::WorkerStarted,
            EventKind::WorkerStopped,
            EventKind::GateAdmitted,
            EventKind::GateGranted,
            EventKind::GateReleased,
            EventKind::GateEvicted,
            EventKind::GateSkipped,
        ];
        for kind in kinds {
            assert!(!message_for(kind).is_empty());
        }
    }

    #[test]
    fn logging_without_subscriber_is_harmless() {
        log_event(
            &Event::new(EventKind::TaskTimedOut, "pool")
                .with_task(TaskId::new(1))
                .with_worker(WorkerId::new(2))
                .with_settlement(Settlement::TimedOut)
                .with_timeout_ms(1_000),
        );
    }
}
