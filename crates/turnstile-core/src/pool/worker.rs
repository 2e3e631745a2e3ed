use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;
use turnstile_model::WorkerId;

use super::queue::Shared;
use crate::event::{Event, EventKind, SOURCE_POOL};

/// Serial executor bound to one concurrency slot of a pool.
///
/// Either fetching (waiting for a task or a stop) or executing one task.
pub(crate) struct Worker {
    id: WorkerId,
    shared: Arc<Shared>,
    stop: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Create a stopped worker.
    pub(crate) fn new(id: WorkerId, shared: Arc<Shared>) -> Self {
        let stop = CancellationToken::new();
        stop.cancel();
        Self {
            id,
            shared,
            stop,
            handle: None,
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> WorkerId {
        self.id
    }

    #[inline]
    pub(crate) fn is_running(&self) -> bool {
        !self.stop.is_cancelled()
    }

    /// Spawn the fetch -> execute loop. No-op while running.
    ///
    /// A loop left over from an earlier `stop()` may still be executing its last task;
    /// the new loop waits for it before fetching.
    pub(crate) fn start(&mut self) {
        if self.is_running() {
            return;
        }
        let stop = CancellationToken::new();
        self.stop = stop.clone();

        let previous = self.handle.take();
        let shared = Arc::clone(&self.shared);
        let id = self.id;
        self.handle = Some(self.shared.runtime.spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            work(id, shared, stop).await;
        }));
    }

    /// Stop fetching. A task already executing runs to settlement.
    pub(crate) fn stop(&mut self) {
        self.stop.cancel();
    }
}

async fn work(id: WorkerId, shared: Arc<Shared>, stop: CancellationToken) {
    shared
        .bus
        .emit(Event::new(EventKind::WorkerStarted, SOURCE_POOL).with_worker(id));

    loop {
        let task = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            task = shared.fetch_one_task() => match task {
                Some(task) => task,
                None => break,
            },
        };

        let task_id = task.id();
        shared.bus.emit(
            Event::new(EventKind::TaskStarted, SOURCE_POOL)
                .with_task(task_id)
                .with_worker(id)
                .with_queued(shared.pending()),
        );

        let settlement = task.run().await;
        trace!(worker = %id, task = %task_id, settlement = settlement.as_str(), "task settled");

        let mut event = Event::new(EventKind::for_settlement(settlement), SOURCE_POOL)
            .with_task(task_id)
            .with_worker(id)
            .with_settlement(settlement);
        if let Some(timeout) = shared.timeout
            && settlement.is_timeout()
        {
            event = event.with_timeout_ms(timeout.as_millis() as u64);
        }
        shared.bus.emit(event);
    }

    shared
        .bus
        .emit(Event::new(EventKind::WorkerStopped, SOURCE_POOL).with_worker(id));
}
