//! # Deferred unit of work with a completion signal and an optional timer.
//!
//! A [`Task`] leaves the pending state exactly once, reported as a [`Settlement`]:
//! - its operation fired the [`Finish`] handle,
//! - the timer expired first,
//! - or every [`Finish`] clone was dropped without firing.
//!
//! Settlement only tells the executing worker it may move on.
//! Whatever the operation produces reaches the submitter through its own channel.

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::{sync::oneshot, time::Instant};
use turnstile_model::{Settlement, TaskId};

type Operation = Box<dyn FnOnce(Finish) + Send + 'static>;

/// Completion handle passed to a task's operation.
///
/// Clones share one single-fire signal: the first [`finish`](Finish::finish) settles the task,
/// later calls (from any clone) do nothing.
#[derive(Clone)]
pub struct Finish {
    signal: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl Finish {
    fn new(tx: oneshot::Sender<()>) -> Self {
        Self {
            signal: Arc::new(Mutex::new(Some(tx))),
        }
    }

    /// Settle the task. Idempotent.
    pub fn finish(&self) {
        let tx = self
            .signal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(tx) = tx {
            // Receiver is gone once the timer won; nothing to report then.
            let _ = tx.send(());
        }
    }

    /// Returns `true` once the task left the pending state, for whatever reason.
    pub fn is_settled(&self) -> bool {
        match self
            .signal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            Some(tx) => tx.is_closed(),
            None => true,
        }
    }
}

impl fmt::Debug for Finish {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Finish")
            .field("settled", &self.is_settled())
            .finish()
    }
}

pub struct Task {
    id: TaskId,
    timeout: Option<Duration>,
    operation: Operation,
}

impl Task {
    pub fn new<F>(id: TaskId, timeout: Option<Duration>, operation: F) -> Self
    where
        F: FnOnce(Finish) + Send + 'static,
    {
        Self {
            id,
            timeout,
            operation: Box::new(operation),
        }
    }

    #[inline]
    pub fn id(&self) -> TaskId {
        self.id
    }

    #[inline]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Start the timer, invoke the operation and wait for settlement.
    ///
    /// The operation is called synchronously with a fresh [`Finish`] handle; it is expected to
    /// hand the handle to whatever performs the real work.
    /// Settling stops the timer.
    pub async fn run(self) -> Settlement {
        let deadline = self.timeout.map(|limit| Instant::now() + limit);
        let (tx, rx) = oneshot::channel();

        (self.operation)(Finish::new(tx));

        let signal = async move {
            match rx.await {
                Ok(()) => Settlement::Finished,
                Err(_) => Settlement::Abandoned,
            }
        };
        match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, signal)
                .await
                .unwrap_or(Settlement::TimedOut),
            None => signal.await,
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
