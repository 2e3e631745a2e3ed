use std::{
    collections::VecDeque,
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    task::{Context, Poll},
    time::Duration,
};

use tokio::{runtime::Handle, sync::oneshot};
use turnstile_model::TaskId;

use crate::{
    event::{Bus, Event, EventKind, SOURCE_POOL},
    task::{Finish, Task},
};

/// State shared by a pool and its workers.
pub(crate) struct Shared {
    state: Mutex<State>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) bus: Bus,
    pub(crate) runtime: Handle,
}

struct State {
    /// Pending tasks (FIFO order).
    tasks: VecDeque<Task>,
    /// Workers waiting for a task (first registered, first served).
    waiters: VecDeque<Waiter>,
    next_task: u64,
    next_waiter: u64,
}

struct Waiter {
    id: u64,
    tx: oneshot::Sender<Task>,
}

impl State {
    /// Pair waiters with tasks, one at a time, while both exist.
    fn handoff(&mut self) {
        while !self.waiters.is_empty() && !self.tasks.is_empty() {
            let (Some(waiter), Some(task)) = (self.waiters.pop_front(), self.tasks.pop_front())
            else {
                break;
            };
            if let Err(task) = waiter.tx.send(task) {
                self.tasks.push_front(task);
            }
        }
    }
}

impl Shared {
    pub(crate) fn new(timeout: Option<Duration>, bus: Bus, runtime: Handle) -> Self {
        Self {
            state: Mutex::new(State {
                tasks: VecDeque::new(),
                waiters: VecDeque::new(),
                next_task: 0,
                next_waiter: 0,
            }),
            timeout,
            bus,
            runtime,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a task built from `operation` and hand it off if a worker is waiting.
    pub(crate) fn push<F>(&self, operation: F) -> TaskId
    where
        F: FnOnce(Finish) + Send + 'static,
    {
        let (id, queued) = {
            let mut state = self.lock();
            state.next_task += 1;
            let id = TaskId::new(state.next_task);
            state.tasks.push_back(Task::new(id, self.timeout, operation));
            state.handoff();
            (id, state.tasks.len())
        };

        self.bus.emit(
            Event::new(EventKind::TaskEnqueued, SOURCE_POOL)
                .with_task(id)
                .with_queued(queued),
        );
        id
    }

    /// Register as a waiter and try an immediate handoff.
    pub(crate) fn fetch_one_task(self: &Arc<Self>) -> Fetch {
        let mut state = self.lock();
        state.next_waiter += 1;
        let id = state.next_waiter;
        let (tx, rx) = oneshot::channel();
        state.waiters.push_back(Waiter { id, tx });
        state.handoff();
        drop(state);

        Fetch {
            id,
            rx,
            shared: Arc::clone(self),
            done: false,
        }
    }

    pub(crate) fn pending(&self) -> usize {
        self.lock().tasks.len()
    }

    pub(crate) fn waiting(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Undo a waiter registration.
    ///
    /// A task already handed to the waiter goes back to the head of the queue and is offered to
    /// the next waiter, so it is neither lost nor delivered twice.
    fn retract(&self, waiter: u64, rx: &mut oneshot::Receiver<Task>) -> Option<TaskId> {
        let mut state = self.lock();
        state.waiters.retain(|w| w.id != waiter);

        rx.close();
        let task = rx.try_recv().ok()?;
        let id = task.id();
        state.tasks.push_front(task);
        state.handoff();
        Some(id)
    }
}

/// Cancellable request for the next task.
///
/// Resolves with `Some(task)` once the queue hands one over.
/// Dropping it (or calling [`cancel`](Fetch::cancel)) before that retracts the request.
#[must_use = "a fetch does nothing unless awaited; dropping it retracts the request"]
pub struct Fetch {
    id: u64,
    rx: oneshot::Receiver<Task>,
    shared: Arc<Shared>,
    done: bool,
}

impl Fetch {
    /// Retract the request.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Future for Fetch {
    type Output = Option<Task>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.done {
            return Poll::Ready(None);
        }
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(res) => {
                self.done = true;
                let task = res.ok();
                if let Some(task) = &task {
                    self.shared.bus.emit(
                        Event::new(EventKind::TaskDequeued, SOURCE_POOL)
                            .with_task(task.id())
                            .with_queued(self.shared.pending()),
                    );
                }
                Poll::Ready(task)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for Fetch {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let returned = self.shared.retract(self.id, &mut self.rx);

        let mut event =
            Event::new(EventKind::FetchRetracted, SOURCE_POOL).with_queued(self.shared.pending());
        if let Some(task) = returned {
            event = event.with_task(task);
        }
        self.shared.bus.emit(event);
    }
}
