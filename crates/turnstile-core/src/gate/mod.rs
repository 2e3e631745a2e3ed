//! # Single-flight gate.
//!
//! Serializes a slow, shareable operation (typically "make sure the session is still valid")
//! across many concurrent callers. Every admitted operation runs alone, in submission order.
//!
//! A dedicated coordination task owns the progression: it pops the next admission, grants it
//! the slot and waits for the slot to come back. A watchdog bounds that wait with
//! `idle_timeout`; on expiry the operation is *evicted*: the gate moves on, the operation keeps
//! running and still settles its own caller.
//!
//! ## Rules
//! - Eviction is the only way an admitted operation loses its place in the order.
//! - Eviction never aborts the operation and is not reported to its caller (only to subscribers).
//! - Admissions whose caller already went away are skipped without holding the slot.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio::{
    runtime::Handle,
    sync::{mpsc, oneshot},
};
use tracing::{debug, trace};
use turnstile_model::{GateConfig, TaskId};

use crate::{
    error::CoreError,
    event::{Bus, Event, EventKind, SOURCE_GATE, Subscribe},
};

/// Request for the slot, queued until the coordination task reaches it.
struct Admission {
    id: TaskId,
    grant: oneshot::Sender<Permit>,
}

/// Proof of holding the gate's slot; dropping it releases the slot.
struct Permit {
    _release: oneshot::Sender<()>,
}

struct GateState {
    idle: AtomicBool,
    queued: AtomicUsize,
    evictions: AtomicU64,
    next_id: AtomicU64,
    idle_timeout: Duration,
    bus: Bus,
}

impl GateState {
    fn emit(&self, kind: EventKind, id: TaskId) {
        self.bus.emit(
            Event::new(kind, SOURCE_GATE)
                .with_task(id)
                .with_queued(self.queued.load(Ordering::SeqCst)),
        );
    }
}

pub struct SingleFlightGate {
    admissions: mpsc::UnboundedSender<Admission>,
    state: Arc<GateState>,
}

impl SingleFlightGate {
    pub fn new(config: GateConfig) -> Result<Self, CoreError> {
        Self::with_subscribers(config, Vec::new())
    }

    /// Build the gate and spawn its coordination task.
    pub fn with_subscribers(
        config: GateConfig,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| CoreError::NoRuntime)?;

        let state = Arc::new(GateState {
            idle: AtomicBool::new(true),
            queued: AtomicUsize::new(0),
            evictions: AtomicU64::new(0),
            next_id: AtomicU64::new(0),
            idle_timeout: config.idle_timeout(),
            bus: Bus::new(subscribers),
        });
        let (admissions, rx) = mpsc::unbounded_channel();
        runtime.spawn(drain(rx, Arc::clone(&state)));

        debug!(idle_timeout_ms = config.idle_timeout_ms, "single-flight gate started");
        Ok(Self { admissions, state })
    }

    /// Queue `operation` behind every earlier admission and return a future of its output.
    ///
    /// The admission takes its FIFO position when this is called. `operation` is awaited by the
    /// returned future once the gate grants the slot; the slot is released when it completes or
    /// when the future is dropped.
    pub fn admit<F>(&self, operation: F) -> impl Future<Output = F::Output> + use<F>
    where
        F: Future,
    {
        let id = TaskId::new(self.state.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let (grant, granted) = oneshot::channel();

        self.state.queued.fetch_add(1, Ordering::SeqCst);
        if self.admissions.send(Admission { id, grant }).is_err() {
            // Coordination task is gone (runtime shut down); the caller waits forever.
            self.state.queued.fetch_sub(1, Ordering::SeqCst);
        } else {
            self.state.emit(EventKind::GateAdmitted, id);
        }

        async move {
            let Ok(permit) = granted.await else {
                return std::future::pending().await;
            };
            let output = operation.await;
            drop(permit);
            output
        }
    }

    /// `true` while no admitted operation holds the slot.
    pub fn is_idle(&self) -> bool {
        self.state.idle.load(Ordering::SeqCst)
    }

    /// Admissions waiting for the slot.
    pub fn queued(&self) -> usize {
        self.state.queued.load(Ordering::SeqCst)
    }

    /// How many operations the watchdog evicted so far.
    pub fn evictions(&self) -> u64 {
        self.state.evictions.load(Ordering::SeqCst)
    }

    pub fn idle_timeout(&self) -> Duration {
        self.state.idle_timeout
    }
}

impl std::fmt::Debug for SingleFlightGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlightGate")
            .field("idle", &self.is_idle())
            .field("queued", &self.queued())
            .field("idle_timeout", &self.state.idle_timeout)
            .finish()
    }
}

/// Coordination loop: one admission at a time, each bounded by the watchdog.
///
/// Ends once every gate handle is dropped and the admitted backlog is drained.
async fn drain(mut rx: mpsc::UnboundedReceiver<Admission>, state: Arc<GateState>) {
    while let Some(Admission { id, grant }) = rx.recv().await {
        state.queued.fetch_sub(1, Ordering::SeqCst);

        let (release, released) = oneshot::channel();
        state.idle.store(false, Ordering::SeqCst);
        if grant.send(Permit { _release: release }).is_err() {
            state.idle.store(true, Ordering::SeqCst);
            state.emit(EventKind::GateSkipped, id);
            continue;
        }
        state.emit(EventKind::GateGranted, id);

        match tokio::time::timeout(state.idle_timeout, released).await {
            Ok(_) => {
                trace!(task = %id, "gate released");
                state.idle.store(true, Ordering::SeqCst);
                state.emit(EventKind::GateReleased, id);
            }
            Err(_) => {
                state.evictions.fetch_add(1, Ordering::SeqCst);
                state.idle.store(true, Ordering::SeqCst);
                state.bus.emit(
                    Event::new(EventKind::GateEvicted, SOURCE_GATE)
                        .with_task(id)
                        .with_timeout_ms(state.idle_timeout.as_millis() as u64)
                        .with_queued(state.queued.load(Ordering::SeqCst)),
                );
            }
        }
    }
    trace!("gate coordination task finished");
}
