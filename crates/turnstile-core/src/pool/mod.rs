//! # Worker pool queue.
//!
//! Independent callers [`enqueue`](WorkerPoolQueue::enqueue) operations; a fixed set of workers
//! pulls the resulting tasks in FIFO order and executes them one at a time each.
//!
//! ## Invariants
//! - A task is delivered to at most one worker.
//! - Delivery order equals submission order.
//! - With `N` workers at most `N` tasks execute at once.
//! - A task whose timeout expires frees its worker; the caller's operation keeps running.
//! - Stopping every worker freezes the queue; tasks accumulate until a worker starts again.

mod queue;
mod worker;

pub use queue::Fetch;

use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::{runtime::Handle, sync::oneshot};
use tracing::debug;
use turnstile_model::{PoolConfig, WorkerId};

use crate::{
    error::CoreError,
    event::{Bus, Subscribe},
};
use queue::Shared;
use worker::Worker;

pub struct WorkerPoolQueue {
    shared: Arc<Shared>,
    workers: Mutex<Vec<Worker>>,
}

impl WorkerPoolQueue {
    /// Build the pool and start all of its workers.
    pub fn new(config: PoolConfig) -> Result<Self, CoreError> {
        Self::with_subscribers(config, Vec::new())
    }

    pub fn with_subscribers(
        config: PoolConfig,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| CoreError::NoRuntime)?;

        let shared = Arc::new(Shared::new(
            config.timeout(),
            Bus::new(subscribers),
            runtime,
        ));
        let workers = (1..=config.workers as u64)
            .map(|i| Worker::new(WorkerId::new(i), Arc::clone(&shared)))
            .collect();

        let pool = Self {
            shared,
            workers: Mutex::new(workers),
        };
        pool.start();

        debug!(workers = config.workers, timeout_ms = ?config.timeout_ms, "worker pool started");
        Ok(pool)
    }

    /// Queue `operation` and return a future of its output.
    ///
    /// The task takes its FIFO position when this is called, not when the future is first polled.
    /// `operation` is awaited by the returned future once a worker executes the task; its
    /// completion settles the task. Dropping the future before or during execution abandons
    /// the task, freeing its worker.
    ///
    /// If the pool is dropped while the task is still queued, the future never resolves.
    pub fn enqueue<F>(&self, operation: F) -> impl Future<Output = F::Output> + use<F>
    where
        F: Future,
    {
        let (start_tx, start_rx) = oneshot::channel::<crate::task::Finish>();
        self.shared.push(move |finish| {
            // A closed channel means the caller is gone: the handle drops here
            // and the task is abandoned.
            let _ = start_tx.send(finish);
        });

        async move {
            let Ok(finish) = start_rx.await else {
                return std::future::pending().await;
            };
            let output = operation.await;
            finish.finish();
            output
        }
    }

    /// Request the next task, as a worker does.
    ///
    /// Mostly useful to drive a stopped pool by hand; the returned [`Fetch`] is cancellable.
    pub fn fetch_one_task(&self) -> Fetch {
        self.shared.fetch_one_task()
    }

    /// Tasks waiting for a worker.
    pub fn pending(&self) -> usize {
        self.shared.pending()
    }

    /// Fetch requests currently waiting for a task.
    pub fn idle_workers(&self) -> usize {
        self.shared.waiting()
    }

    pub fn workers(&self) -> usize {
        self.lock_workers().len()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.shared.timeout
    }

    /// Start every stopped worker.
    pub fn start(&self) {
        self.lock_workers().iter_mut().for_each(Worker::start);
    }

    /// Stop every worker. Tasks already executing run to settlement.
    pub fn stop(&self) {
        self.lock_workers().iter_mut().for_each(Worker::stop);
    }

    pub fn start_worker(&self, id: WorkerId) -> Result<(), CoreError> {
        self.with_worker(id, Worker::start)
    }

    pub fn stop_worker(&self, id: WorkerId) -> Result<(), CoreError> {
        self.with_worker(id, Worker::stop)
    }

    pub fn is_worker_running(&self, id: WorkerId) -> Result<bool, CoreError> {
        let workers = self.lock_workers();
        workers
            .iter()
            .find(|w| w.id() == id)
            .map(Worker::is_running)
            .ok_or(CoreError::UnknownWorker(id))
    }

    fn with_worker(&self, id: WorkerId, f: impl FnOnce(&mut Worker)) -> Result<(), CoreError> {
        let mut workers = self.lock_workers();
        let worker = workers
            .iter_mut()
            .find(|w| w.id() == id)
            .ok_or(CoreError::UnknownWorker(id))?;
        f(worker);
        Ok(())
    }

    fn lock_workers(&self) -> MutexGuard<'_, Vec<Worker>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for WorkerPoolQueue {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for WorkerPoolQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPoolQueue")
            .field("workers", &self.workers())
            .field("pending", &self.pending())
            .field("timeout", &self.shared.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::time::{Instant, sleep};

    use super::*;
    use crate::event::{EventKind, bus::tests::Recorder};
    use turnstile_model::Settlement;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    /// Tracks how many operations run at once.
    #[derive(Default)]
    struct Gauge {
        now: AtomicUsize,
        max: AtomicUsize,
    }

    impl Gauge {
        fn enter(&self) {
            let now = self.now.fetch_add(1, Ordering::SeqCst) + 1;
            self.max.fetch_max(now, Ordering::SeqCst);
        }
        fn leave(&self) {
            self.now.fetch_sub(1, Ordering::SeqCst);
        }
        fn max(&self) -> usize {
            self.max.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn construction_needs_runtime() {
        let err = WorkerPoolQueue::new(PoolConfig::default()).unwrap_err();
        assert!(matches!(err, CoreError::NoRuntime));
    }

    #[tokio::test]
    async fn invalid_config_rejected() {
        let err = WorkerPoolQueue::new(PoolConfig::default().with_workers(0)).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[tokio::test]
    async fn enqueue_returns_operation_output() {
        let pool = WorkerPoolQueue::new(PoolConfig::default()).unwrap();
        assert_eq!(pool.enqueue(async { 21 * 2 }).await, 42);

        let failed: Result<(), &str> = pool.enqueue(async { Err::<(), _>("nope") }).await;
        assert_eq!(failed, Err("nope"));
    }

    #[tokio::test(start_paused = true)]
    async fn single_worker_runs_in_submission_order() {
        let pool = WorkerPoolQueue::new(PoolConfig::new(1, 1_000)).unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));

        let futs: Vec<_> = (0..5)
            .map(|i| {
                let order = Arc::clone(&order);
                pool.enqueue(async move {
                    order.lock().unwrap().push(i);
                    sleep(ms(10)).await;
                })
            })
            .collect();
        let handles: Vec<_> = futs.into_iter().map(tokio::spawn).collect();
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn later_tasks_wait_for_busy_worker() {
        let pool = WorkerPoolQueue::new(PoolConfig::new(1, 10_000)).unwrap();
        let started = Arc::new(AtomicUsize::new(0));

        let first = {
            let started = Arc::clone(&started);
            tokio::spawn(pool.enqueue(async move {
                started.fetch_add(1, Ordering::SeqCst);
                sleep(ms(500)).await;
            }))
        };
        let rest: Vec<_> = (0..3)
            .map(|_| {
                let started = Arc::clone(&started);
                tokio::spawn(pool.enqueue(async move {
                    started.fetch_add(1, Ordering::SeqCst);
                }))
            })
            .collect();

        sleep(ms(100)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(pool.pending(), 3);

        first.await.unwrap();
        for h in rest {
            h.await.unwrap();
        }
        assert_eq!(started.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn two_workers_three_tasks_scenario() {
        let rec = Arc::new(Recorder::default());
        let pool =
            WorkerPoolQueue::with_subscribers(PoolConfig::new(2, 1_000), vec![rec.clone()])
                .unwrap();
        let gauge = Arc::new(Gauge::default());
        let t0 = Instant::now();

        let op = |dur: u64| {
            let gauge = Arc::clone(&gauge);
            async move {
                gauge.enter();
                let started = t0.elapsed();
                sleep(ms(dur)).await;
                gauge.leave();
                (started, t0.elapsed())
            }
        };
        let h1 = tokio::spawn(pool.enqueue(op(2_000)));
        let h2 = tokio::spawn(pool.enqueue(op(10)));
        let h3 = tokio::spawn(pool.enqueue(op(10)));

        let (s1, e1) = h1.await.unwrap();
        let (s2, e2) = h2.await.unwrap();
        let (s3, e3) = h3.await.unwrap();

        assert!(s1 < ms(5) && s2 < ms(5), "op1 and op2 start immediately");
        assert!(s3 >= ms(10) && s3 < ms(15), "op3 waits for op2: {s3:?}");
        assert!(e2 < ms(15) && e3 < ms(30));
        assert!(e1 >= ms(2_000) && e1 < ms(2_010));
        assert_eq!(gauge.max(), 2);

        // op1 outlived its 1s timeout but still settled; op2 and op3 finished.
        sleep(ms(1)).await;
        let settled: Vec<_> = rec
            .events()
            .into_iter()
            .filter_map(|e| e.settlement)
            .collect();
        assert_eq!(settled.len(), 3);
        assert_eq!(
            settled.iter().filter(|s| **s == Settlement::TimedOut).count(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn k_workers_process_m_tasks_exactly_once() {
        let pool = WorkerPoolQueue::new(PoolConfig::new(3, 60_000)).unwrap();
        let gauge = Arc::new(Gauge::default());
        let runs = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let gauge = Arc::clone(&gauge);
                let runs = Arc::clone(&runs);
                tokio::spawn(pool.enqueue(async move {
                    gauge.enter();
                    runs.lock().unwrap().push(i);
                    sleep(ms(5 + i % 3)).await;
                    gauge.leave();
                }))
            })
            .collect();
        for h in handles {
            h.await.unwrap();
        }

        let mut runs = runs.lock().unwrap().clone();
        runs.sort();
        assert_eq!(runs, (0..20).collect::<Vec<_>>());
        assert!(gauge.max() <= 3);
        assert_eq!(gauge.max(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_task_frees_worker_but_caller_still_gets_result() {
        let pool = WorkerPoolQueue::new(PoolConfig::new(1, 100)).unwrap();
        let t0 = Instant::now();

        let slow = tokio::spawn(pool.enqueue(async {
            sleep(ms(1_000)).await;
            "slow"
        }));
        let fast = tokio::spawn(pool.enqueue(async move { t0.elapsed() }));

        let fast_started = fast.await.unwrap();
        assert!(fast_started >= ms(100) && fast_started < ms(105));
        assert_eq!(slow.await.unwrap(), "slow");
        assert!(t0.elapsed() >= ms(1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_caller_abandons_its_task() {
        let rec = Arc::new(Recorder::default());
        let pool =
            WorkerPoolQueue::with_subscribers(PoolConfig::new(1, 60_000), vec![rec.clone()])
                .unwrap();

        let running = tokio::spawn(pool.enqueue(sleep(Duration::from_secs(3600))));
        sleep(ms(10)).await;
        let never_polled = pool.enqueue(async { unreachable!() });
        drop(never_polled);

        running.abort();
        let next = pool.enqueue(async { 7 }).await;
        assert_eq!(next, 7);

        let abandoned = rec
            .kinds()
            .into_iter()
            .filter(|k| *k == EventKind::TaskAbandoned)
            .count();
        assert_eq!(abandoned, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_pool_freezes_until_restart() {
        let pool = WorkerPoolQueue::new(PoolConfig::new(2, 1_000)).unwrap();
        pool.stop();
        sleep(ms(1)).await;
        assert_eq!(pool.idle_workers(), 0);

        let done = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let done = Arc::clone(&done);
                tokio::spawn(pool.enqueue(async move {
                    done.fetch_add(1, Ordering::SeqCst);
                }))
            })
            .collect();

        sleep(ms(500)).await;
        assert_eq!(pool.pending(), 4);
        assert_eq!(done.load(Ordering::SeqCst), 0);

        pool.start();
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(done.load(Ordering::SeqCst), 4);
        assert_eq!(pool.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stopping_a_fetching_worker_leaves_task_claimable() {
        let pool = WorkerPoolQueue::new(PoolConfig::new(1, 1_000)).unwrap();
        sleep(ms(1)).await;
        assert_eq!(pool.idle_workers(), 1);

        pool.stop_worker(WorkerId::new(1)).unwrap();
        sleep(ms(1)).await;
        assert_eq!(pool.idle_workers(), 0);
        assert!(!pool.is_worker_running(WorkerId::new(1)).unwrap());

        let fut = pool.enqueue(async { "claimed" });
        assert_eq!(pool.pending(), 1);

        pool.start_worker(WorkerId::new(1)).unwrap();
        assert_eq!(fut.await, "claimed");
    }

    #[tokio::test(start_paused = true)]
    async fn stop_does_not_interrupt_running_task() {
        let pool = WorkerPoolQueue::new(PoolConfig::new(1, 10_000)).unwrap();
        let running = tokio::spawn(pool.enqueue(async {
            sleep(ms(200)).await;
            "done"
        }));
        sleep(ms(10)).await;

        pool.stop();
        let queued = pool.enqueue(async { "second" });
        assert_eq!(running.await.unwrap(), "done");

        sleep(ms(100)).await;
        assert_eq!(pool.pending(), 1);

        pool.start();
        assert_eq!(queued.await, "second");
    }

    #[tokio::test(start_paused = true)]
    async fn restart_while_draining_keeps_one_task_per_worker() {
        let pool = WorkerPoolQueue::new(PoolConfig::new(1, 10_000)).unwrap();
        let gauge = Arc::new(Gauge::default());

        let op = |d: u64| {
            let gauge = Arc::clone(&gauge);
            async move {
                gauge.enter();
                sleep(ms(d)).await;
                gauge.leave();
            }
        };
        let first = tokio::spawn(pool.enqueue(op(300)));
        sleep(ms(10)).await;

        pool.stop();
        pool.start();
        let second = tokio::spawn(pool.enqueue(op(10)));

        first.await.unwrap();
        second.await.unwrap();
        assert_eq!(gauge.max(), 1);
    }

    #[tokio::test]
    async fn manual_fetch_on_stopped_pool() {
        let pool = WorkerPoolQueue::new(PoolConfig::default().without_timeout()).unwrap();
        pool.stop();
        tokio::task::yield_now().await;

        let fut = tokio::spawn(pool.enqueue(async { 5 }));
        let task = pool.fetch_one_task().await.expect("queued task");
        assert_eq!(task.run().await, Settlement::Finished);
        assert_eq!(fut.await.unwrap(), 5);
    }

    #[tokio::test]
    async fn unknown_worker_is_an_error() {
        let pool = WorkerPoolQueue::new(PoolConfig::new(2, 100)).unwrap();
        let err = pool.stop_worker(WorkerId::new(9)).unwrap_err();
        assert!(matches!(err, CoreError::UnknownWorker(id) if id == WorkerId::new(9)));
        assert_eq!(pool.workers(), 2);
        assert_eq!(pool.timeout(), Some(ms(100)));
    }
}
