use std::fmt;

use prometheus::{IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, proto::MetricFamily};
use thiserror::Error;
use turnstile_core::{Event, EventKind, Subscribe};

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("failed to register metric: {0}")]
    Register(#[from] prometheus::Error),
}

/// Event subscriber that exports coordinator activity as Prometheus metrics.
///
/// Cheap to clone; clones share the same registry and metric handles.
#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    enqueued: IntCounterVec,
    settled: IntCounterVec,
    evictions: IntCounter,
    in_flight: IntGaugeVec,
    queue_depth: IntGaugeVec,
}

impl PrometheusMetrics {
    /// Create metrics in a fresh registry.
    pub fn new() -> Result<Self, MetricsError> {
        Self::with_registry(Registry::new())
    }

    /// Create metrics and register them in `registry`.
    ///
    /// Fails if the registry already holds metrics with the same names.
    pub fn with_registry(registry: Registry) -> Result<Self, MetricsError> {
        let enqueued = IntCounterVec::new(
            Opts::new(
                "turnstile_tasks_enqueued_total",
                "Operations submitted to a coordinator",
            ),
            &["source"],
        )?;
        let settled = IntCounterVec::new(
            Opts::new(
                "turnstile_tasks_settled_total",
                "Pool tasks settled, by settlement",
            ),
            &["settlement"],
        )?;
        let evictions = IntCounter::new(
            "turnstile_gate_evictions_total",
            "Operations evicted by the gate watchdog",
        )?;
        let in_flight = IntGaugeVec::new(
            Opts::new(
                "turnstile_tasks_in_flight",
                "Operations currently holding a worker or the gate",
            ),
            &["source"],
        )?;
        let queue_depth = IntGaugeVec::new(
            Opts::new(
                "turnstile_queue_depth",
                "Operations waiting for a worker or the gate",
            ),
            &["source"],
        )?;

        registry.register(Box::new(enqueued.clone()))?;
        registry.register(Box::new(settled.clone()))?;
        registry.register(Box::new(evictions.clone()))?;
        registry.register(Box::new(in_flight.clone()))?;
        registry.register(Box::new(queue_depth.clone()))?;

        Ok(Self {
            registry,
            enqueued,
            settled,
            evictions,
            in_flight,
            queue_depth,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Snapshot of every registered metric family.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }
}

impl Subscribe for PrometheusMetrics {
    // Depth is kept as a running count: events from different threads may arrive out of order,
    // and increments commute where `Event::queued` snapshots do not.
    fn on_event(&self, event: &Event) {
        let source = event.source;
        match event.kind {
            EventKind::TaskEnqueued | EventKind::GateAdmitted => {
                self.enqueued.with_label_values(&[source]).inc();
                self.queue_depth.with_label_values(&[source]).inc();
            }
            EventKind::TaskDequeued | EventKind::GateSkipped => {
                self.queue_depth.with_label_values(&[source]).dec();
            }
            EventKind::GateGranted => {
                self.queue_depth.with_label_values(&[source]).dec();
                self.in_flight.with_label_values(&[source]).inc();
            }
            EventKind::TaskStarted => self.in_flight.with_label_values(&[source]).inc(),
            EventKind::TaskSettled | EventKind::TaskTimedOut | EventKind::TaskAbandoned => {
                self.in_flight.with_label_values(&[source]).dec();
                if let Some(settlement) = event.settlement {
                    self.settled.with_label_values(&[settlement.as_str()]).inc();
                }
            }
            EventKind::GateReleased => self.in_flight.with_label_values(&[source]).dec(),
            EventKind::GateEvicted => {
                self.in_flight.with_label_values(&[source]).dec();
                self.evictions.inc();
            }
            EventKind::FetchRetracted | EventKind::WorkerStarted | EventKind::WorkerStopped => {}
        }
    }

    fn name(&self) -> &'static str {
        "prometheus"
    }
}

impl fmt::Debug for PrometheusMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrometheusMetrics").finish_non_exhaustive()
    }
}
