//! Prometheus view of coordinator events.
//!
//! [`PrometheusMetrics`] is a [`turnstile_core::Subscribe`] implementation: hand it to a pool or a
//! gate and it keeps counters and gauges in its own [`Registry`].
//!
//! ## Metrics
//! - `turnstile_tasks_enqueued_total{source}` - Counter
//! - `turnstile_tasks_settled_total{settlement}` - Counter
//! - `turnstile_gate_evictions_total` - Counter
//! - `turnstile_tasks_in_flight{source}` - Gauge
//! - `turnstile_queue_depth{source}` - Gauge
//!
//! This crate does NOT serve `/metrics`; encode [`PrometheusMetrics::gather`] with a
//! [`TextEncoder`] wherever the application exposes it.

mod backend;
pub use backend::{MetricsError, PrometheusMetrics};

pub use prometheus::{Encoder, Registry, TextEncoder};
