//! [`MetricsSink`] backed by the `metrics` facade.
//!
//! Increments go to whatever recorder the binary installed (Prometheus in
//! production); with no recorder installed they are dropped.

use intake::{Counter, MetricsSink};

/// Forwards counter increments to the global `metrics` recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct FacadeMetrics;

impl MetricsSink for FacadeMetrics {
    fn increment(&self, counter: Counter) {
        ::metrics::counter!(counter.as_str(), 1);
    }
}
