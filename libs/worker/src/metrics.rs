//! Prometheus-compatible metrics for worker observability.
//!
//! ## Available Metrics
//!
//! - `worker_orders_processed_total` - Counter of orders by terminal outcome
//! - `worker_order_duration_seconds` - Histogram of per-message processing time
//! - `worker_in_flight_jobs` - Gauge of jobs currently dispatched to handlers
//! - `worker_live_listeners` - Gauge of running listener tasks

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

/// Global Prometheus handle for metrics export
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names as constants for consistency
pub mod names {
    pub const ORDERS_PROCESSED: &str = "worker_orders_processed_total";
    pub const ORDER_DURATION: &str = "worker_order_duration_seconds";
    pub const IN_FLIGHT_JOBS: &str = "worker_in_flight_jobs";
    pub const LIVE_LISTENERS: &str = "worker_live_listeners";
}

/// Terminal outcome of one delivery, used as a metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Feedback published and delivery acked.
    Completed,
    /// Nacked without requeue (malformed or schema-invalid input).
    Rejected,
    /// Config inactive; left unacked.
    Skipped,
    /// Handler output failed remote validation; left unacked.
    InvalidOutput,
    /// Handler or collaborator failure; left unacked for redelivery.
    Failed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Rejected => "rejected",
            Self::Skipped => "skipped",
            Self::InvalidOutput => "invalid_output",
            Self::Failed => "failed",
        }
    }
}

/// Initialize the Prometheus metrics exporter.
///
/// This should be called once at application startup.
/// Returns the PrometheusHandle for rendering metrics.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            PrometheusBuilder::new()
                .install_recorder()
                .expect("Failed to install Prometheus recorder")
        })
        .clone()
}

/// Get the global Prometheus handle.
///
/// Returns None if metrics haven't been initialized.
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

/// Record a processed order with its terminal outcome.
pub fn record_order_processed(pipeline: &str, outcome: Outcome) {
    counter!(
        names::ORDERS_PROCESSED,
        "pipeline" => pipeline.to_string(),
        "outcome" => outcome.as_str().to_string()
    )
    .increment(1);
}

/// Record how long one delivery took from decode to disposition.
pub fn record_order_duration(pipeline: &str, duration: Duration) {
    histogram!(
        names::ORDER_DURATION,
        "pipeline" => pipeline.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Update the in-flight jobs gauge.
pub fn set_in_flight_jobs(count: f64) {
    gauge!(names::IN_FLIGHT_JOBS).set(count);
}

/// Update the live listeners gauge.
pub fn set_live_listeners(count: f64) {
    gauge!(names::LIVE_LISTENERS).set(count);
}
