//! Prometheus metrics implementation.
//!
//! Concrete implementation of the `Metrics` trait backed by the global `metrics`
//! crate registry. Counters and histograms are registered on first use; the handle
//! kept in `recorder.rs` renders them in Prometheus text format.

use crate::domain::Metrics;
use std::time::Instant;

/// Prometheus-based metrics implementation.
///
/// Holds no state of its own: every recording goes through the global registry.
#[derive(Debug, Default)]
pub struct PrometheusMetrics;

impl PrometheusMetrics {
    pub fn new() -> Self {
        tracing::info!("Creating Prometheus metrics");
        PrometheusMetrics
    }
}

impl Metrics for PrometheusMetrics {
    fn render(&self) -> String {
        super::render_metrics()
    }

    fn record_http_request(&self, start: Instant, path: &str, method: &str, status: u16) {
        super::track_http_request(start, path, method, status);
    }

    fn record_login(&self, success: bool) {
        tracing::debug!(success, "Recording login attempt");
        super::increment_login(success);
    }

    fn record_auth_rejection(&self, reason: &'static str) {
        super::increment_auth_rejection(reason);
    }
}
