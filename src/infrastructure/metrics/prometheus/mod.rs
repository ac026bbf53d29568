mod counters;
mod prometheus_metrics;
mod recorder;

pub use prometheus_metrics::PrometheusMetrics;
use std::sync::Arc;

// Re-export utilities for internal use within this module
pub(crate) use counters::{increment_auth_rejection, increment_login, track_http_request};
pub(crate) use recorder::{init_metrics, render_metrics};

/// Creates a new Prometheus metrics implementation.
///
/// Installs the global recorder on first use; `/metrics` then serves its contents
/// for scraping.
pub fn create() -> anyhow::Result<crate::domain::MetricsPtr> {
    tracing::info!("Initializing Prometheus metrics");
    init_metrics()?;

    Ok(Arc::new(PrometheusMetrics::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_create_is_idempotent_and_renders_counters() {
        let first = create().expect("first create");
        let second = create().expect("second create");

        first.record_login(false);
        second.record_auth_rejection("invalid_or_expired_token");
        first.record_http_request(Instant::now(), "/v1/posts", "POST", 201);

        let text = first.render();
        assert!(text.contains("auth_logins_total"));
        assert!(text.contains("auth_rejections_total"));
        assert!(text.contains("http_requests_total"));
    }
}
