use anyhow::Context;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the global Prometheus recorder once and keep its handle.
///
/// Later calls are no-ops, so several routers (e.g. in tests) may share one process.
pub fn init_metrics() -> anyhow::Result<()> {
    HANDLE.get_or_try_init(|| {
        PrometheusBuilder::new()
            .install_recorder()
            .context("failed to install Prometheus recorder")
    })?;
    Ok(())
}

/// Render the current metrics in Prometheus text format.
///
/// Empty until [`init_metrics`] has run.
pub fn render_metrics() -> String {
    HANDLE.get().map(PrometheusHandle::render).unwrap_or_default()
}
