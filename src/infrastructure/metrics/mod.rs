pub mod noop;
pub mod prometheus;

// Backend factories, selected at startup by `STARBLOOM_METRICS_TYPE`.
pub use noop::create as create_noop_metrics;
pub use prometheus::create as create_prom_metrics;
