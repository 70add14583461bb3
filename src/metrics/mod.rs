pub mod metrics_impl;
pub mod snapshot;

pub use metrics_impl::LfuTtlMetrics;
pub use snapshot::LfuTtlMetricsSnapshot;
