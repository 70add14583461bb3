pub use crate::clock::{Clock, ManualClock, MonotonicClock};
pub use crate::config::CacheConfig;
pub use crate::ds::FrequencyBuckets;
pub use crate::error::{CacheError, ConfigError, InvariantError};
pub use crate::metrics::LfuTtlMetricsSnapshot;
pub use crate::policy::lfu_ttl::{ConcurrentLfuTtlCache, LfuTtlCache, Volatility};
pub use crate::report::{AllocationReport, CategoryTotals, Fingerprint, ReportCache, ReportKey};
