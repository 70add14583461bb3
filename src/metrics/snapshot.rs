use crate::metrics::metrics_impl::LfuTtlMetrics;

/// Point-in-time copy of the engine counters plus size gauges.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LfuTtlMetricsSnapshot {
    pub lookup_calls: u64,
    pub lookup_hits: u64,
    pub lookup_misses: u64,
    pub expired_on_lookup: u64,

    pub insert_calls: u64,
    pub insert_new: u64,
    pub insert_replacements: u64,
    pub insert_rejected: u64,

    pub evict_calls: u64,
    pub evict_not_found: u64,
    pub capacity_evictions: u64,

    // gauges captured at snapshot time
    pub cache_len: usize,
    pub frequency_levels: usize,
    pub capacity: usize,
}

impl LfuTtlMetricsSnapshot {
    pub(crate) fn capture(
        metrics: &LfuTtlMetrics,
        cache_len: usize,
        frequency_levels: usize,
        capacity: usize,
    ) -> Self {
        Self {
            lookup_calls: metrics.lookup_calls,
            lookup_hits: metrics.lookup_hits,
            lookup_misses: metrics.lookup_misses,
            expired_on_lookup: metrics.expired_on_lookup,
            insert_calls: metrics.insert_calls,
            insert_new: metrics.insert_new,
            insert_replacements: metrics.insert_replacements,
            insert_rejected: metrics.insert_rejected,
            evict_calls: metrics.evict_calls,
            evict_not_found: metrics.evict_not_found,
            capacity_evictions: metrics.capacity_evictions,
            cache_len,
            frequency_levels,
            capacity,
        }
    }

    /// Fraction of lookups that were hits; `0.0` before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        if self.lookup_calls == 0 {
            0.0
        } else {
            self.lookup_hits as f64 / self.lookup_calls as f64
        }
    }
}
