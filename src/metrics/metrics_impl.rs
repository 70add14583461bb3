/// Counters kept inside one [`LfuTtlCache`](crate::policy::lfu_ttl::LfuTtlCache).
///
/// Plain integers: the engine is only ever mutated behind `&mut self`.
#[derive(Debug, Default, Clone)]
pub struct LfuTtlMetrics {
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
}

impl LfuTtlMetrics {
    #[inline]
    pub fn record_lookup_hit(&mut self) {
        self.lookup_calls += 1;
        self.lookup_hits += 1;
    }

    #[inline]
    pub fn record_lookup_miss(&mut self) {
        self.lookup_calls += 1;
        self.lookup_misses += 1;
    }

    /// An expired entry counts as a miss as well.
    #[inline]
    pub fn record_lookup_expired(&mut self) {
        self.record_lookup_miss();
        self.expired_on_lookup += 1;
    }

    #[inline]
    pub fn record_insert_new(&mut self) {
        self.insert_calls += 1;
        self.insert_new += 1;
    }

    #[inline]
    pub fn record_insert_replacement(&mut self) {
        self.insert_calls += 1;
        self.insert_replacements += 1;
    }

    #[inline]
    pub fn record_insert_rejected(&mut self) {
        self.insert_calls += 1;
        self.insert_rejected += 1;
    }

    #[inline]
    pub fn record_evict(&mut self, found: bool) {
        self.evict_calls += 1;
        if !found {
            self.evict_not_found += 1;
        }
    }

    #[inline]
    pub fn record_capacity_eviction(&mut self) {
        self.capacity_evictions += 1;
    }
}
