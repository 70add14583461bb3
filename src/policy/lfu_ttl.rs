//! # LFU Cache with per-entry TTL
//!
//! Memoizes expensive report aggregations. Every entry carries an absolute
//! expiry instant fixed at insertion; reads bump its access frequency but
//! never extend its lifetime. When the cache is full the least frequently
//! read entry is evicted, oldest first among equals.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                      LfuTtlCache<K, V, C>                            │
//!   │                                                                      │
//!   │   entries: FxHashMap<K, Entry<V>>                                    │
//!   │   ┌──────────────┬──────────────────────────────────────────┐        │
//!   │   │ fingerprint  │ value: Arc<V>, expires_at, frequency     │        │
//!   │   └──────────────┴──────────────────────────────────────────┘        │
//!   │                                                                      │
//!   │   freq: FrequencyBuckets<K>   level → keys, oldest arrival at tail   │
//!   │   clock: C                    monotonic "now" for expiry             │
//!   │   config: CacheConfig         capacity, long_ttl, short_ttl          │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lookup Flow
//!
//! ```text
//!   lookup(key)
//!     ├── absent              → None (no state change)
//!     ├── now >= expires_at   → evict(Some(key)), None
//!     └── fresh               → frequency += 1, move to next level, Some(value)
//! ```
//!
//! ## Insert Flow
//!
//! ```text
//!   insert(key, value, volatility)
//!     ├── key present  → replace value, expiry and reset frequency to 0
//!     │                  (no capacity check, the table does not grow)
//!     ├── len < cap    → add at level 0
//!     └── len == cap   → evict LFU, then add at level 0
//!                        nothing evictable → Err(CapacityExhausted)
//! ```
//!
//! Expiry is lazy: a stale entry is only removed when a lookup observes it or
//! when capacity pressure selects it. Stale entries still occupy a slot until
//! then.
//!
//! ## Thread Safety
//!
//! [`LfuTtlCache`] requires `&mut self` for every mutation and has no internal
//! locking. Share it through [`ConcurrentLfuTtlCache`], which serializes each
//! operation behind one `parking_lot::Mutex`.
//!
//! ## Example
//!
//! ```
//! use std::time::Duration;
//! use budget_cache::clock::ManualClock;
//! use budget_cache::config::CacheConfig;
//! use budget_cache::policy::lfu_ttl::{LfuTtlCache, Volatility};
//!
//! let clock = ManualClock::new();
//! let mut cache = LfuTtlCache::with_clock(CacheConfig::default().with_capacity(2), clock.clone());
//!
//! cache.insert("x", 1, Volatility::Settled).unwrap();
//! cache.insert("y", 2, Volatility::Settled).unwrap();
//! assert_eq!(cache.lookup(&"x").as_deref(), Some(&1));
//!
//! // "y" was never read, so it makes room for "z".
//! cache.insert("z", 3, Volatility::Settled).unwrap();
//! assert!(!cache.contains(&"y"));
//!
//! clock.advance(Duration::from_secs(1201));
//! assert_eq!(cache.lookup(&"x"), None);
//! ```

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use crate::clock::{Clock, MonotonicClock};
use crate::config::CacheConfig;
use crate::ds::FrequencyBuckets;
use crate::error::{CacheError, ConfigError, InvariantError};
use crate::metrics::{LfuTtlMetrics, LfuTtlMetricsSnapshot};

/// How long a cached result stays fresh.
///
/// Supplied by the caller, the engine knows nothing about the data behind a
/// key. `Volatile` results cover ranges that can still change and get the
/// short TTL; `Settled` results cover historical ranges and get the long TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Volatility {
    Volatile,
    Settled,
}

impl Volatility {
    #[inline]
    pub fn is_volatile(self) -> bool {
        matches!(self, Volatility::Volatile)
    }
}

/// `true` means short-lived.
impl From<bool> for Volatility {
    fn from(short_lived: bool) -> Self {
        if short_lived {
            Volatility::Volatile
        } else {
            Volatility::Settled
        }
    }
}

#[derive(Debug)]
struct Entry<V> {
    value: Arc<V>,
    expires_at: Instant,
    frequency: u64,
}

impl<V> Entry<V> {
    #[inline]
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// LFU cache with per-entry TTL expiry.
///
/// See the module-level documentation for the eviction and expiry rules.
pub struct LfuTtlCache<K, V, C = MonotonicClock>
where
    K: Eq + Hash + Clone,
{
    entries: FxHashMap<K, Entry<V>>,
    freq: FrequencyBuckets<K>,
    config: CacheConfig,
    clock: C,
    metrics: LfuTtlMetrics,
}

impl<K, V> LfuTtlCache<K, V, MonotonicClock>
where
    K: Eq + Hash + Clone,
{
    /// Creates a cache driven by the system monotonic clock.
    ///
    /// The config is taken as-is: a capacity of 0 is honored and every
    /// insert is rejected. Use [`try_new`](Self::try_new) for configs coming
    /// from outside the process.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, MonotonicClock)
    }

    /// Validates `config` before building the cache.
    ///
    /// ```
    /// use budget_cache::config::CacheConfig;
    /// use budget_cache::policy::lfu_ttl::LfuTtlCache;
    ///
    /// let bad = LfuTtlCache::<String, u64>::try_new(CacheConfig::default().with_capacity(0));
    /// assert!(bad.is_err());
    /// ```
    pub fn try_new(config: CacheConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(config))
    }
}

impl<K, V, C> LfuTtlCache<K, V, C>
where
    K: Eq + Hash + Clone,
    C: Clock,
{
    pub fn with_clock(config: CacheConfig, clock: C) -> Self {
        Self {
            entries: FxHashMap::with_capacity_and_hasher(config.capacity, Default::default()),
            freq: FrequencyBuckets::with_capacity(config.capacity),
            config,
            clock,
            metrics: LfuTtlMetrics::default(),
        }
    }

    /// Returns the cached value for `key`, counting the read.
    ///
    /// An entry whose expiry has passed is removed and reported as a miss.
    /// A miss on an absent key leaves the cache untouched (apart from the
    /// lookup counters).
    pub fn lookup(&mut self, key: &K) -> Option<Arc<V>> {
        let now = self.clock.now();
        let expired = match self.entries.get(key) {
            None => {
                self.metrics.record_lookup_miss();
                trace!("cache miss");
                return None;
            },
            Some(entry) => entry.is_expired(now),
        };

        if expired {
            self.metrics.record_lookup_expired();
            debug!("cache entry expired, removing");
            if let Err(err) = self.evict(Some(key)) {
                warn!(error = %err, "failed to remove expired cache entry");
            }
            return None;
        }

        let new_freq = self.freq.touch(key);
        let entry = self.entries.get_mut(key)?;
        debug_assert_eq!(
            new_freq,
            Some(entry.frequency.saturating_add(1)),
            "frequency index diverged from entry table"
        );
        entry.frequency = entry.frequency.saturating_add(1);
        self.metrics.record_lookup_hit();
        trace!(frequency = entry.frequency, "cache hit");
        Some(Arc::clone(&entry.value))
    }

    /// Inserts `value` under `key` with a TTL chosen by `volatility`.
    ///
    /// Re-inserting an existing key replaces it as a fresh entry (frequency
    /// back to 0, new expiry) and returns the previous value without touching
    /// capacity. A new key on a full cache first evicts the LFU entry; if
    /// nothing can be evicted the insert fails with
    /// [`CacheError::CapacityExhausted`] and the cache is left unchanged.
    pub fn insert(
        &mut self,
        key: K,
        value: V,
        volatility: impl Into<Volatility>,
    ) -> Result<Option<Arc<V>>, CacheError> {
        self.insert_arc(key, Arc::new(value), volatility)
    }

    /// Same as [`insert`](Self::insert) for an already shared value.
    pub fn insert_arc(
        &mut self,
        key: K,
        value: Arc<V>,
        volatility: impl Into<Volatility>,
    ) -> Result<Option<Arc<V>>, CacheError> {
        let volatility = volatility.into();
        let expires_at = expiry_after(self.clock.now(), self.ttl_for(volatility));

        let replaced = match self.entries.remove(&key) {
            Some(previous) => {
                self.freq.remove(&key);
                self.metrics.record_insert_replacement();
                debug!(frequency = previous.frequency, "replacing cached entry");
                Some(previous.value)
            },
            None => {
                if self.entries.len() >= self.config.capacity {
                    self.evict_for_capacity()?;
                }
                self.metrics.record_insert_new();
                None
            },
        };

        self.freq.insert(key.clone());
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at,
                frequency: 0,
            },
        );
        self.debug_check_sizes();
        Ok(replaced)
    }

    /// Removes an entry and returns its key.
    ///
    /// With `Some(key)` that entry is removed unconditionally. With `None`
    /// the least frequently used entry is removed: lowest frequency first,
    /// and among equals the one that reached that frequency earliest.
    /// Returns [`CacheError::NotFound`] if the key is absent or the cache is
    /// empty.
    pub fn evict(&mut self, key: Option<&K>) -> Result<K, CacheError> {
        let removed = match key {
            Some(key) => self.entries.remove_entry(key).map(|(key, entry)| {
                let level = self.freq.remove(&key);
                debug_assert_eq!(level, Some(entry.frequency), "evicted key had no level");
                key
            }),
            None => self.freq.pop_min().map(|(key, level)| {
                let entry = self.entries.remove(&key);
                debug_assert_eq!(
                    entry.map(|entry| entry.frequency),
                    Some(level),
                    "LFU victim had no entry"
                );
                key
            }),
        };

        self.metrics.record_evict(removed.is_some());
        self.debug_check_sizes();
        removed.ok_or(CacheError::NotFound)
    }

    /// Frequency of `key`, without counting a read.
    pub fn frequency(&self, key: &K) -> Option<u64> {
        self.entries.get(key).map(|entry| entry.frequency)
    }

    /// Expiry instant of `key`.
    pub fn expires_at(&self, key: &K) -> Option<Instant> {
        self.entries.get(key).map(|entry| entry.expires_at)
    }

    /// Whether `key` holds an entry, stale or not. Does not count a read.
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Next capacity-eviction victim and its frequency.
    pub fn peek_lfu(&self) -> Option<(&K, u64)> {
        self.freq.peek_min()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn metrics_snapshot(&self) -> LfuTtlMetricsSnapshot {
        LfuTtlMetricsSnapshot::capture(
            &self.metrics,
            self.entries.len(),
            self.freq.level_count(),
            self.config.capacity,
        )
    }

    /// Verifies the entry table against the frequency index.
    ///
    /// Checks the capacity bound, one-to-one key membership, that each key's
    /// level equals its stored frequency, and the index's own bookkeeping.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        if self.entries.len() > self.config.capacity {
            return Err(InvariantError::new(format!(
                "{} entries exceed capacity {}",
                self.entries.len(),
                self.config.capacity
            )));
        }
        if self.entries.len() != self.freq.len() {
            return Err(InvariantError::new(format!(
                "{} entries but {} keys in the frequency index",
                self.entries.len(),
                self.freq.len()
            )));
        }
        for (key, entry) in &self.entries {
            match self.freq.frequency(key) {
                Some(level) if level == entry.frequency => {},
                Some(level) => {
                    return Err(InvariantError::new(format!(
                        "entry frequency {} filed under level {level}",
                        entry.frequency
                    )));
                },
                None => return Err(InvariantError::new("entry missing from frequency index")),
            }
        }
        self.freq.check_invariants()
    }

    fn ttl_for(&self, volatility: Volatility) -> Duration {
        match volatility {
            Volatility::Volatile => self.config.short_ttl,
            Volatility::Settled => self.config.long_ttl,
        }
    }

    fn evict_for_capacity(&mut self) -> Result<(), CacheError> {
        let capacity = self.config.capacity;
        if self.evict(None).is_ok() {
            self.metrics.record_capacity_eviction();
            debug!(capacity, "evicted least frequently used entry");
        }
        if self.entries.len() >= capacity {
            self.metrics.record_insert_rejected();
            return Err(CacheError::CapacityExhausted { capacity });
        }
        Ok(())
    }

    #[inline]
    fn debug_check_sizes(&self) {
        debug_assert_eq!(
            self.entries.len(),
            self.freq.len(),
            "entry table and frequency index diverged"
        );
        debug_assert!(self.entries.len() <= self.config.capacity);
    }
}

/// `now + ttl`, clamped to the furthest representable instant.
fn expiry_after(now: Instant, ttl: Duration) -> Instant {
    if let Some(at) = now.checked_add(ttl) {
        return at;
    }
    let (mut at, mut step) = (now, ttl);
    while !step.is_zero() {
        match at.checked_add(step) {
            Some(next) => at = next,
            None => step /= 2,
        }
    }
    at
}

impl<K, V, C> fmt::Debug for LfuTtlCache<K, V, C>
where
    K: Eq + Hash + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LfuTtlCache")
            .field("len", &self.entries.len())
            .field("capacity", &self.config.capacity)
            .field("long_ttl", &self.config.long_ttl)
            .field("short_ttl", &self.config.short_ttl)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// ConcurrentLfuTtlCache
// ---------------------------------------------------------------------------

/// Thread-safe handle to one [`LfuTtlCache`].
///
/// Every call takes the single engine lock once, so an eviction and the
/// insert that needed it happen in one critical section. Clones share the
/// same engine.
pub struct ConcurrentLfuTtlCache<K, V, C = MonotonicClock>
where
    K: Eq + Hash + Clone,
{
    inner: Arc<Mutex<LfuTtlCache<K, V, C>>>,
}

impl<K, V, C> Clone for ConcurrentLfuTtlCache<K, V, C>
where
    K: Eq + Hash + Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V, C> fmt::Debug for ConcurrentLfuTtlCache<K, V, C>
where
    K: Eq + Hash + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cache = self.inner.lock();
        f.debug_struct("ConcurrentLfuTtlCache")
            .field("len", &cache.entries.len())
            .field("capacity", &cache.config.capacity)
            .finish_non_exhaustive()
    }
}

impl<K, V> ConcurrentLfuTtlCache<K, V, MonotonicClock>
where
    K: Eq + Hash + Clone,
{
    pub fn new(config: CacheConfig) -> Self {
        Self::from_cache(LfuTtlCache::new(config))
    }

    pub fn try_new(config: CacheConfig) -> Result<Self, ConfigError> {
        LfuTtlCache::try_new(config).map(Self::from_cache)
    }
}

impl<K, V, C> ConcurrentLfuTtlCache<K, V, C>
where
    K: Eq + Hash + Clone,
    C: Clock,
{
    pub fn with_clock(config: CacheConfig, clock: C) -> Self {
        Self::from_cache(LfuTtlCache::with_clock(config, clock))
    }

    pub fn from_cache(cache: LfuTtlCache<K, V, C>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(cache)),
        }
    }

    pub fn lookup(&self, key: &K) -> Option<Arc<V>> {
        self.inner.lock().lookup(key)
    }

    pub fn insert(
        &self,
        key: K,
        value: V,
        volatility: impl Into<Volatility>,
    ) -> Result<Option<Arc<V>>, CacheError> {
        let value = Arc::new(value);
        self.inner.lock().insert_arc(key, value, volatility)
    }

    pub fn evict(&self, key: Option<&K>) -> Result<K, CacheError> {
        self.inner.lock().evict(key)
    }

    /// Returns the cached value or computes and caches it.
    ///
    /// `compute` runs without the lock held, so concurrent callers missing on
    /// the same key may each compute it; the last insert wins. If the result
    /// cannot be cached it is still returned.
    ///
    /// ```
    /// use budget_cache::config::CacheConfig;
    /// use budget_cache::policy::lfu_ttl::{ConcurrentLfuTtlCache, Volatility};
    ///
    /// let cache: ConcurrentLfuTtlCache<&str, u64> = ConcurrentLfuTtlCache::new(CacheConfig::default());
    /// let first = cache
    ///     .get_or_insert_with("q1", Volatility::Settled, || Ok::<_, ()>(42))
    ///     .unwrap();
    /// let second = cache
    ///     .get_or_insert_with("q1", Volatility::Settled, || Ok::<_, ()>(0))
    ///     .unwrap();
    /// assert_eq!((*first, *second), (42, 42));
    /// ```
    pub fn get_or_insert_with<F, E>(
        &self,
        key: K,
        volatility: impl Into<Volatility>,
        compute: F,
    ) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.lookup(&key) {
            return Ok(value);
        }

        let value = Arc::new(compute()?);
        let mut cache = self.inner.lock();
        if let Err(err) = cache.insert_arc(key, Arc::clone(&value), volatility) {
            warn!(error = %err, "returning result without caching it");
        }
        Ok(value)
    }

    pub fn frequency(&self, key: &K) -> Option<u64> {
        self.inner.lock().frequency(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity()
    }

    pub fn metrics_snapshot(&self) -> LfuTtlMetricsSnapshot {
        self.inner.lock().metrics_snapshot()
    }

    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.inner.lock().check_invariants()
    }
}
