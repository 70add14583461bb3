//! Allocated/spent report caching.
//!
//! The budget backend answers "how much was allocated to and spent from each
//! category between two dates" by scanning every assignment and transaction
//! in the range. Answers are memoized in an LFU-TTL cache keyed by a
//! fingerprint of the request. Ranges that reach today or later can still
//! gain transactions, so their answers use the short TTL.
//!
//! ## Example
//!
//! ```
//! use chrono::NaiveDate;
//! use budget_cache::config::CacheConfig;
//! use budget_cache::report::{AllocationReport, ReportCache, ReportKey};
//!
//! let cache = ReportCache::new(CacheConfig::default());
//! let jan = ReportKey::new(
//!     "user-1",
//!     NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!     NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
//! );
//! let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
//!
//! let report = cache
//!     .fetch(&jan, today, |_| Ok::<_, ()>(AllocationReport::default()))
//!     .unwrap();
//! assert!(report.allocated_and_spent.is_empty());
//! assert_eq!(cache.cache().len(), 1);
//! ```

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::clock::{Clock, MonotonicClock};
use crate::config::CacheConfig;
use crate::error::ConfigError;
use crate::policy::lfu_ttl::{ConcurrentLfuTtlCache, Volatility};

/// Parameters of one allocated/spent request. Both dates are inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportKey {
    pub user_id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportKey {
    pub fn new(user_id: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            user_id: user_id.into(),
            start,
            end,
        }
    }

    /// Deterministic cache key for this request.
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use budget_cache::report::ReportKey;
    ///
    /// let key = ReportKey::new(
    ///     "u1",
    ///     NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
    ///     NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
    /// );
    /// assert_eq!(key.fingerprint().as_str(), "u1|2024-01-01|2024-01-31");
    /// ```
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint(format!("{}|{}|{}", self.user_id, self.start, self.end))
    }

    pub fn volatility(&self, today: NaiveDate) -> Volatility {
        Volatility::for_range_end(self.end, today)
    }

    #[inline]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Cache key derived from a [`ReportKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Volatility {
    /// A range ending today or later can still gain transactions.
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use budget_cache::policy::lfu_ttl::Volatility;
    ///
    /// let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
    /// assert_eq!(Volatility::for_range_end(today, today), Volatility::Volatile);
    /// assert_eq!(
    ///     Volatility::for_range_end(today.pred_opt().unwrap(), today),
    ///     Volatility::Settled
    /// );
    /// ```
    pub fn for_range_end(end: NaiveDate, today: NaiveDate) -> Self {
        if end >= today {
            Volatility::Volatile
        } else {
            Volatility::Settled
        }
    }
}

// ---------------------------------------------------------------------------
// Records and payload
// ---------------------------------------------------------------------------

/// Budget category as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub is_unallocated_funds: bool,
}

/// Money assigned to a category on a date. Amounts are in cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub category_id: String,
    pub date: NaiveDate,
    pub amount: i64,
}

/// Account transaction booked against a category. Negative amounts are
/// spending, positive amounts are income or refunds. Amounts are in cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub category_id: String,
    pub date: NaiveDate,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotals {
    pub category_id: String,
    pub allocated: i64,
    /// Net outflow. Negative when refunds exceed spending.
    pub spent: i64,
}

/// The memoized answer to one [`ReportKey`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationReport {
    pub allocated_and_spent: Vec<CategoryTotals>,
    pub unallocated_income: i64,
}

impl AllocationReport {
    /// Computes the report for `key` from raw records.
    ///
    /// Only categories owned by `key.user_id` are reported, in input order.
    /// The unallocated-funds category reports no spending; its transactions
    /// are summed into `unallocated_income` instead.
    pub fn aggregate(
        key: &ReportKey,
        categories: &[Category],
        assignments: &[Assignment],
        transactions: &[Transaction],
    ) -> Self {
        let mut allocated: FxHashMap<&str, i64> = FxHashMap::default();
        for assignment in assignments.iter().filter(|a| key.contains(a.date)) {
            *allocated.entry(assignment.category_id.as_str()).or_default() += assignment.amount;
        }

        let mut net: FxHashMap<&str, i64> = FxHashMap::default();
        for transaction in transactions.iter().filter(|t| key.contains(t.date)) {
            *net.entry(transaction.category_id.as_str()).or_default() += transaction.amount;
        }

        let owned = || categories.iter().filter(|c| c.user_id == key.user_id);

        let allocated_and_spent = owned()
            .map(|category| {
                let id = category.id.as_str();
                let spent = if category.is_unallocated_funds {
                    0
                } else {
                    -net.get(id).copied().unwrap_or(0)
                };
                CategoryTotals {
                    category_id: category.id.clone(),
                    allocated: allocated.get(id).copied().unwrap_or(0),
                    spent,
                }
            })
            .collect();

        let unallocated_income = owned()
            .find(|category| category.is_unallocated_funds)
            .and_then(|category| net.get(category.id.as_str()).copied())
            .unwrap_or(0);

        Self {
            allocated_and_spent,
            unallocated_income,
        }
    }
}

// ---------------------------------------------------------------------------
// ReportCache
// ---------------------------------------------------------------------------

/// Shared memo of [`AllocationReport`]s, one per request fingerprint.
///
/// Built once at startup and handed to request handlers; clones share the
/// same engine.
pub struct ReportCache<C = MonotonicClock> {
    cache: ConcurrentLfuTtlCache<Fingerprint, AllocationReport, C>,
}

impl<C> Clone for ReportCache<C> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
        }
    }
}

impl<C> fmt::Debug for ReportCache<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportCache")
            .field("cache", &self.cache)
            .finish()
    }
}

impl ReportCache<MonotonicClock> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            cache: ConcurrentLfuTtlCache::new(config),
        }
    }

    pub fn try_new(config: CacheConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            cache: ConcurrentLfuTtlCache::try_new(config)?,
        })
    }
}

impl<C: Clock> ReportCache<C> {
    pub fn with_clock(config: CacheConfig, clock: C) -> Self {
        Self {
            cache: ConcurrentLfuTtlCache::with_clock(config, clock),
        }
    }

    /// Returns the cached report for `key` or builds it with `compute`.
    ///
    /// `today` decides whether the result gets the short or the long TTL.
    /// `compute` runs outside the cache lock.
    #[instrument(skip_all, fields(user_id = %key.user_id, start = %key.start, end = %key.end))]
    pub fn fetch<F, E>(
        &self,
        key: &ReportKey,
        today: NaiveDate,
        compute: F,
    ) -> Result<Arc<AllocationReport>, E>
    where
        F: FnOnce(&ReportKey) -> Result<AllocationReport, E>,
    {
        let volatility = key.volatility(today);
        self.cache
            .get_or_insert_with(key.fingerprint(), volatility, || {
                debug!(?volatility, "computing allocation report");
                compute(key)
            })
    }

    /// [`fetch`](Self::fetch) with today's local date.
    pub fn fetch_today<F, E>(&self, key: &ReportKey, compute: F) -> Result<Arc<AllocationReport>, E>
    where
        F: FnOnce(&ReportKey) -> Result<AllocationReport, E>,
    {
        self.fetch(key, chrono::Local::now().date_naive(), compute)
    }

    pub fn cache(&self) -> &ConcurrentLfuTtlCache<Fingerprint, AllocationReport, C> {
        &self.cache
    }
}
