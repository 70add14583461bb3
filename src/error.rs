//! Error types for the budget cache.
//!
//! ## Key Components
//!
//! - [`CacheError`]: Returned by engine operations that can fail at runtime
//!   (capacity exhaustion on insert, eviction of an absent key).
//! - [`ConfigError`]: Returned when cache configuration parameters are invalid
//!   (e.g. zero capacity, zero or inverted TTLs, unparsable env values).
//! - [`InvariantError`]: Returned by `check_invariants` when the entry table and
//!   the frequency index have diverged.
//!
//! ## Example Usage
//!
//! ```
//! use budget_cache::config::CacheConfig;
//! use budget_cache::error::CacheError;
//! use budget_cache::policy::lfu_ttl::{LfuTtlCache, Volatility};
//!
//! let mut cache: LfuTtlCache<&str, u32> = LfuTtlCache::new(CacheConfig::default().with_capacity(0));
//!
//! // A zero-capacity engine has nothing to evict, so inserts are rejected.
//! let err = cache.insert("k", 1, Volatility::Settled).unwrap_err();
//! assert_eq!(err, CacheError::CapacityExhausted { capacity: 0 });
//! ```

use thiserror::Error;

// ---------------------------------------------------------------------------
// CacheError
// ---------------------------------------------------------------------------

/// Runtime failures of the cache engine.
///
/// Neither variant is fatal: callers fall back to computing without caching on
/// [`CacheError::CapacityExhausted`], and [`CacheError::NotFound`] is logged and
/// swallowed on the lookup path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CacheError {
    /// The cache is full and eviction could not free a slot.
    #[error("cache is at capacity ({capacity} entries) and no entry could be evicted")]
    CapacityExhausted {
        /// Configured capacity of the engine that rejected the insert.
        capacity: usize,
    },
    /// The requested key is not present (or the cache is empty on LFU eviction).
    #[error("key not present in cache")]
    NotFound,
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when cache configuration parameters are invalid.
///
/// Produced by [`CacheConfig::validate`](crate::config::CacheConfig::validate),
/// [`CacheConfig::from_env`](crate::config::CacheConfig::from_env) and
/// [`LfuTtlCache::try_new`](crate::policy::lfu_ttl::LfuTtlCache::try_new).
///
/// # Example
///
/// ```
/// use budget_cache::config::CacheConfig;
///
/// let err = CacheConfig::default().with_capacity(0).validate().unwrap_err();
/// assert!(err.to_string().contains("capacity"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// Error returned when internal cache invariants are violated.
///
/// Carries a human-readable description of which invariant failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct InvariantError(String);

impl InvariantError {
    /// Creates a new `InvariantError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
