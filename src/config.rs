//! Cache configuration.
//!
//! Set once at process startup and handed to the engine; nothing here is
//! hot-reloadable.
//!
//! ## Example
//!
//! ```
//! use std::time::Duration;
//! use budget_cache::config::CacheConfig;
//!
//! let config = CacheConfig::default()
//!     .with_capacity(64)
//!     .with_short_ttl(Duration::from_secs(30));
//! assert!(config.validate().is_ok());
//! assert_eq!(config.long_ttl, Duration::from_secs(1200));
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Default number of cached reports.
pub const DEFAULT_CAPACITY: usize = 5;
/// Default lifetime of results over ranges that can no longer change.
pub const DEFAULT_LONG_TTL: Duration = Duration::from_secs(1200);
/// Default lifetime of results over ranges that are still open.
pub const DEFAULT_SHORT_TTL: Duration = Duration::from_secs(60);
/// Longest TTL `validate` accepts.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

pub const ENV_CAPACITY: &str = "BUDGET_CACHE_CAPACITY";
pub const ENV_LONG_TTL_SECS: &str = "BUDGET_CACHE_LONG_TTL_SECS";
pub const ENV_SHORT_TTL_SECS: &str = "BUDGET_CACHE_SHORT_TTL_SECS";

/// Capacity and TTL settings for one cache engine.
///
/// Deserializes from `{ capacity, long_ttl_seconds, short_ttl_seconds }`;
/// absent fields keep their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "RawCacheConfig")]
pub struct CacheConfig {
    pub capacity: usize,
    pub long_ttl: Duration,
    pub short_ttl: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawCacheConfig {
    capacity: usize,
    long_ttl_seconds: u64,
    short_ttl_seconds: u64,
}

impl Default for RawCacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            long_ttl_seconds: DEFAULT_LONG_TTL.as_secs(),
            short_ttl_seconds: DEFAULT_SHORT_TTL.as_secs(),
        }
    }
}

impl From<RawCacheConfig> for CacheConfig {
    fn from(raw: RawCacheConfig) -> Self {
        Self {
            capacity: raw.capacity,
            long_ttl: Duration::from_secs(raw.long_ttl_seconds),
            short_ttl: Duration::from_secs(raw.short_ttl_seconds),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            long_ttl: DEFAULT_LONG_TTL,
            short_ttl: DEFAULT_SHORT_TTL,
        }
    }
}

impl CacheConfig {
    pub fn new(capacity: usize, long_ttl: Duration, short_ttl: Duration) -> Self {
        Self {
            capacity,
            long_ttl,
            short_ttl,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_long_ttl(mut self, ttl: Duration) -> Self {
        self.long_ttl = ttl;
        self
    }

    pub fn with_short_ttl(mut self, ttl: Duration) -> Self {
        self.short_ttl = ttl;
        self
    }

    /// Checks that capacity and both TTLs are positive, that the long TTL is
    /// at most [`MAX_TTL`] and that the short TTL does not outlive the long one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::new("capacity must be > 0"));
        }
        if self.long_ttl.is_zero() {
            return Err(ConfigError::new("long_ttl must be > 0"));
        }
        if self.short_ttl.is_zero() {
            return Err(ConfigError::new("short_ttl must be > 0"));
        }
        if self.long_ttl > MAX_TTL {
            return Err(ConfigError::new(format!(
                "long_ttl ({}s) must not exceed {}s",
                self.long_ttl.as_secs(),
                MAX_TTL.as_secs()
            )));
        }
        if self.short_ttl > self.long_ttl {
            return Err(ConfigError::new(format!(
                "short_ttl ({}s) must not exceed long_ttl ({}s)",
                self.short_ttl.as_secs(),
                self.long_ttl.as_secs()
            )));
        }
        Ok(())
    }

    /// Builds a validated config from `BUDGET_CACHE_*` environment variables.
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(capacity) = parse_var(&lookup, ENV_CAPACITY)? {
            config.capacity = capacity;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, ENV_LONG_TTL_SECS)? {
            config.long_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, ENV_SHORT_TTL_SECS)? {
            config.short_ttl = Duration::from_secs(secs);
        }
        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|err| ConfigError::new(format!("{name}={raw:?} is invalid: {err}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name| {
            pairs
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
        }
    }

    #[test]
    fn defaults_are_valid() {
        let config = CacheConfig::default();
        assert_eq!(config.capacity, 5);
        assert_eq!(config.long_ttl, Duration::from_secs(1200));
        assert_eq!(config.short_ttl, Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = CacheConfig::default().with_capacity(0).validate().unwrap_err();
        assert_eq!(err.message(), "capacity must be > 0");
    }

    #[test]
    fn zero_ttls_are_rejected() {
        assert!(
            CacheConfig::default()
                .with_long_ttl(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(
            CacheConfig::default()
                .with_short_ttl(Duration::ZERO)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn short_ttl_may_not_exceed_long_ttl() {
        let config = CacheConfig::new(5, Duration::from_secs(10), Duration::from_secs(20));
        let err = config.validate().unwrap_err();
        assert!(err.message().contains("short_ttl"));
    }

    #[test]
    fn from_lookup_overrides_defaults() {
        let config = CacheConfig::from_lookup(env(&[
            (ENV_CAPACITY, "32"),
            (ENV_SHORT_TTL_SECS, " 15 "),
        ]))
        .unwrap();
        assert_eq!(config.capacity, 32);
        assert_eq!(config.short_ttl, Duration::from_secs(15));
        assert_eq!(config.long_ttl, DEFAULT_LONG_TTL);
    }

    #[test]
    fn from_lookup_reports_bad_values() {
        let err = CacheConfig::from_lookup(env(&[(ENV_CAPACITY, "lots")])).unwrap_err();
        assert!(err.message().starts_with("BUDGET_CACHE_CAPACITY"));
    }

    #[test]
    fn huge_ttl_is_rejected() {
        let err = CacheConfig::from_lookup(env(&[(ENV_LONG_TTL_SECS, "18446744073709551615")]))
            .unwrap_err();
        assert!(err.message().starts_with("long_ttl"));

        let at_limit = CacheConfig::default().with_long_ttl(MAX_TTL);
        assert!(at_limit.validate().is_ok());
        assert!(at_limit.with_long_ttl(MAX_TTL + Duration::from_secs(1)).validate().is_err());
    }

    #[test]
    fn from_lookup_validates_result() {
        let err = CacheConfig::from_lookup(env(&[(ENV_CAPACITY, "0")])).unwrap_err();
        assert_eq!(err.message(), "capacity must be > 0");
    }

    #[test]
    fn deserializes_seconds_with_defaults() {
        let config: CacheConfig =
            serde_json::from_str(r#"{ "capacity": 10, "short_ttl_seconds": 5 }"#).unwrap();
        assert_eq!(config.capacity, 10);
        assert_eq!(config.short_ttl, Duration::from_secs(5));
        assert_eq!(config.long_ttl, DEFAULT_LONG_TTL);
    }

    #[test]
    fn deserialize_rejects_unknown_fields() {
        let result: Result<CacheConfig, _> = serde_json::from_str(r#"{ "ttl": 5 }"#);
        assert!(result.is_err());
    }
}
