//! budget-cache: an LFU cache with per-entry TTL for memoizing budget report
//! aggregations.
//!
//! The engine lives in [`policy::lfu_ttl`]; [`report`] wires it to the
//! allocated/spent report. See `DESIGN.md` for internal architecture.

pub mod clock;
pub mod config;
pub mod ds;
pub mod error;
pub mod metrics;
pub mod policy;
pub mod prelude;
pub mod report;
