pub mod lfu_ttl;

pub use lfu_ttl::{ConcurrentLfuTtlCache, LfuTtlCache, Volatility};
