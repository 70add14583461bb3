pub mod frequency_buckets;
mod slot_arena;

pub use frequency_buckets::{FrequencyBuckets, LevelIter};
