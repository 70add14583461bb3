#![no_main]

use std::time::Duration;

use budget_cache::clock::ManualClock;
use budget_cache::config::CacheConfig;
use budget_cache::policy::lfu_ttl::LfuTtlCache;
use libfuzzer_sys::fuzz_target;

// Fuzz arbitrary operation sequences on the LFU-TTL engine
//
// The first byte picks the capacity; every following pair is an
// (op, key) step. Invariants are checked after each step.
fuzz_target!(|data: &[u8]| {
    let Some((&capacity, ops)) = data.split_first() else {
        return;
    };

    let clock = ManualClock::new();
    let config = CacheConfig::new(
        usize::from(capacity % 16),
        Duration::from_secs(1200),
        Duration::from_secs(60),
    );
    let mut cache: LfuTtlCache<u8, u32, _> = LfuTtlCache::with_clock(config, clock.clone());

    for step in ops.chunks_exact(2) {
        let (op, key) = (step[0], step[1] % 32);
        match op % 6 {
            0 => {
                let _ = cache.insert(key, u32::from(op), false);
            },
            1 => {
                let _ = cache.insert(key, u32::from(op), true);
            },
            2 | 3 => {
                let before = cache.frequency(&key);
                if cache.lookup(&key).is_some() {
                    assert_eq!(cache.frequency(&key), before.map(|f| f + 1));
                }
            },
            4 => {
                let target = (op & 0x80 != 0).then_some(key);
                let _ = cache.evict(target.as_ref());
            },
            _ => clock.advance(Duration::from_secs(u64::from(key) * 4)),
        }

        assert!(cache.len() <= cache.capacity());
        if let Err(err) = cache.check_invariants() {
            panic!("invariant violated: {err}");
        }
    }
});
