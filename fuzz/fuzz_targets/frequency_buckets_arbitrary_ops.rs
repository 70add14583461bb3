#![no_main]

use budget_cache::ds::FrequencyBuckets;
use libfuzzer_sys::fuzz_target;

// Fuzz arbitrary operation sequences on FrequencyBuckets
//
// Random insert, touch, remove and pop_min steps; the lowest level and the
// index bookkeeping are checked after each one.
fuzz_target!(|data: &[u8]| {
    let mut buckets: FrequencyBuckets<u8> = FrequencyBuckets::new();

    for step in data.chunks_exact(2) {
        let key = step[1] % 64;
        match step[0] % 4 {
            0 => {
                buckets.insert(key);
            },
            1 => {
                buckets.touch(&key);
            },
            2 => {
                buckets.remove(&key);
            },
            _ => {
                let min = buckets.min_freq();
                if let Some((_, freq)) = buckets.pop_min() {
                    assert_eq!(Some(freq), min);
                }
            },
        }

        assert_eq!(buckets.levels().first().copied(), buckets.min_freq());
        if let Err(err) = buckets.check_invariants() {
            panic!("invariant violated: {err}");
        }
    }
});
