//! Property-based tests for the LRU+TTL cache's size and eviction
//! invariants (§3 "LRU cache entry": "size never exceeds capacity after any
//! insertion; eviction removes the least-recently-used entry").

use proptest::prelude::*;

use mcpd_core::LruTtlCache;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: after any sequence of `put`s, the cache never holds more
    /// entries than its configured capacity.
    #[test]
    fn size_never_exceeds_capacity(capacity in 1usize..16, keys in prop::collection::vec(0i64..32, 0..64)) {
        let cache: LruTtlCache<i64, i64> = LruTtlCache::new(capacity, u64::MAX, None);
        for key in keys {
            cache.put(key, key, None);
            prop_assert!(cache.size() <= capacity);
        }
    }

    /// Property: the most recently inserted key is always present
    /// immediately after its own insertion, regardless of capacity pressure
    /// from keys inserted before it.
    #[test]
    fn most_recent_insertion_always_present(capacity in 1usize..16, keys in prop::collection::vec(0i64..32, 1..64)) {
        let cache: LruTtlCache<i64, i64> = LruTtlCache::new(capacity, u64::MAX, None);
        let mut last = keys[0];
        for key in keys {
            cache.put(key, key, None);
            last = key;
        }
        prop_assert!(cache.contains(&last));
    }

    /// Property: a zero-capacity cache is always empty, and `put` is a
    /// no-op relative to retrieval (§8 edge case).
    #[test]
    fn zero_capacity_is_always_empty(keys in prop::collection::vec(0i64..32, 0..32)) {
        let cache: LruTtlCache<i64, i64> = LruTtlCache::new(0, u64::MAX, None);
        for key in keys {
            cache.put(key, key, None);
            prop_assert_eq!(cache.size(), 0);
            prop_assert!(!cache.contains(&key));
        }
    }
}
