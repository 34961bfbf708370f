//! Eviction order and concurrent use of [`DescriptorsCache`]

use std::sync::Arc;
use std::thread;

use hazard_cache::{CacheConfig, DescriptorsCache, KeyAndHash};

const CAPACITY: usize = 8;

fn key(k: u64) -> KeyAndHash<u64> {
    KeyAndHash::new(k)
}

#[test]
fn test_overflow_evicts_first_inserted() {
    let cache = DescriptorsCache::new(CAPACITY);
    for k in 0..=CAPACITY as u64 {
        assert!(cache.add(key(k), &[k]));
    }
    assert!(!cache.contains(&key(0)));
    for k in 1..=CAPACITY as u64 {
        assert!(cache.contains(&key(k)), "key {k} evicted");
    }
    assert_eq!(cache.len(), CAPACITY);
}

#[test]
fn test_get_protects_from_eviction() {
    let cache = DescriptorsCache::new(CAPACITY);
    for k in 0..CAPACITY as u64 {
        cache.add(key(k), &[k]);
    }
    assert!(cache.get(&key(0)).is_some());
    cache.add(key(100), &[100]);

    assert!(cache.contains(&key(0)));
    assert!(!cache.contains(&key(1)));
    assert!(cache.contains(&key(100)));
}

#[test]
fn test_long_stream_keeps_most_recent_window() {
    let cache = DescriptorsCache::from_config(&CacheConfig::new().with_capacity(CAPACITY));
    for k in 0..1000u64 {
        cache.add(key(k), &[k, k + 1]);
    }
    for k in 0..1000u64 {
        assert_eq!(cache.contains(&key(k)), k >= 1000 - CAPACITY as u64);
    }
    assert_eq!(*cache.get(&key(999)).unwrap(), vec![999, 1000]);
}

#[test]
fn test_capacity_zero_disables_cache() {
    let cache = DescriptorsCache::from_config(&CacheConfig::disabled());
    for k in 0..4 {
        assert!(!cache.add(key(k), &[k]));
        assert!(!cache.contains(&key(k)));
        assert!(cache.get(&key(k)).is_none());
    }
}

#[test]
fn test_concurrent_add_stores_one_value_per_key() {
    let cache = Arc::new(DescriptorsCache::<u64, u64>::new(64));
    let handles: Vec<_> = (0..8u64)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                let mut stored = 0;
                for k in 0..32u64 {
                    if cache.add(key(k), &[k * 10 + t]) {
                        stored += 1;
                    }
                    assert!(cache.get(&key(k)).is_some());
                }
                stored
            })
        })
        .collect();

    let stored: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(stored, 32);
    assert_eq!(cache.len(), 32);
    for k in 0..32u64 {
        let value = cache.get(&key(k)).unwrap();
        assert_eq!(value.len(), 1);
        assert_eq!(value[0] / 10, k);
    }
}
