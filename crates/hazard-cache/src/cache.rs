//! Bounded LRU cache of computed descriptor sets
//!
//! One mutex guards the whole state. Values are handed out as shared
//! snapshots, so a reader never sees a half-written entry and never copies.
//! Two threads computing the same key both do the work; only the first
//! [`DescriptorsCache::add`] stores its result.

use std::sync::Arc;

use hashbrown::HashTable;
use hazard_tracing::perf_event;
use parking_lot::Mutex;

use crate::config::CacheConfig;
use crate::error::Result;
use crate::key::KeyAndHash;
use crate::lru::LruList;

struct Entry<K, V> {
    key: KeyAndHash<K>,
    node: usize,
    value: Arc<Vec<V>>,
}

struct State<K, V> {
    table: HashTable<Entry<K, V>>,
    lru: LruList,
    hits: u64,
    computed: u64,
}

pub struct DescriptorsCache<K, V> {
    capacity: usize,
    state: Mutex<State<K, V>>,
}

impl<K: Eq, V: Clone> DescriptorsCache<K, V> {
    /// Create a cache holding at most `capacity` entries; zero disables it.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(State {
                table: HashTable::with_capacity(capacity),
                lru: LruList::with_capacity(capacity),
                hits: 0,
                computed: 0,
            }),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.capacity)
    }

    /// Size the cache from `HAZARD_DESCRIPTORS_CACHE_SIZE`.
    pub fn from_env() -> Result<Self> {
        CacheConfig::from_env().map(|config| Self::from_config(&config))
    }

    /// Look up `key`, marking it most recently used on a hit.
    pub fn get(&self, key: &KeyAndHash<K>) -> Option<Arc<Vec<V>>> {
        if !self.is_enabled() {
            return None;
        }
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let entry = state.table.find(key.hash_value(), |e| e.key == *key)?;
        let node = entry.node;
        let value = Arc::clone(&entry.value);
        state.lru.move_to_front(node);
        state.hits += 1;
        Some(value)
    }

    /// Presence check that leaves the recency order untouched.
    pub fn contains(&self, key: &KeyAndHash<K>) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let state = self.state.lock();
        state.table.find(key.hash_value(), |e| e.key == *key).is_some()
    }

    /// Store a copy of `values` under `key`.
    ///
    /// Returns `false` without touching anything when the cache is disabled
    /// or already holds `key`. A full cache evicts its least recently used
    /// entry and reuses that entry's list node.
    pub fn add(&self, key: KeyAndHash<K>, values: &[V]) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let hash = key.hash_value();
        if state.table.find(hash, |e| e.key == key).is_some() {
            return false;
        }

        let value = Arc::new(values.to_vec());
        let entry = if state.table.len() < self.capacity {
            let node = state.lru.push_front(hash);
            Entry { key, node, value }
        } else {
            let Some(victim) = state.lru.back() else {
                unreachable!("full cache of capacity {} has no LRU node", self.capacity);
            };
            let victim_hash = state.lru.hash_of(victim);
            let mut entry = match state.table.find_entry(victim_hash, |e| e.node == victim) {
                Ok(occupied) => occupied.remove().0,
                Err(_) => unreachable!("LRU node {victim} has no cache entry"),
            };
            perf_event!("descriptors_cache_evict", node = victim, size = state.table.len() + 1);
            entry.key = key;
            entry.value = value;
            state.lru.rekey(victim, hash);
            state.lru.move_to_front(victim);
            entry
        };
        state.table.insert_unique(hash, entry, |e| e.key.hash_value());
        state.computed += 1;
        true
    }

    /// Size, capacity, hit count and number of stored results, in that order.
    pub fn get_debug_info(&self) -> Vec<String> {
        let state = self.state.lock();
        vec![
            format!("descriptors cache size: {}", state.table.len()),
            format!("descriptors cache capacity: {}", self.capacity),
            format!("descriptors cache hits: {}", state.hits),
            format!("descriptors cache computed: {}", state.computed),
        ]
    }
}

impl<K, V> DescriptorsCache<K, V> {
    pub fn len(&self) -> usize {
        self.state.lock().table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    pub fn hits(&self) -> u64 {
        self.state.lock().hits
    }
}

impl<K, V> std::fmt::Debug for DescriptorsCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("DescriptorsCache")
            .field("capacity", &self.capacity)
            .field("len", &state.table.len())
            .field("hits", &state.hits)
            .field("computed", &state.computed)
            .finish()
    }
}
