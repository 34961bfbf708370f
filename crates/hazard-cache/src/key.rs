//! Cache keys with a precomputed hash

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// A key paired with its hash, computed once at construction.
///
/// The cache trusts `K`'s `Hash` and `Eq` to cover exactly the fields that
/// determine the cached value. Metadata that does not affect the result must
/// be left out of both.
#[derive(Debug, Clone)]
pub struct KeyAndHash<K> {
    key: K,
    hash: u64,
}

impl<K: Hash> KeyAndHash<K> {
    pub fn new(key: K) -> Self {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        Self { hash: hasher.finish(), key }
    }
}

impl<K> KeyAndHash<K> {
    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn hash_value(&self) -> u64 {
        self.hash
    }

    pub fn into_key(self) -> K {
        self.key
    }
}

impl<K: PartialEq> PartialEq for KeyAndHash<K> {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.key == other.key
    }
}

impl<K: Eq> Eq for KeyAndHash<K> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct LayerParams {
        shape: [u32; 4],
        dtype: u8,
        // Diagnostic only; must not split cache entries.
        node_name: String,
    }

    impl PartialEq for LayerParams {
        fn eq(&self, other: &Self) -> bool {
            self.shape == other.shape && self.dtype == other.dtype
        }
    }

    impl Eq for LayerParams {}

    impl Hash for LayerParams {
        fn hash<H: Hasher>(&self, state: &mut H) {
            self.shape.hash(state);
            self.dtype.hash(state);
        }
    }

    fn params(shape: [u32; 4], node_name: &str) -> LayerParams {
        LayerParams { shape, dtype: 1, node_name: node_name.to_string() }
    }

    #[test]
    fn equal_keys_share_hash() {
        let a = KeyAndHash::new(params([1, 2, 3, 4], "conv1"));
        let b = KeyAndHash::new(params([1, 2, 3, 4], "conv1"));
        assert_eq!(a.hash_value(), b.hash_value());
        assert_eq!(a, b);
    }

    #[test]
    fn metadata_does_not_affect_identity() {
        let a = KeyAndHash::new(params([8, 8, 8, 8], "conv1"));
        let b = KeyAndHash::new(params([8, 8, 8, 8], "conv2/bwd"));
        assert_eq!(a, b);
        assert_ne!(a.key().node_name, b.key().node_name);
    }

    #[test]
    fn different_fields_differ() {
        let a = KeyAndHash::new(params([1, 2, 3, 4], "x"));
        let b = KeyAndHash::new(params([1, 2, 3, 5], "x"));
        assert_ne!(a, b);
        assert_eq!(b.into_key().shape, [1, 2, 3, 5]);
    }
}
