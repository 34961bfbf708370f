//! # hazard-cache
//!
//! Memoizes expensive per-key descriptor sets in a bounded, thread-safe LRU
//! cache. Construct one [`DescriptorsCache`] per compilation context and pass
//! it to whatever generates descriptors.
//!
//! ```rust
//! use hazard_cache::{DescriptorsCache, KeyAndHash};
//!
//! let cache = DescriptorsCache::<(u32, u32), u64>::new(2);
//! let key = KeyAndHash::new((64, 3));
//! if cache.get(&key).is_none() {
//!     cache.add(key.clone(), &[1, 2, 3]);
//! }
//! assert_eq!(cache.get(&key).as_deref(), Some(&vec![1, 2, 3]));
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod key;
mod lru;

pub use cache::DescriptorsCache;
pub use config::{CacheConfig, CAPACITY_ENV, DEFAULT_CAPACITY};
pub use error::{CacheError, Result};
pub use key::KeyAndHash;
