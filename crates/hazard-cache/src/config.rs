//! Cache sizing

use std::env;

use crate::error::{CacheError, Result};

/// Environment variable overriding [`CacheConfig::capacity`].
pub const CAPACITY_ENV: &str = "HAZARD_DESCRIPTORS_CACHE_SIZE";

/// Number of entries kept when nothing overrides it.
pub const DEFAULT_CAPACITY: usize = 238;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries. Zero disables the cache.
    pub capacity: usize,
}

impl CacheConfig {
    pub const fn new() -> Self {
        Self { capacity: DEFAULT_CAPACITY }
    }

    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub const fn disabled() -> Self {
        Self { capacity: 0 }
    }

    /// Build a configuration from `HAZARD_DESCRIPTORS_CACHE_SIZE`.
    ///
    /// Unset or blank keeps [`DEFAULT_CAPACITY`]; anything that is not an
    /// unsigned integer is rejected.
    pub fn from_env() -> Result<Self> {
        match env::var(CAPACITY_ENV) {
            Ok(value) => Self::parse_capacity(&value),
            Err(_) => Ok(Self::new()),
        }
    }

    fn parse_capacity(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Ok(Self::new());
        }
        trimmed
            .parse::<usize>()
            .map(|capacity| Self::new().with_capacity(capacity))
            .map_err(|_| CacheError::InvalidCapacity { variable: CAPACITY_ENV, value: value.to_string() })
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new()
    }
}
