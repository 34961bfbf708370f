//! Error types for cache construction

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The capacity override was not an unsigned integer.
    #[error("invalid descriptors cache capacity {value:?} in {variable}")]
    InvalidCapacity { variable: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, CacheError>;
