//! Error types for caller-facing constructors

/// Result type for range construction
pub type Result<T> = std::result::Result<T, RangeError>;

/// Errors raised when building a range from untrusted parameters.
///
/// Everything past construction is precondition-checked and panics instead;
/// see the crate documentation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    /// A cyclic range needs a non-zero period
    #[error("cyclic range stride must be non-zero")]
    ZeroStride,

    /// End lies before start
    #[error("inverted range bounds: start {start} > end {end}")]
    InvertedBounds { start: i128, end: i128 },

    /// The repeated block is longer than its period
    #[error("cyclic range size {size} exceeds stride {stride}")]
    SizeExceedsStride { size: u64, stride: u32 },

    /// Stride does not fit the engine's configured maximum
    #[error("cyclic range stride {stride} exceeds maximum {max}")]
    StrideTooLarge { stride: u64, max: u32 },

    /// Stored fields disagree with each other
    #[error("cyclic range start {start}, end {end}, size {size} are not normalized to stride {stride}")]
    NotNormalized { start: u32, end: u32, stride: u32, size: u32 },
}
