//! # hazard-core
//!
//! Memory footprint model and dependency tracking for compiler backends that
//! schedule work onto several concurrently running engines.
//!
//! The crate is layered bottom-up:
//!
//! - [`DataRange`]: half-open linear interval with splitting helpers
//! - [`CyclicDataRange`]: periodic block pattern with exact overlap tests
//! - [`SegmentsSpace`]: gap-free partition of an address space into typed
//!   segments, with pluggable split and merge policies
//! - [`Overlap`]: turns a stream of descriptor footprints into per-engine
//!   wait lists ([`DependencyCtx`])
//!
//! ## Example
//!
//! ```rust
//! use hazard_core::{DataRange, Overlap, OverlapDescriptor, OverlapRoi};
//!
//! let mut overlap = Overlap::<2>::new();
//!
//! let producer = OverlapDescriptor::new(0, 1)
//!     .output(OverlapRoi::linear(vec![DataRange::new(0, 100)]));
//! overlap.add_descriptor(&producer, None);
//!
//! let consumer = OverlapDescriptor::new(1, 1)
//!     .input(OverlapRoi::linear(vec![DataRange::new(50, 60)]));
//! let deps = overlap.add_descriptor(&consumer, None);
//! assert_eq!(deps.get(0), Some(1));
//! ```
//!
//! ## Errors
//!
//! Only [`CyclicDataRange::new`] validates its input and returns
//! [`RangeError`]. Everything else expects well-formed input from the
//! compiler and panics on violated preconditions (out-of-range engine ids,
//! inverted ranges, addresses beyond an address space).

pub mod config;
pub mod cyclic_range;
pub mod data_range;
pub mod error;
pub mod numeric;
pub mod overlap;
pub mod segments_space;

pub use config::OverlapConfig;
pub use cyclic_range::{CyclicDataRange, MAX_CYCLIC_STRIDE, MIN_RANGES_FOR_CYCLIC};
pub use data_range::DataRange;
pub use error::{RangeError, Result};
pub use numeric::mod_n;
pub use overlap::{
    AccessType, CyclicRangeAccess, DependencyCtx, EngineDependency, Hazard, Overlap, OverlapDescriptor,
    OverlapRoi, OverlapSubRoi, QueuedSignals, SyncInfo, MAX_CYCLIC_RECORDS,
};
pub use segments_space::{EqMerge, NoSplit, SegRecord, SegmentMerge, SegmentSplit, SegmentsSpace};
