//! Periodic access patterns
//!
//! A [`CyclicDataRange`] stands for the infinite set of blocks
//! `[start + k*stride, start + k*stride + size)` for every integer `k`. The
//! finite extent of an actual access is carried next to it as a linear
//! bound, so every query here either asks about the whole period or about an
//! explicit window.
//!
//! Strided tensor slices issue thousands of equally spaced linear ranges;
//! collapsing them into one cyclic range keeps hazard tracking from
//! fragmenting the segment space into one segment per row.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data_range::DataRange;
use crate::error::{RangeError, Result};
use crate::numeric::{lcm_u64, mod_n};

/// Minimum number of equally spaced ranges worth one cyclic range
pub const MIN_RANGES_FOR_CYCLIC: usize = 8;

/// Largest stride [`CyclicDataRange::compress_linear_ranges`] emits by default
pub const MAX_CYCLIC_STRIDE: u32 = 8 * 1024 * 1024;

/// Periodic block pattern, normalized modulo its stride.
///
/// `start` and `end` lie in `[0, stride)`. `size` is the block length and is
/// kept explicitly because `start == end` is ambiguous between an empty and
/// a full pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "StoredCyclicRange")]
pub struct CyclicDataRange {
    start: i32,
    end: i32,
    stride: u32,
    size: i32,
}

impl CyclicDataRange {
    /// Pattern repeating the block `[start, end)` every `stride` bytes.
    ///
    /// `start` may be any address; it is reduced modulo `stride`.
    pub fn new(start: u64, end: u64, stride: u32) -> Result<Self> {
        if stride == 0 {
            return Err(RangeError::ZeroStride);
        }
        if stride > i32::MAX as u32 {
            return Err(RangeError::StrideTooLarge {
                stride: u64::from(stride),
                max: i32::MAX as u32,
            });
        }
        if end < start {
            return Err(RangeError::InvertedBounds {
                start: i128::from(start),
                end: i128::from(end),
            });
        }
        let size = end - start;
        if size > u64::from(stride) {
            return Err(RangeError::SizeExceedsStride { size, stride });
        }

        let first = (start % u64::from(stride)) as i32;
        let size = size as i32;
        Ok(Self {
            start: first,
            end: mod_n(i64::from(first) + i64::from(size), i64::from(stride)) as i32,
            stride,
            size,
        })
    }

    /// Pattern containing every address.
    pub const fn full() -> Self {
        Self {
            start: 0,
            end: 0,
            stride: 1,
            size: 1,
        }
    }

    #[inline]
    pub fn start(&self) -> u32 {
        self.start as u32
    }

    #[inline]
    pub fn end(&self) -> u32 {
        self.end as u32
    }

    #[inline]
    pub fn stride(&self) -> u32 {
        self.stride
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.size as u32
    }

    /// True when the pattern contains no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// True when the blocks leave no gaps.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.size as u32 == self.stride
    }

    #[inline]
    fn period(&self) -> i64 {
        i64::from(self.stride)
    }

    #[inline]
    fn len(&self) -> i64 {
        i64::from(self.size)
    }

    /// True when address `x` falls inside one of the blocks.
    pub fn point_in_range(&self, x: u64) -> bool {
        mod_n(to_i64(x) - i64::from(self.start), self.period()) < self.len()
    }

    /// Move the pattern by `offset` bytes.
    pub fn shift(&mut self, offset: i64) {
        let start = mod_n(i64::from(self.start) + offset, self.period());
        self.start = start as i32;
        self.end = mod_n(start + self.len(), self.period()) as i32;
    }

    /// Pattern with the same stride made of the gaps between the blocks.
    pub fn complement(&self) -> Self {
        Self {
            start: self.end,
            end: self.start,
            stride: self.stride,
            size: self.stride as i32 - self.size,
        }
    }

    /// True when the two infinite patterns share a byte.
    ///
    /// Equal strides are decided in constant time. Different strides are
    /// swept over one period of their least common multiple.
    pub fn is_overlap(&self, other: &Self) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        if self.is_full() || other.is_full() {
            return true;
        }
        if self.stride == other.stride {
            let p = self.period();
            return mod_n(i64::from(other.start) - i64::from(self.start), p) < self.len()
                || mod_n(i64::from(self.start) - i64::from(other.start), p) < other.len();
        }
        let lcm = lcm_u64(u64::from(self.stride), u64::from(other.stride));
        sweep(self, other, 0, to_i64(lcm))
    }

    /// True when the patterns share a byte inside `[start, end)`.
    pub fn is_overlap_in(&self, other: &Self, start: u64, end: u64) -> bool {
        if end <= start || self.is_empty() || other.is_empty() {
            return false;
        }
        if self.is_full() {
            return other.is_overlap_range(start, end);
        }
        if other.is_full() {
            return self.is_overlap_range(start, end);
        }
        let lcm = lcm_u64(u64::from(self.stride), u64::from(other.stride));
        if end - start >= lcm {
            return self.is_overlap(other);
        }
        sweep(self, other, to_i64(start), to_i64(end))
    }

    /// True when some block intersects the linear range `[start, end)`.
    pub fn is_overlap_range(&self, start: u64, end: u64) -> bool {
        if end <= start || self.is_empty() {
            return false;
        }
        if end - start >= u64::from(self.stride) {
            return true;
        }
        let (ws, we) = (to_i64(start), to_i64(end));
        first_block_ending_after(self, ws) < we
    }

    /// True when every byte of `[start, end)` lies inside a block.
    pub fn covers_range(&self, start: u64, end: u64) -> bool {
        !self.complement().is_overlap_range(start, end)
    }

    /// True when every byte of `other` inside `[start, end)` also belongs to
    /// this pattern.
    pub fn covers_in(&self, other: &Self, start: u64, end: u64) -> bool {
        !other.is_overlap_in(&self.complement(), start, end)
    }

    /// The blocks clipped to `[start, end)`, in address order.
    pub fn to_linear_ranges(&self, start: u64, end: u64) -> Vec<DataRange<u64>> {
        let mut ranges = Vec::new();
        if end <= start || self.is_empty() {
            return ranges;
        }
        let (ws, we) = (to_i64(start), to_i64(end));
        let mut block = first_block_ending_after(self, ws);
        while block < we {
            let lo = block.max(ws);
            let hi = (block + self.len()).min(we);
            ranges.push(DataRange::new(lo as u64, hi as u64));
            block += self.period();
        }
        ranges
    }

    /// Try to absorb a list of linear ranges into cyclic ranges.
    ///
    /// Runs of at least `min_ranges` ranges with equal size and equal spacing
    /// (spacing at most `max_stride`) become one cyclic range each, paired
    /// with the linear bound of the run. Either every range is absorbed or
    /// `None` is returned. Ranges longer than their spacing are clamped to
    /// the stride.
    pub fn compress_linear_ranges(
        ranges: &[DataRange<u64>],
        min_ranges: usize,
        max_stride: u32,
    ) -> Option<(Vec<DataRange<u64>>, Vec<Self>)> {
        if ranges.is_empty() || ranges.len() < min_ranges {
            return None;
        }
        let mut sorted = ranges.to_vec();
        sorted.sort();

        let mut bounds = Vec::new();
        let mut cyclic = Vec::new();
        let mut i = 0;
        while i < sorted.len() {
            let first = sorted[i];
            let stride = sorted.get(i + 1).map_or(0, |next| next.start() - first.start());
            let mut run = 1;
            if stride > 0 && stride <= u64::from(max_stride) {
                while let Some(next) = sorted.get(i + run) {
                    if next.size() != first.size() || next.start() - first.start() != run as u64 * stride {
                        break;
                    }
                    run += 1;
                }
            }

            if run < min_ranges {
                tracing::debug!(at = i, run, "linear ranges do not form cyclic runs");
                return None;
            }

            let mut size = first.size();
            if size > stride {
                tracing::warn!(%first, stride, "overlapping linear ranges, clamping cyclic size to stride");
                size = stride;
            }
            bounds.push(DataRange::new(first.start(), sorted[i + run - 1].end()));
            cyclic.push(Self::new(first.start(), first.start() + size, u32::try_from(stride).ok()?).ok()?);
            i += run;
        }
        Some((bounds, cyclic))
    }
}

/// Field layout of a serialized [`CyclicDataRange`], checked before use.
#[derive(Deserialize)]
struct StoredCyclicRange {
    start: u32,
    end: u32,
    stride: u32,
    size: u32,
}

impl TryFrom<StoredCyclicRange> for CyclicDataRange {
    type Error = RangeError;

    fn try_from(stored: StoredCyclicRange) -> Result<Self> {
        let StoredCyclicRange { start, end, stride, size } = stored;
        let range = Self::new(u64::from(start), u64::from(start) + u64::from(size), stride)?;
        if start >= stride || range.end() != end {
            return Err(RangeError::NotNormalized { start, end, stride, size });
        }
        Ok(range)
    }
}

impl fmt::Display for CyclicDataRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}) mod {}", self.start, self.start + self.size, self.stride)
    }
}

#[inline]
fn to_i64(address: u64) -> i64 {
    i64::try_from(address).unwrap_or_else(|_| panic!("address {address:#x} out of cyclic range arithmetic"))
}

/// Start of the first block whose end lies past `after`.
#[inline]
fn first_block_ending_after(range: &CyclicDataRange, after: i64) -> i64 {
    let start = i64::from(range.start);
    let k = (after - start - range.len()).div_euclid(range.period()) + 1;
    start + k * range.period()
}

/// Walk the blocks of both patterns through `[ws, we)` in address order,
/// always advancing the block that ends first.
fn sweep(a: &CyclicDataRange, b: &CyclicDataRange, ws: i64, we: i64) -> bool {
    let mut a_block = first_block_ending_after(a, ws);
    let mut b_block = first_block_ending_after(b, ws);
    while a_block < we && b_block < we {
        let a_end = a_block + a.len();
        let b_end = b_block + b.len();
        let lo = a_block.max(b_block).max(ws);
        let hi = a_end.min(b_end).min(we);
        if lo < hi {
            return true;
        }
        if a_end <= b_end {
            a_block += a.period();
        } else {
            b_block += b.period();
        }
    }
    false
}
