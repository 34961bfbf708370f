//! Half-open linear intervals over primitive integers
//!
//! [`DataRange`] is the unit every memory footprint is described in: tensor
//! ROIs are lists of byte ranges, segment extents are byte ranges, and the
//! bounds of cyclic patterns are byte ranges.

use std::fmt;

use num_traits::PrimInt;
use serde::{Deserialize, Serialize};

use crate::error::{RangeError, Result};
use crate::numeric::round_up;

/// Half-open interval `[start, end)`.
///
/// Ordering is lexicographic on `(start, end)`, which is the order ROI
/// calculators emit ranges in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(
    try_from = "StoredDataRange<T>",
    bound(deserialize = "T: PrimInt + Deserialize<'de>")
)]
pub struct DataRange<T> {
    start: T,
    end: T,
}

impl<T: PrimInt> DataRange<T> {
    /// Create `[start, end)`.
    ///
    /// # Panics
    ///
    /// Panics if `start > end`.
    pub fn new(start: T, end: T) -> Self {
        assert!(start <= end, "inverted data range");
        Self { start, end }
    }

    /// Create `[start, end)`, rejecting inverted bounds.
    pub fn try_new(start: T, end: T) -> Result<Self> {
        if start > end {
            return Err(RangeError::InvertedBounds {
                start: start.to_i128().unwrap_or(i128::MAX),
                end: end.to_i128().unwrap_or(i128::MAX),
            });
        }
        Ok(Self { start, end })
    }

    /// Create `[start, start + size)`.
    pub fn with_size(start: T, size: T) -> Self {
        Self::new(start, start + size)
    }

    #[inline]
    pub fn start(&self) -> T {
        self.start
    }

    #[inline]
    pub fn end(&self) -> T {
        self.end
    }

    #[inline]
    pub fn size(&self) -> T {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True when the ranges share at least one element. Touching ranges do
    /// not overlap.
    #[inline]
    pub fn is_overlap(&self, other: &Self) -> bool {
        self.start < other.end && self.end > other.start
    }

    /// True when `point` lies inside the range.
    #[inline]
    pub fn contains(&self, point: T) -> bool {
        self.start <= point && point < self.end
    }

    /// True when `other` lies entirely inside this range.
    #[inline]
    pub fn contains_range(&self, other: &Self) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Grow this range to cover `other` if the two overlap or touch.
    ///
    /// Returns `false` and leaves `self` unchanged when there is a gap
    /// between them.
    pub fn merge(&mut self, other: &Self) -> bool {
        if self.is_overlap(other) || self.start == other.end || self.end == other.start {
            self.start = self.start.min(other.start);
            self.end = self.end.max(other.end);
            true
        } else {
            false
        }
    }

    /// Smallest range covering both, gap or not.
    pub fn join(&self, other: &Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Common part of both ranges, if any.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then_some(Self { start, end })
    }

    /// Same range moved up by `offset`.
    pub fn shifted(&self, offset: T) -> Self {
        Self {
            start: self.start + offset,
            end: self.end + offset,
        }
    }

    /// Split at `position`.
    ///
    /// Returns `[self]` when `position` is one of the bounds.
    ///
    /// # Panics
    ///
    /// Panics if `position` lies outside `[start, end]`.
    pub fn split_at(&self, position: T) -> Vec<Self> {
        assert!(
            self.start <= position && position <= self.end,
            "split position outside of range"
        );
        if position == self.start || position == self.end {
            vec![*self]
        } else {
            vec![
                Self {
                    start: self.start,
                    end: position,
                },
                Self {
                    start: position,
                    end: self.end,
                },
            ]
        }
    }

    /// Cut into consecutive `chunk_size` pieces; the last piece holds the
    /// remainder.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size` is zero.
    pub fn split_to_chunks(&self, chunk_size: T) -> Vec<Self> {
        assert!(chunk_size > T::zero(), "chunk size must be positive");
        let mut chunks = Vec::new();
        let mut pos = self.start;
        while pos < self.end {
            let size = chunk_size.min(self.end - pos);
            chunks.push(Self {
                start: pos,
                end: pos + size,
            });
            pos = pos + size;
        }
        chunks
    }

    /// Partition into at most `group_count` consecutive pieces of near-equal
    /// size, each a multiple of `chunk_size` except possibly the last.
    ///
    /// Every step takes the average of what is left over the groups still to
    /// fill, rounded up to the chunk size and capped to what remains. Fewer
    /// pieces are returned when the range runs out first; no piece is empty.
    ///
    /// # Panics
    ///
    /// Panics if `group_count` or `chunk_size` is zero.
    pub fn split_evenly_as_best_as_possible(&self, group_count: usize, chunk_size: T) -> Vec<Self> {
        assert!(group_count > 0, "group count must be positive");
        assert!(chunk_size > T::zero(), "chunk size must be positive");

        let mut pieces = Vec::with_capacity(group_count);
        let mut pos = self.start;
        let mut groups_left = group_count;
        while groups_left > 0 && pos < self.end {
            let left = self.end - pos;
            let average = match T::from(groups_left) {
                Some(groups) => (left / groups).max(T::one()),
                // More groups than the type can count: each gets the minimum.
                None => T::one(),
            };
            let size = round_up(average, chunk_size).min(left);
            pieces.push(Self {
                start: pos,
                end: pos + size,
            });
            pos = pos + size;
            groups_left -= 1;
        }
        pieces
    }

    /// Like [`DataRange::split_evenly_as_best_as_possible`], with the
    /// `preferred_max` largest pieces moved to the front (largest first, ties
    /// in address order). The remaining pieces keep address order.
    pub fn split_evenly_with_preferred_max(
        &self,
        group_count: usize,
        chunk_size: T,
        preferred_max: usize,
    ) -> Vec<Self> {
        let pieces = self.split_evenly_as_best_as_possible(group_count, chunk_size);
        let mut by_size: Vec<usize> = (0..pieces.len()).collect();
        // Stable sort keeps address order among equal sizes.
        by_size.sort_by(|&a, &b| pieces[b].size().cmp(&pieces[a].size()));

        let mut front = vec![false; pieces.len()];
        let mut ordered = Vec::with_capacity(pieces.len());
        for &idx in by_size.iter().take(preferred_max) {
            front[idx] = true;
            ordered.push(pieces[idx]);
        }
        ordered.extend(pieces.iter().enumerate().filter(|(idx, _)| !front[*idx]).map(|(_, p)| *p));
        ordered
    }
}

#[derive(Deserialize)]
struct StoredDataRange<T> {
    start: T,
    end: T,
}

impl<T: PrimInt> TryFrom<StoredDataRange<T>> for DataRange<T> {
    type Error = RangeError;

    fn try_from(stored: StoredDataRange<T>) -> Result<Self> {
        Self::try_new(stored.start, stored.end)
    }
}

impl<T: fmt::Display> fmt::Display for DataRange<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}
