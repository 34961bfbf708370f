//! Gap-free partition of an address space into typed segments
//!
//! The space always covers `[0, limit)` exactly. Untouched memory is held by
//! *invalid* segments, so every address has exactly one owning segment and
//! any query range can be cut out of the partition before it is read or
//! written. Cutting a segment goes through the [`SegmentSplit`] policy and
//! defragmentation through the [`SegmentMerge`] policy, which lets payloads
//! that depend on their position (offset tables, partial views) stay
//! consistent.

use std::collections::BTreeMap;
use std::marker::PhantomData;

use hazard_tracing::perf_span;

use crate::data_range::DataRange;

/// Adjusts payloads when a segment is cut in two.
pub trait SegmentSplit<Seg> {
    /// `left` and `right` both start as copies of the original payload.
    /// `offset` is the cut position relative to the segment's base.
    fn split(left: &mut Seg, right: &mut Seg, offset: u64);
}

/// Decides whether two adjacent segments may become one.
pub trait SegmentMerge<Seg> {
    /// Fold `right` (of `right_size` bytes) into `left`. Returns `false`, with
    /// `left` untouched, when the payloads must stay apart.
    fn merge(left: &mut Seg, right: &Seg, right_size: u64) -> bool;
}

/// Split policy for payloads that do not depend on their position.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSplit;

impl<Seg> SegmentSplit<Seg> for NoSplit {
    #[inline]
    fn split(_left: &mut Seg, _right: &mut Seg, _offset: u64) {}
}

/// Merge policy that coalesces equal payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct EqMerge;

impl<Seg: PartialEq> SegmentMerge<Seg> for EqMerge {
    #[inline]
    fn merge(left: &mut Seg, right: &Seg, _right_size: u64) -> bool {
        left == right
    }
}

/// One segment of the partition.
#[derive(Debug, Clone, PartialEq)]
pub struct SegRecord<Seg> {
    size: u64,
    /// False while the bytes were never written (or were erased).
    pub valid: bool,
    pub payload: Seg,
}

impl<Seg> SegRecord<Seg> {
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Ordered, contiguous partition of `[0, limit)`.
#[derive(Debug, Clone)]
pub struct SegmentsSpace<Seg, S = NoSplit, M = EqMerge> {
    segments: BTreeMap<u64, SegRecord<Seg>>,
    limit: u64,
    _policies: PhantomData<fn() -> (S, M)>,
}

impl<Seg, S, M> Default for SegmentsSpace<Seg, S, M>
where
    Seg: Clone + Default,
    S: SegmentSplit<Seg>,
    M: SegmentMerge<Seg>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<Seg, S, M> SegmentsSpace<Seg, S, M>
where
    Seg: Clone + Default,
    S: SegmentSplit<Seg>,
    M: SegmentMerge<Seg>,
{
    /// Space covering every `u64` address below `u64::MAX`.
    pub fn new() -> Self {
        Self::with_limit(u64::MAX)
    }

    /// Space covering `[0, limit)`.
    ///
    /// # Panics
    ///
    /// Panics if `limit` is zero.
    pub fn with_limit(limit: u64) -> Self {
        assert!(limit > 0, "segment space limit must be positive");
        let mut segments = BTreeMap::new();
        segments.insert(
            0,
            SegRecord {
                size: limit,
                valid: false,
                payload: Seg::default(),
            },
        );
        Self {
            segments,
            limit,
            _policies: PhantomData,
        }
    }

    #[inline]
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Number of segments, invalid ones included.
    #[inline]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// A space is never empty: the sentinel covers untouched memory.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Every segment in address order.
    pub fn iter(&self) -> impl Iterator<Item = (DataRange<u64>, &SegRecord<Seg>)> + '_ {
        self.segments
            .iter()
            .map(|(&base, record)| (DataRange::with_size(base, record.size), record))
    }

    /// Make `pos` a segment boundary.
    fn ensure_boundary(&mut self, pos: u64) {
        if pos >= self.limit {
            return;
        }
        let Some((&base, record)) = self.segments.range_mut(..=pos).next_back() else {
            unreachable!("segment space always starts at address zero");
        };
        if base == pos {
            return;
        }

        let offset = pos - base;
        let mut right = SegRecord {
            size: record.size - offset,
            valid: record.valid,
            payload: record.payload.clone(),
        };
        record.size = offset;
        if record.valid {
            S::split(&mut record.payload, &mut right.payload, offset);
        }
        self.segments.insert(pos, right);
    }

    /// Cut the partition at `base` and `base + size` and return the end of
    /// the covered key range.
    fn find_covered_segments(&mut self, base: u64, size: u64) -> u64 {
        let end = self.checked_end(base, size);
        if size > 0 {
            self.ensure_boundary(base);
            self.ensure_boundary(end);
        }
        end
    }

    fn remove_covered(&mut self, base: u64, end: u64) {
        let keys: Vec<u64> = self.segments.range(base..end).map(|(&key, _)| key).collect();
        for key in keys {
            self.segments.remove(&key);
        }
    }

    /// Store `payload` over `[base, base + size)`.
    ///
    /// With `overwrite` the range becomes a single segment. Without it only
    /// the invalid parts are filled; every contiguous invalid run becomes one
    /// segment and valid segments keep their payload.
    pub fn add_segment(&mut self, base: u64, size: u64, payload: Seg, overwrite: bool) {
        let end = self.find_covered_segments(base, size);
        if size == 0 {
            return;
        }

        if overwrite {
            self.remove_covered(base, end);
            self.segments.insert(
                base,
                SegRecord {
                    size,
                    valid: true,
                    payload,
                },
            );
            return;
        }

        let mut runs: Vec<(u64, u64)> = Vec::new();
        for (&key, record) in self.segments.range(base..end) {
            if record.valid {
                continue;
            }
            match runs.last_mut() {
                Some((run_base, run_size)) if *run_base + *run_size == key => *run_size += record.size,
                _ => runs.push((key, record.size)),
            }
        }
        for (run_base, run_size) in runs {
            self.remove_covered(run_base, run_base + run_size);
            self.segments.insert(
                run_base,
                SegRecord {
                    size: run_size,
                    valid: true,
                    payload: payload.clone(),
                },
            );
        }
    }

    /// Payloads of the valid segments in `[base, base + size)`, in address
    /// order, and whether the whole range was valid.
    pub fn get_segments(&mut self, base: u64, size: u64) -> (Vec<&Seg>, bool) {
        let end = self.find_covered_segments(base, size);
        let mut all_valid = true;
        let mut payloads = Vec::new();
        for record in self.segments.range(base..end).map(|(_, record)| record) {
            if record.valid {
                payloads.push(&record.payload);
            } else {
                all_valid = false;
            }
        }
        (payloads, all_valid)
    }

    /// Like [`SegmentsSpace::get_segments`], with the extent of each payload.
    pub fn get_segments_with_ranges(&mut self, base: u64, size: u64) -> (Vec<(DataRange<u64>, &Seg)>, bool) {
        let end = self.find_covered_segments(base, size);
        let mut all_valid = true;
        let mut payloads = Vec::new();
        for (&key, record) in self.segments.range(base..end) {
            if record.valid {
                payloads.push((DataRange::with_size(key, record.size), &record.payload));
            } else {
                all_valid = false;
            }
        }
        (payloads, all_valid)
    }

    /// Every segment of `[base, base + size)`, invalid ones included.
    pub fn get_covered_segments(
        &mut self,
        base: u64,
        size: u64,
    ) -> impl Iterator<Item = (DataRange<u64>, &SegRecord<Seg>)> + '_ {
        let end = self.find_covered_segments(base, size);
        self.segments
            .range(base..end)
            .map(|(&key, record)| (DataRange::with_size(key, record.size), record))
    }

    /// Mutable variant of [`SegmentsSpace::get_covered_segments`]. Only
    /// validity and payload can change; extents are fixed.
    pub fn get_covered_segments_mut(
        &mut self,
        base: u64,
        size: u64,
    ) -> impl Iterator<Item = (DataRange<u64>, &mut SegRecord<Seg>)> + '_ {
        let end = self.find_covered_segments(base, size);
        self.segments
            .range_mut(base..end)
            .map(|(&key, record)| (DataRange::with_size(key, record.size), record))
    }

    /// Coalesce neighbours with the same validity whose payloads the merge
    /// policy accepts. Invalid neighbours always coalesce.
    pub fn merge_segments(&mut self) {
        let _span = perf_span!("merge_segments", segments = self.segments.len());
        let before = self.segments.len();

        let mut merged: BTreeMap<u64, SegRecord<Seg>> = BTreeMap::new();
        let mut current: Option<(u64, SegRecord<Seg>)> = None;
        for (key, record) in std::mem::take(&mut self.segments) {
            current = match current {
                Some((base, mut acc)) => {
                    let joins = acc.valid == record.valid
                        && (!record.valid || M::merge(&mut acc.payload, &record.payload, record.size));
                    if joins {
                        acc.size += record.size;
                        Some((base, acc))
                    } else {
                        merged.insert(base, acc);
                        Some((key, record))
                    }
                }
                None => Some((key, record)),
            };
        }
        if let Some((base, acc)) = current {
            merged.insert(base, acc);
        }
        self.segments = merged;

        tracing::debug!(before, after = self.segments.len(), "merged segments");
    }

    fn overlapping(&self, base: u64, end: u64) -> impl Iterator<Item = &SegRecord<Seg>> + '_ {
        let first = self.segments.range(..=base).next_back().map_or(0, |(&key, _)| key);
        self.segments.range(first..end).map(|(_, record)| record)
    }

    fn checked_end(&self, base: u64, size: u64) -> u64 {
        base.checked_add(size).filter(|&end| end <= self.limit).unwrap_or_else(|| {
            panic!(
                "range at {base:#x} of {size:#x} bytes exceeds segment space limit {:#x}",
                self.limit
            )
        })
    }

    /// True when every byte of `[base, base + size)` is valid.
    pub fn is_segment_covered(&self, base: u64, size: u64) -> bool {
        let end = self.checked_end(base, size);
        size == 0 || self.overlapping(base, end).all(|record| record.valid)
    }

    /// True when no byte of `[base, base + size)` is valid.
    pub fn is_segment_invalid(&self, base: u64, size: u64) -> bool {
        let end = self.checked_end(base, size);
        size == 0 || self.overlapping(base, end).all(|record| !record.valid)
    }

    /// Forget `[base, base + size)`; the range becomes one invalid segment.
    pub fn erase(&mut self, base: u64, size: u64) {
        let end = self.find_covered_segments(base, size);
        if size == 0 {
            return;
        }
        self.remove_covered(base, end);
        self.segments.insert(
            base,
            SegRecord {
                size,
                valid: false,
                payload: Seg::default(),
            },
        );
    }
}
