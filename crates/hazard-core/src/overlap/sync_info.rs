//! Synchronization state attached to every tracked segment
//!
//! A segment's history is kept in layers. The linear layer holds the last
//! writer, the readers since then and the running reduction. The cyclic
//! layer is an ordered list of periodic accesses that touched only part of
//! the segment. Every cyclic record is newer than the linear layer: once the
//! list is non-empty, whole-segment reads and reductions are appended to it
//! instead of folding into the linear layer, and a whole-segment write
//! resets everything.
//!
//! The list holds at most [`MAX_CYCLIC_RECORDS`] records. Older ones are
//! folded into a collapsed set that sits between the two layers and that
//! every later access waits for, whatever its type.
//!
//! Records name both the dependency slot whose counter raised the signal and
//! the queue (engine) that executed the access, so that an access can skip
//! hazards on work its own queue already ordered before it.

use serde::{Deserialize, Serialize};

use super::dependency::{Hazard, QueuedSignals};
use crate::cyclic_range::CyclicDataRange;
use crate::data_range::DataRange;

/// Longest cyclic history kept per segment before older records collapse.
pub const MAX_CYCLIC_RECORDS: usize = 64;

/// How a descriptor touches memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessType {
    Read,
    Write,
    /// Read-modify-write accumulation. Reductions into the same memory may
    /// run concurrently with each other.
    Reduction,
}

impl AccessType {
    /// Whether an access of type `self` must be ordered against `later`.
    #[inline]
    pub fn conflicts_with(self, later: AccessType) -> bool {
        !matches!(
            (self, later),
            (AccessType::Read, AccessType::Read) | (AccessType::Reduction, AccessType::Reduction)
        )
    }
}

/// A periodic access recorded on a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CyclicRangeAccess {
    /// Dependency slot the signal was raised on.
    pub engine: u32,
    /// Engine that executed the access.
    pub queue: u32,
    pub signal: u32,
    pub range: CyclicDataRange,
    pub access_type: AccessType,
}

impl CyclicRangeAccess {
    #[inline]
    fn hazard(&self) -> Hazard {
        Hazard {
            slot: self.engine,
            signal: self.signal,
            queue: Some(self.queue),
        }
    }
}

/// Who touched a segment and which signals later accesses have to wait for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncInfo<const N: usize> {
    pub producer_valid: bool,
    pub producer_engine: u32,
    pub producer_queue: u32,
    pub producer_signal: u32,
    pub is_reduction: bool,
    pub reduction_dependency: QueuedSignals<N>,
    pub consumers_dependency: QueuedSignals<N>,
    /// Oldest first.
    pub cyclic_dependency: Vec<CyclicRangeAccess>,
    /// Records evicted from `cyclic_dependency`.
    pub collapsed_dependency: QueuedSignals<N>,
}

impl<const N: usize> SyncInfo<N> {
    /// Report the hazards of a whole-segment access to `sink`.
    pub(crate) fn linear_hazards(
        &self,
        window: &DataRange<u64>,
        ty: AccessType,
        sink: &mut impl FnMut(Hazard),
    ) {
        let (start, end) = (window.start(), window.end());
        let mut covered = false;
        for access in self.cyclic_dependency.iter().rev() {
            if !access.range.is_overlap_range(start, end) {
                continue;
            }
            if access.access_type.conflicts_with(ty) {
                sink(access.hazard());
            }
            if access.access_type == AccessType::Write && access.range.covers_range(start, end) {
                covered = true;
                break;
            }
        }
        if !covered {
            self.older_hazards(ty, sink);
        }
    }

    /// Report the hazards of the part of `query` inside `window`.
    pub(crate) fn cyclic_hazards(
        &self,
        query: &CyclicDataRange,
        window: &DataRange<u64>,
        ty: AccessType,
        sink: &mut impl FnMut(Hazard),
    ) {
        let (start, end) = (window.start(), window.end());
        let mut covered = false;
        for access in self.cyclic_dependency.iter().rev() {
            if !access.range.is_overlap_in(query, start, end) {
                continue;
            }
            if access.access_type.conflicts_with(ty) {
                sink(access.hazard());
            }
            if access.access_type == AccessType::Write && access.range.covers_in(query, start, end) {
                covered = true;
                break;
            }
        }
        if !covered {
            self.older_hazards(ty, sink);
        }
    }

    /// Hazards below the cyclic list: the collapsed set, then the linear
    /// layer.
    fn older_hazards(&self, ty: AccessType, sink: &mut impl FnMut(Hazard)) {
        self.collapsed_dependency.hazards().for_each(&mut *sink);
        if self.producer_valid {
            sink(Hazard {
                slot: self.producer_engine,
                signal: self.producer_signal,
                queue: Some(self.producer_queue),
            });
        }
        if self.is_reduction && ty != AccessType::Reduction {
            self.reduction_dependency.hazards().for_each(&mut *sink);
        }
        if ty != AccessType::Read {
            self.consumers_dependency.hazards().for_each(&mut *sink);
        }
    }

    /// Record a whole-segment access of `queue` signalling on slot `engine`.
    pub(crate) fn apply_linear(&mut self, engine: u32, queue: u32, signal: u32, ty: AccessType) {
        match ty {
            AccessType::Write => {
                *self = Self {
                    producer_valid: true,
                    producer_engine: engine,
                    producer_queue: queue,
                    producer_signal: signal,
                    ..Self::default()
                };
            }
            _ if !self.cyclic_dependency.is_empty() || !self.collapsed_dependency.is_empty() => {
                self.push_record(CyclicRangeAccess {
                    engine,
                    queue,
                    signal,
                    range: CyclicDataRange::full(),
                    access_type: ty,
                });
            }
            AccessType::Read => self.consumers_dependency.add(engine as usize, signal, queue),
            AccessType::Reduction => {
                if !self.is_reduction {
                    self.is_reduction = true;
                    self.reduction_dependency.clear();
                }
                self.reduction_dependency.add(engine as usize, signal, queue);
            }
        }
    }

    /// Record a periodic access restricted to `window`.
    ///
    /// A write whose blocks cover the whole window is a plain segment write.
    /// Otherwise older records that the new one hides inside the window are
    /// dropped: anything under a write, and records of the same type from the
    /// same queue and slot.
    pub(crate) fn apply_cyclic(&mut self, access: CyclicRangeAccess, window: &DataRange<u64>) {
        let (start, end) = (window.start(), window.end());
        if access.access_type == AccessType::Write && access.range.covers_range(start, end) {
            self.apply_linear(access.engine, access.queue, access.signal, AccessType::Write);
            return;
        }
        self.cyclic_dependency.retain(|older| {
            let hidden = access.access_type == AccessType::Write
                || (older.engine == access.engine
                    && older.queue == access.queue
                    && older.access_type == access.access_type);
            !(hidden && access.range.covers_in(&older.range, start, end))
        });
        self.push_record(access);
    }

    fn push_record(&mut self, access: CyclicRangeAccess) {
        self.cyclic_dependency.push(access);
        let overflow = self.cyclic_dependency.len().saturating_sub(MAX_CYCLIC_RECORDS);
        for old in self.cyclic_dependency.drain(..overflow) {
            self.collapsed_dependency.add(old.engine as usize, old.signal, old.queue);
        }
    }
}
