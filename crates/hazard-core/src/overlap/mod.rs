//! Multi-engine hazard tracking
//!
//! [`Overlap`] consumes descriptors in submission order and answers, for
//! each one, which signals of which engines it has to wait for before it may
//! touch memory. Every byte ever accessed is owned by a segment of one of
//! two [`SegmentsSpace`]s (SRAM and DRAM) whose [`SyncInfo`] remembers the
//! accesses that later ones must be ordered against:
//!
//! - reads wait for the last writer and any running reduction (RAW)
//! - writes wait for the last writer, the running reduction and every reader
//!   since the last write (WAW, WAR)
//! - reductions wait for the last writer and the readers, but not for each
//!   other
//!
//! Periodic accesses are recorded as [`CyclicRangeAccess`] entries on the
//! segments their bound covers, so a strided access costs one record per
//! segment instead of one segment per row.

mod dependency;
mod descriptor;
mod sync_info;

pub use dependency::{DependencyCtx, EngineDependency, Hazard, QueuedSignals};
pub use descriptor::{OverlapDescriptor, OverlapRoi, OverlapSubRoi};
pub use sync_info::{AccessType, CyclicRangeAccess, SyncInfo, MAX_CYCLIC_RECORDS};

use hazard_tracing::perf_span;

use crate::config::OverlapConfig;
use crate::cyclic_range::CyclicDataRange;
use crate::data_range::DataRange;
use crate::segments_space::SegmentsSpace;

const SRAM: usize = 0;
const DRAM: usize = 1;

/// Hazard tracker for `N` engines.
#[derive(Debug, Clone)]
pub struct Overlap<const N: usize> {
    spaces: [SegmentsSpace<SyncInfo<N>>; 2],
    signal_counters: [u32; N],
    /// `signals_ctx[engine][signal - 1]`
    signals_ctx: Vec<Vec<DependencyCtx<N>>>,
    /// Dependencies of non-signalling descriptors, per slot, waiting for the
    /// slot's next signal.
    pending_ctx: Vec<DependencyCtx<N>>,
    descriptors_submitted: u64,
    config: OverlapConfig,
}

impl<const N: usize> Default for Overlap<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Overlap<N> {
    pub fn new() -> Self {
        Self::with_config(OverlapConfig::default())
    }

    pub fn with_config(config: OverlapConfig) -> Self {
        assert!(N > 0, "hazard tracking needs at least one engine");
        Self {
            spaces: [
                SegmentsSpace::with_limit(config.sram_limit),
                SegmentsSpace::with_limit(config.dram_limit),
            ],
            signal_counters: [0; N],
            signals_ctx: vec![Vec::new(); N],
            pending_ctx: vec![DependencyCtx::default(); N],
            descriptors_submitted: 0,
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &OverlapConfig {
        &self.config
    }

    /// Signals raised so far on `engine`'s counter.
    pub fn signal_count(&self, engine: usize) -> u32 {
        self.signal_counters[engine]
    }

    pub fn descriptors_submitted(&self) -> u64 {
        self.descriptors_submitted
    }

    /// Segments currently tracked in both spaces.
    pub fn segment_count(&self) -> usize {
        self.spaces.iter().map(SegmentsSpace::len).sum()
    }

    /// Dependencies recorded for `signal` of `engine`: the waits of the
    /// descriptor that raises it, plus those of the non-signalling
    /// descriptors folded into it.
    pub fn get_signal_ctx(&self, engine: usize, signal: u32) -> Option<&DependencyCtx<N>> {
        let idx = signal.checked_sub(1)? as usize;
        self.signals_ctx.get(engine)?.get(idx)
    }

    /// Register `desc` and return what it must wait for.
    ///
    /// Descriptors must arrive in global submission order. The result holds
    /// at most one signal per engine. When `engine_max_signal_idx` is given,
    /// hazards on signals at or above `engine_max_signal_idx[e]` are left out.
    ///
    /// # Panics
    ///
    /// Panics on engine ids `>= N`, sub-ROI signal indices outside the
    /// descriptor's signals, cyclic strides above
    /// [`OverlapConfig::max_cyclic_stride`], bound/cyclic list mismatches and
    /// ranges beyond the address space.
    pub fn add_descriptor(
        &mut self,
        desc: &OverlapDescriptor,
        engine_max_signal_idx: Option<&[u32; N]>,
    ) -> DependencyCtx<N> {
        let engine = desc.engine_id as usize;
        let slot = desc.dependency_slot() as usize;
        assert!(engine < N, "engine id {engine} out of range for {N} engines");
        assert!(slot < N, "dependency slot {slot} out of range for {N} engines");

        let _span = perf_span!(
            "add_descriptor",
            engine = desc.engine_id,
            slot = slot,
            inputs = desc.input_rois.len(),
            outputs = desc.output_rois.len()
        );

        let base = self.signal_counters[slot];
        let signals = desc.num_signals.max(1);
        let queue = Some(desc.engine_id);

        let mut ctx = DependencyCtx::<N>::new();
        {
            // Work this descriptor's queue issued earlier on the same slot is
            // already ordered, and signals above `base` are its own.
            let mut sink = |hazard: Hazard| {
                let e = hazard.slot as usize;
                if e == slot && (hazard.queue == queue || hazard.signal > base) {
                    return;
                }
                if engine_max_signal_idx.is_some_and(|max| hazard.signal >= max[e]) {
                    return;
                }
                ctx.add(e, hazard.signal);
            };

            let target = AccessTarget {
                slot: slot as u32,
                queue: desc.engine_id,
                base,
                signals,
            };
            for roi in &desc.input_rois {
                self.access_roi(roi, target, AccessType::Read, &mut sink);
            }
            for roi in &desc.output_rois {
                let ty = if roi.is_reduction {
                    AccessType::Reduction
                } else {
                    AccessType::Write
                };
                self.access_roi(roi, target, ty, &mut sink);
            }
        }

        if desc.min_self_wait_for_shared_sob > 0 {
            ctx.add(slot, desc.min_self_wait_for_shared_sob);
        }

        if desc.num_signals == 0 {
            self.pending_ctx[slot].merge(&ctx);
        } else {
            let mut recorded = std::mem::take(&mut self.pending_ctx[slot]);
            recorded.merge(&ctx);
            let per_signal = &mut self.signals_ctx[slot];
            per_signal.resize(per_signal.len() + desc.num_signals as usize, recorded);
            self.signal_counters[slot] = base + desc.num_signals;
        }

        self.descriptors_submitted += 1;
        if self.config.merge_interval > 0 && self.descriptors_submitted % self.config.merge_interval == 0 {
            for space in &mut self.spaces {
                space.merge_segments();
            }
        }

        tracing::trace!(
            engine = desc.engine_id,
            slot,
            first_signal = base + 1,
            num_signals = desc.num_signals,
            deps = %ctx,
            "computed descriptor dependencies"
        );
        ctx
    }

    fn access_roi(
        &mut self,
        roi: &OverlapRoi,
        target: AccessTarget,
        ty: AccessType,
        sink: &mut impl FnMut(Hazard),
    ) {
        let AccessTarget { slot, queue, base, signals } = target;
        let max_stride = self.config.max_cyclic_stride;
        let space = &mut self.spaces[if roi.is_sram { SRAM } else { DRAM }];

        for sub_roi in &roi.sub_rois {
            assert!(
                sub_roi.rel_signal_idx < signals,
                "sub-ROI signal {} outside the descriptor's {signals} signals",
                sub_roi.rel_signal_idx
            );
            let signal = if roi.is_local_signal {
                base + signals
            } else {
                base + sub_roi.rel_signal_idx + 1
            };

            if sub_roi.cyclic_ranges.is_empty() {
                for range in &sub_roi.ranges {
                    let origin = Origin { slot, queue, signal };
                    linear_access(space, range.shifted(roi.offset), origin, ty, sink);
                }
                continue;
            }

            assert_eq!(
                sub_roi.ranges.len(),
                sub_roi.cyclic_ranges.len(),
                "every cyclic range needs a bound"
            );
            for (bound, cyclic) in sub_roi.ranges.iter().zip(&sub_roi.cyclic_ranges) {
                assert!(
                    cyclic.stride() <= max_stride,
                    "cyclic stride {} exceeds maximum {max_stride}",
                    cyclic.stride()
                );
                let mut pattern = *cyclic;
                pattern.shift((roi.offset % u64::from(cyclic.stride())) as i64);
                let origin = Origin { slot, queue, signal };
                cyclic_access(space, bound.shifted(roi.offset), pattern, origin, ty, sink);
            }
        }
    }
}

/// Slot, queue and signal range of the descriptor being added.
#[derive(Debug, Clone, Copy)]
struct AccessTarget {
    slot: u32,
    queue: u32,
    base: u32,
    signals: u32,
}

/// Who performs one sub-ROI access and which signal announces it.
#[derive(Debug, Clone, Copy)]
struct Origin {
    slot: u32,
    queue: u32,
    signal: u32,
}

fn linear_access<const N: usize>(
    space: &mut SegmentsSpace<SyncInfo<N>>,
    range: DataRange<u64>,
    origin: Origin,
    ty: AccessType,
    sink: &mut impl FnMut(Hazard),
) {
    for (window, record) in space.get_covered_segments_mut(range.start(), range.size()) {
        if !record.valid {
            record.valid = true;
            record.payload = SyncInfo::default();
        }
        record.payload.linear_hazards(&window, ty, sink);
        record.payload.apply_linear(origin.slot, origin.queue, origin.signal, ty);
    }
}

fn cyclic_access<const N: usize>(
    space: &mut SegmentsSpace<SyncInfo<N>>,
    bound: DataRange<u64>,
    pattern: CyclicDataRange,
    origin: Origin,
    ty: AccessType,
    sink: &mut impl FnMut(Hazard),
) {
    for (window, record) in space.get_covered_segments_mut(bound.start(), bound.size()) {
        if !pattern.is_overlap_range(window.start(), window.end()) {
            continue;
        }
        if !record.valid {
            record.valid = true;
            record.payload = SyncInfo::default();
        }
        record.payload.cyclic_hazards(&pattern, &window, ty, sink);
        record.payload.apply_cyclic(
            CyclicRangeAccess {
                engine: origin.slot,
                queue: origin.queue,
                signal: origin.signal,
                range: pattern,
                access_type: ty,
            },
            &window,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENGINES: usize = 4;

    fn write(engine: u32, start: u64, end: u64) -> OverlapDescriptor {
        OverlapDescriptor::new(engine, 1).output(OverlapRoi::linear(vec![DataRange::new(start, end)]))
    }

    fn read(engine: u32, start: u64, end: u64) -> OverlapDescriptor {
        OverlapDescriptor::new(engine, 1).input(OverlapRoi::linear(vec![DataRange::new(start, end)]))
    }

    fn deps(ctx: &DependencyCtx<ENGINES>) -> Vec<(usize, u32)> {
        ctx.iter().collect()
    }

    #[test]
    fn signals_are_counted_per_slot() {
        let mut overlap = Overlap::<ENGINES>::new();
        overlap.add_descriptor(&OverlapDescriptor::new(0, 3), None);
        overlap.add_descriptor(&OverlapDescriptor::new(1, 0).with_dependency_slot(0), None);
        overlap.add_descriptor(&OverlapDescriptor::new(2, 1), None);
        assert_eq!(overlap.signal_count(0), 3);
        assert_eq!(overlap.signal_count(2), 1);
        assert_eq!(overlap.descriptors_submitted(), 3);
        assert!(overlap.get_signal_ctx(0, 3).is_some());
        assert!(overlap.get_signal_ctx(0, 4).is_none());
        assert!(overlap.get_signal_ctx(0, 0).is_none());
    }

    #[test]
    fn own_queue_hazards_are_dropped() {
        let mut overlap = Overlap::<ENGINES>::new();
        overlap.add_descriptor(&write(0, 0, 64), None);
        let ctx = overlap.add_descriptor(&read(0, 0, 64), None);
        assert!(ctx.is_empty());
    }

    #[test]
    fn shared_slot_keeps_hazards_of_other_engines() {
        let mut overlap = Overlap::<ENGINES>::new();
        overlap.add_descriptor(&write(1, 0, 64).with_dependency_slot(0), None);
        // Engine 2 reports on slot 0 too, but is a different queue.
        let ctx = overlap.add_descriptor(&read(2, 0, 64).with_dependency_slot(0), None);
        assert_eq!(deps(&ctx), vec![(0, 1)]);
    }

    #[test]
    fn slot_owner_waits_for_writes_other_queues_made_through_its_slot() {
        let mut overlap = Overlap::<ENGINES>::new();
        overlap.add_descriptor(&write(1, 0, 64).with_dependency_slot(0), None);

        // Engine 0 owns slot 0 but runs its own queue.
        assert_eq!(deps(&overlap.add_descriptor(&read(0, 0, 64), None)), vec![(0, 1)]);
        let through_slot = read(2, 0, 64).with_dependency_slot(0);
        assert_eq!(deps(&overlap.add_descriptor(&through_slot, None)), vec![(0, 1)]);

        // Engine 1 reporting through slot 0 again is ordered behind its own write.
        let again = overlap.add_descriptor(&read(1, 32, 48).with_dependency_slot(0), None);
        assert!(again.is_empty());
    }

    #[test]
    fn own_queue_skips_only_its_own_readers_on_a_shared_slot() {
        let mut overlap = Overlap::<ENGINES>::new();
        overlap.add_descriptor(&read(1, 0, 64).with_dependency_slot(0), None);
        overlap.add_descriptor(&read(0, 0, 64), None);

        // Engine 0's own read raised the newer signal; engine 1's older one still counts.
        assert_eq!(deps(&overlap.add_descriptor(&write(0, 0, 64), None)), vec![(0, 1)]);
    }

    #[test]
    fn own_outputs_do_not_wait_on_own_inputs() {
        let mut overlap = Overlap::<ENGINES>::new();
        let desc = OverlapDescriptor::new(1, 1)
            .input(OverlapRoi::linear(vec![DataRange::new(0, 64)]))
            .output(OverlapRoi::linear(vec![DataRange::new(32, 96)]))
            .with_dependency_slot(3);
        assert!(overlap.add_descriptor(&desc, None).is_empty());
    }

    #[test]
    fn ceiling_filters_hazards() {
        let mut overlap = Overlap::<ENGINES>::new();
        overlap.add_descriptor(&write(0, 0, 64), None);
        overlap.add_descriptor(&write(0, 64, 128), None);
        let ceiling = [2, 0, 0, 0];
        let ctx = overlap.add_descriptor(&read(1, 0, 128), Some(&ceiling));
        assert_eq!(deps(&ctx), vec![(0, 1)]);
    }

    #[test]
    fn sram_and_dram_are_separate() {
        let mut overlap = Overlap::<ENGINES>::new();
        let sram_write =
            OverlapDescriptor::new(0, 1).output(OverlapRoi::linear(vec![DataRange::new(0, 64)]).sram());
        overlap.add_descriptor(&sram_write, None);
        assert!(overlap.add_descriptor(&read(1, 0, 64), None).is_empty());

        let sram_read =
            OverlapDescriptor::new(2, 1).input(OverlapRoi::linear(vec![DataRange::new(0, 64)]).sram());
        assert_eq!(deps(&overlap.add_descriptor(&sram_read, None)), vec![(0, 1)]);
    }

    #[test]
    fn offset_moves_linear_and_cyclic_ranges() {
        let mut overlap = Overlap::<ENGINES>::new();
        let bounds = vec![DataRange::new(0, 1024)];
        let cyclic = vec![CyclicDataRange::new(0, 16, 128).unwrap()];
        let strided = OverlapDescriptor::new(0, 1)
            .output(OverlapRoi::new(vec![OverlapSubRoi::cyclic(bounds, cyclic)]).with_offset(4096));
        overlap.add_descriptor(&strided, None);

        assert!(overlap.add_descriptor(&read(1, 4096 + 16, 4096 + 128), None).is_empty());
        assert_eq!(deps(&overlap.add_descriptor(&read(2, 4096 + 128, 4096 + 130), None)), vec![(0, 1)]);
    }

    #[test]
    fn sub_roi_signals_follow_relative_index() {
        let mut overlap = Overlap::<ENGINES>::new();
        let desc = OverlapDescriptor::new(0, 2).output(OverlapRoi::new(vec![
            OverlapSubRoi::linear(vec![DataRange::new(0, 64)]),
            OverlapSubRoi::linear(vec![DataRange::new(64, 128)]).with_signal(1),
        ]));
        overlap.add_descriptor(&desc, None);
        assert_eq!(deps(&overlap.add_descriptor(&read(1, 0, 8), None)), vec![(0, 1)]);
        assert_eq!(deps(&overlap.add_descriptor(&read(1, 64, 72), None)), vec![(0, 2)]);

        let local = OverlapDescriptor::new(0, 2).output(
            OverlapRoi::new(vec![OverlapSubRoi::linear(vec![DataRange::new(256, 320)])]).local_signal(),
        );
        overlap.add_descriptor(&local, None);
        assert_eq!(deps(&overlap.add_descriptor(&read(2, 256, 260), None)), vec![(0, 4)]);
    }

    #[test]
    #[should_panic(expected = "outside the descriptor's")]
    fn relative_signal_out_of_range_panics() {
        let mut overlap = Overlap::<ENGINES>::new();
        let desc = OverlapDescriptor::new(0, 1).output(OverlapRoi::new(vec![
            OverlapSubRoi::linear(vec![DataRange::new(0, 8)]).with_signal(1),
        ]));
        overlap.add_descriptor(&desc, None);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn unknown_engine_panics() {
        let mut overlap = Overlap::<ENGINES>::new();
        overlap.add_descriptor(&write(ENGINES as u32, 0, 8), None);
    }

    #[test]
    #[should_panic(expected = "exceeds maximum")]
    fn oversized_stride_panics() {
        let mut overlap = Overlap::<ENGINES>::with_config(OverlapConfig::new().with_max_cyclic_stride(64));
        let sub_roi = OverlapSubRoi::cyclic(
            vec![DataRange::new(0, 1024)],
            vec![CyclicDataRange::new(0, 8, 128).unwrap()],
        );
        overlap.add_descriptor(&OverlapDescriptor::new(0, 1).output(OverlapRoi::new(vec![sub_roi])), None);
    }

    #[test]
    fn periodic_defragmentation_keeps_results() {
        let config = OverlapConfig::new().with_merge_interval(4);
        let mut merged = Overlap::<ENGINES>::with_config(config);
        let mut unmerged = Overlap::<ENGINES>::with_config(config.with_merge_interval(0));
        for i in 0..16u64 {
            let desc = write((i % 3) as u32, i * 32, i * 32 + 32);
            merged.add_descriptor(&desc, None);
            unmerged.add_descriptor(&desc, None);
        }
        let later = read(3, 0, 512);
        assert_eq!(merged.add_descriptor(&later, None), unmerged.add_descriptor(&later, None));
        assert!(merged.segment_count() <= unmerged.segment_count());
    }
}
