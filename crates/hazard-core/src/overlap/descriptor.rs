//! Memory footprint of one hardware descriptor
//!
//! These are plain data produced by the ROI calculators upstream. They
//! serialize with serde so footprints can be captured from a compilation and
//! replayed in tests.

use serde::{Deserialize, Serialize};

use crate::cyclic_range::CyclicDataRange;
use crate::data_range::DataRange;

/// A slice of a tensor access that completes with one signal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverlapSubRoi {
    /// Linear byte ranges. When `cyclic_ranges` is non-empty, `ranges[i]` is
    /// the bound of `cyclic_ranges[i]` instead.
    pub ranges: Vec<DataRange<u64>>,
    #[serde(default)]
    pub cyclic_ranges: Vec<CyclicDataRange>,
    /// Which of the descriptor's signals marks this slice as done.
    #[serde(default)]
    pub rel_signal_idx: u32,
}

impl OverlapSubRoi {
    pub fn linear(ranges: Vec<DataRange<u64>>) -> Self {
        Self {
            ranges,
            ..Self::default()
        }
    }

    /// Periodic slice; `bounds[i]` limits `cyclic[i]`.
    ///
    /// # Panics
    ///
    /// Panics if the two lists differ in length.
    pub fn cyclic(bounds: Vec<DataRange<u64>>, cyclic: Vec<CyclicDataRange>) -> Self {
        assert_eq!(bounds.len(), cyclic.len(), "every cyclic range needs a bound");
        Self {
            ranges: bounds,
            cyclic_ranges: cyclic,
            rel_signal_idx: 0,
        }
    }

    pub fn with_signal(mut self, rel_signal_idx: u32) -> Self {
        self.rel_signal_idx = rel_signal_idx;
        self
    }

    /// Replace the linear ranges by cyclic ranges when all of them fold into
    /// periodic runs. Returns whether the sub-ROI changed.
    pub fn compress(&mut self, min_ranges: usize, max_stride: u32) -> bool {
        if !self.cyclic_ranges.is_empty() {
            return false;
        }
        match CyclicDataRange::compress_linear_ranges(&self.ranges, min_ranges, max_stride) {
            Some((bounds, cyclic)) => {
                tracing::trace!(linear = self.ranges.len(), cyclic = cyclic.len(), "compressed sub-ROI");
                self.ranges = bounds;
                self.cyclic_ranges = cyclic;
                true
            }
            None => false,
        }
    }
}

/// All sub-ROIs of one tensor operand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverlapRoi {
    pub sub_rois: Vec<OverlapSubRoi>,
    /// Added to every range of every sub-ROI.
    #[serde(default)]
    pub offset: u64,
    /// SRAM and DRAM addresses live in separate spaces.
    #[serde(default)]
    pub is_sram: bool,
    /// Output accumulates into memory rather than replacing it.
    #[serde(default)]
    pub is_reduction: bool,
    /// Every sub-ROI completes with the descriptor's last signal.
    #[serde(default)]
    pub is_local_signal: bool,
}

impl OverlapRoi {
    pub fn new(sub_rois: Vec<OverlapSubRoi>) -> Self {
        Self {
            sub_rois,
            ..Self::default()
        }
    }

    /// Single sub-ROI made of `ranges`.
    pub fn linear(ranges: Vec<DataRange<u64>>) -> Self {
        Self::new(vec![OverlapSubRoi::linear(ranges)])
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn sram(mut self) -> Self {
        self.is_sram = true;
        self
    }

    pub fn reduction(mut self) -> Self {
        self.is_reduction = true;
        self
    }

    pub fn local_signal(mut self) -> Self {
        self.is_local_signal = true;
        self
    }
}

/// Footprint and signalling of one descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverlapDescriptor {
    /// Engine executing the descriptor.
    pub engine_id: u32,
    /// Signal counter the descriptor belongs to when it differs from
    /// `engine_id` (engines sharing one semaphore).
    #[serde(default)]
    pub engine_id_for_dependency_context: Option<u32>,
    /// Signals raised on completion. Zero means the descriptor completes
    /// together with the next signalling descriptor of its slot.
    pub num_signals: u32,
    #[serde(default)]
    pub input_rois: Vec<OverlapRoi>,
    #[serde(default)]
    pub output_rois: Vec<OverlapRoi>,
    /// Extra wait on the own slot's signal, zero for none.
    #[serde(default)]
    pub min_self_wait_for_shared_sob: u32,
}

impl OverlapDescriptor {
    pub fn new(engine_id: u32, num_signals: u32) -> Self {
        Self {
            engine_id,
            num_signals,
            ..Self::default()
        }
    }

    pub fn input(mut self, roi: OverlapRoi) -> Self {
        self.input_rois.push(roi);
        self
    }

    pub fn output(mut self, roi: OverlapRoi) -> Self {
        self.output_rois.push(roi);
        self
    }

    pub fn with_dependency_slot(mut self, slot: u32) -> Self {
        self.engine_id_for_dependency_context = Some(slot);
        self
    }

    pub fn with_min_self_wait(mut self, signal: u32) -> Self {
        self.min_self_wait_for_shared_sob = signal;
        self
    }

    /// The signal counter this descriptor advances.
    #[inline]
    pub fn dependency_slot(&self) -> u32 {
        self.engine_id_for_dependency_context.unwrap_or(self.engine_id)
    }
}
