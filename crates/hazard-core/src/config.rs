//! Tuning knobs for the hazard tracker

use crate::cyclic_range::MAX_CYCLIC_STRIDE;

/// Configuration for [`crate::Overlap`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlapConfig {
    /// Defragment the segment spaces every this many descriptors; zero
    /// disables defragmentation.
    pub merge_interval: u64,
    /// Largest stride a cyclic range may use.
    pub max_cyclic_stride: u32,
    /// Size of the SRAM address space.
    pub sram_limit: u64,
    /// Size of the DRAM address space.
    pub dram_limit: u64,
}

impl OverlapConfig {
    pub const DEFAULT_MERGE_INTERVAL: u64 = 64;

    pub const fn new() -> Self {
        Self {
            merge_interval: Self::DEFAULT_MERGE_INTERVAL,
            max_cyclic_stride: MAX_CYCLIC_STRIDE,
            sram_limit: u64::MAX,
            dram_limit: u64::MAX,
        }
    }

    pub const fn with_merge_interval(mut self, merge_interval: u64) -> Self {
        self.merge_interval = merge_interval;
        self
    }

    pub const fn with_max_cyclic_stride(mut self, max_cyclic_stride: u32) -> Self {
        self.max_cyclic_stride = max_cyclic_stride;
        self
    }

    pub const fn with_sram_limit(mut self, sram_limit: u64) -> Self {
        self.sram_limit = sram_limit;
        self
    }

    pub const fn with_dram_limit(mut self, dram_limit: u64) -> Self {
        self.dram_limit = dram_limit;
        self
    }
}

impl Default for OverlapConfig {
    fn default() -> Self {
        Self::new()
    }
}
