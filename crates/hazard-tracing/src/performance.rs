//! Wall-clock timing of hot paths such as `add_descriptor` and segment
//! merging.
//!
//! A [`PerformanceSpan`] logs its lifetime on drop, but only once
//! [`configure`] set a threshold and the span lasted at least that long.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

// u64::MAX means timing is off.
static THRESHOLD_US: AtomicU64 = AtomicU64::new(u64::MAX);

/// `None` turns timing off, `Some(0)` logs every span.
pub fn configure(threshold_us: Option<u64>) {
    THRESHOLD_US.store(threshold_us.unwrap_or(u64::MAX), Ordering::Relaxed);
}

pub fn threshold_us() -> Option<u64> {
    match THRESHOLD_US.load(Ordering::Relaxed) {
        u64::MAX => None,
        threshold => Some(threshold),
    }
}

pub struct PerformanceSpan {
    name: &'static str,
    start: Instant,
}

impl PerformanceSpan {
    pub fn new(name: &'static str) -> Self {
        Self { name, start: Instant::now() }
    }

    pub fn elapsed_us(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_micros()).unwrap_or(u64::MAX)
    }
}

impl Drop for PerformanceSpan {
    fn drop(&mut self) {
        let Some(threshold) = threshold_us() else {
            return;
        };
        let elapsed_us = self.elapsed_us();
        if elapsed_us >= threshold {
            tracing::debug!(span = self.name, duration_us = elapsed_us, "performance_span_complete");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_grows_while_alive() {
        let span = PerformanceSpan::new("sleep");
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(span.elapsed_us() >= 1_000);
    }

    #[test]
    fn configure_round_trips_threshold() {
        configure(Some(40));
        assert_eq!(threshold_us(), Some(40));
        configure(None);
        assert_eq!(threshold_us(), None);
    }
}
