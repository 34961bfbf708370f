//! Per-engine wait lists

use std::fmt;

/// Wait entry for one engine: "wait until this engine raised `signal_idx`".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EngineDependency {
    pub signal_idx: u32,
    pub valid: bool,
}

/// Fixed-size wait list with one slot per engine.
///
/// Signals are monotonic per engine, so waiting for the highest signal of an
/// engine implies every lower one. Adding a dependency therefore keeps the
/// maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DependencyCtx<const N: usize> {
    deps: [EngineDependency; N],
}

impl<const N: usize> Default for DependencyCtx<N> {
    fn default() -> Self {
        Self {
            deps: [EngineDependency::default(); N],
        }
    }
}

impl<const N: usize> DependencyCtx<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `signal_idx` of `engine`.
    ///
    /// # Panics
    ///
    /// Panics if `engine >= N`.
    #[inline]
    pub fn add(&mut self, engine: usize, signal_idx: u32) {
        assert!(engine < N, "engine {engine} out of range for {N} engines");
        let slot = &mut self.deps[engine];
        if !slot.valid || slot.signal_idx < signal_idx {
            *slot = EngineDependency { signal_idx, valid: true };
        }
    }

    /// Union with `other`, keeping the higher signal per engine.
    pub fn merge(&mut self, other: &Self) {
        for (engine, signal) in other.iter() {
            self.add(engine, signal);
        }
    }

    /// Signal required from `engine`, if any.
    #[inline]
    pub fn get(&self, engine: usize) -> Option<u32> {
        self.deps
            .get(engine)
            .filter(|dep| dep.valid)
            .map(|dep| dep.signal_idx)
    }

    /// Raw slot of `engine`.
    #[inline]
    pub fn entry(&self, engine: usize) -> EngineDependency {
        self.deps[engine]
    }

    /// Valid `(engine, signal)` pairs in engine order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.deps
            .iter()
            .enumerate()
            .filter(|(_, dep)| dep.valid)
            .map(|(engine, dep)| (engine, dep.signal_idx))
    }

    /// Number of engines waited on.
    pub fn len(&self) -> usize {
        self.deps.iter().filter(|dep| dep.valid).count()
    }

    pub fn is_empty(&self) -> bool {
        self.deps.iter().all(|dep| !dep.valid)
    }

    pub fn remove(&mut self, engine: usize) {
        self.deps[engine] = EngineDependency::default();
    }

    /// Drop the entries for which `keep` returns false.
    pub fn retain(&mut self, mut keep: impl FnMut(usize, u32) -> bool) {
        for (engine, dep) in self.deps.iter_mut().enumerate() {
            if dep.valid && !keep(engine, dep.signal_idx) {
                *dep = EngineDependency::default();
            }
        }
    }

    pub fn clear(&mut self) {
        self.deps = [EngineDependency::default(); N];
    }
}

impl<const N: usize> fmt::Display for DependencyCtx<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (engine, signal)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "e{engine}:{signal}")?;
        }
        f.write_str("}")
    }
}

/// A signal a later access may have to wait for.
///
/// `slot` is the dependency slot whose counter raised `signal`; `queue` is the
/// engine that executed the access. `None` stands for "some queue other than
/// the one of the slot's newest signal".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hazard {
    pub slot: u32,
    pub signal: u32,
    pub queue: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct SlotSignals {
    /// Highest signal, 0 when none.
    newest: u32,
    newest_queue: u32,
    /// Highest signal raised from a queue other than `newest_queue`.
    other: u32,
}

/// Signals of a set of accesses, per slot, remembering which queue raised
/// them.
///
/// Per slot it keeps the highest signal with its queue and the highest signal
/// from any other queue. That is enough to tell any queue the highest signal
/// it has to wait for on that slot when its own earlier accesses are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuedSignals<const N: usize> {
    slots: [SlotSignals; N],
}

impl<const N: usize> Default for QueuedSignals<N> {
    fn default() -> Self {
        Self {
            slots: [SlotSignals::default(); N],
        }
    }
}

impl<const N: usize> QueuedSignals<N> {
    /// Record `signal` of `slot`, raised by an access executed on `queue`.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= N` or `signal == 0`.
    pub fn add(&mut self, slot: usize, signal: u32, queue: u32) {
        assert!(slot < N, "engine {slot} out of range for {N} engines");
        assert!(signal > 0, "signal indices start at 1");
        let entry = &mut self.slots[slot];
        if entry.newest == 0 || entry.newest_queue == queue {
            entry.newest = entry.newest.max(signal);
            entry.newest_queue = queue;
        } else if signal > entry.newest {
            entry.other = entry.newest;
            entry.newest = signal;
            entry.newest_queue = queue;
        } else {
            entry.other = entry.other.max(signal);
        }
    }

    /// Every hazard worth reporting, newest signal of each slot first.
    pub fn hazards(&self) -> impl Iterator<Item = Hazard> + '_ {
        self.slots.iter().enumerate().flat_map(|(slot, entry)| {
            let newest = (entry.newest > 0).then_some(Hazard {
                slot: slot as u32,
                signal: entry.newest,
                queue: Some(entry.newest_queue),
            });
            let other = (entry.other > 0).then_some(Hazard {
                slot: slot as u32,
                signal: entry.other,
                queue: None,
            });
            newest.into_iter().chain(other)
        })
    }

    /// Highest signal per slot.
    pub fn signals(&self) -> DependencyCtx<N> {
        let mut ctx = DependencyCtx::new();
        for hazard in self.hazards() {
            ctx.add(hazard.slot as usize, hazard.signal);
        }
        ctx
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|entry| entry.newest == 0)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_signals_answer_every_queue() {
        let mut set = QueuedSignals::<2>::default();
        set.add(0, 1, 1);
        set.add(0, 3, 0);
        set.add(0, 2, 0);
        // Queue 0 owns the newest signal; queue 1's read is still pending for it.
        assert_eq!(
            set.hazards().collect::<Vec<_>>(),
            vec![
                Hazard { slot: 0, signal: 3, queue: Some(0) },
                Hazard { slot: 0, signal: 1, queue: None },
            ]
        );

        set.add(0, 5, 1);
        set.add(0, 4, 1);
        let hazards: Vec<_> = set.hazards().map(|h| (h.signal, h.queue)).collect();
        assert_eq!(hazards, vec![(5, Some(1)), (3, None)]);
        assert_eq!(set.signals().iter().collect::<Vec<_>>(), vec![(0, 5)]);

        set.clear();
        assert!(set.is_empty());
        assert_eq!(set.hazards().count(), 0);
    }

    #[test]
    fn add_keeps_highest_signal() {
        let mut ctx = DependencyCtx::<4>::new();
        ctx.add(1, 5);
        ctx.add(1, 3);
        ctx.add(2, 0);
        assert_eq!(ctx.get(1), Some(5));
        assert_eq!(ctx.get(2), Some(0));
        assert_eq!(ctx.get(0), None);
        assert_eq!(ctx.get(9), None);
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.to_string(), "{e1:5, e2:0}");
    }

    #[test]
    fn merge_and_retain() {
        let mut a = DependencyCtx::<3>::new();
        a.add(0, 4);
        let mut b = DependencyCtx::<3>::new();
        b.add(0, 7);
        b.add(2, 1);
        a.merge(&b);
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![(0, 7), (2, 1)]);

        a.retain(|engine, _| engine != 0);
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![(2, 1)]);
        a.remove(2);
        assert!(a.is_empty());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn engine_out_of_range_panics() {
        DependencyCtx::<2>::new().add(2, 1);
    }
}
