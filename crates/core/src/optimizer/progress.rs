//! Per-slot optimizer progress, polled by UI layers
//!
//! Values are percentages. Each slot only ever moves forward and ends at 100
//! when the pipeline completes.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{PoisonError, RwLock};

/// Shared progress counters, one per worker slot
#[derive(Debug, Default)]
pub struct OptimizerProgress {
    slots: RwLock<Vec<AtomicU8>>,
}

impl OptimizerProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size the counters for a new run and zero them
    pub fn reset(&self, slots: usize) {
        let mut counters = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        *counters = (0..slots).map(|_| AtomicU8::new(0)).collect();
    }

    /// Raise a slot's value; lower values are ignored
    pub fn report(&self, slot: usize, percent: u8) {
        let counters = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(counter) = counters.get(slot) {
            counter.fetch_max(percent.min(100), Ordering::Relaxed);
        }
    }

    /// Mark every slot complete
    pub fn finish(&self) {
        let counters = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        for counter in counters.iter() {
            counter.store(100, Ordering::Relaxed);
        }
    }

    /// Current value of every slot
    pub fn snapshot(&self) -> Vec<u8> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.snapshot().iter().all(|&p| p == 100)
    }

    /// Reporter for one slot during one pass of `pass_count`
    pub fn slot(&self, slot: usize, pass: usize, pass_count: usize) -> SlotProgress<'_> {
        let span = 100 / pass_count.max(1);
        SlotProgress {
            progress: self,
            slot,
            base: pass * span,
            span,
        }
    }
}

/// Progress handle scoped to one slot and one pass
#[derive(Debug, Clone, Copy)]
pub struct SlotProgress<'a> {
    progress: &'a OptimizerProgress,
    slot: usize,
    base: usize,
    span: usize,
}

impl SlotProgress<'_> {
    /// Report `done` of `total` units finished in this pass
    pub fn update(&self, done: usize, total: usize) {
        let fraction = if total == 0 { self.span } else { self.span * done.min(total) / total };
        let percent = u8::try_from(self.base + fraction).unwrap_or(100);
        self.progress.report(self.slot, percent);
    }
}
