use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of dataport counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DataportStatsSnapshot {
    pub reads: u64,
    pub writes: u64,
    pub atomics: u64,
    pub rejected: u64,
    pub lanes_executed: u64,
    pub lanes_masked: u64,
    pub lanes_out_of_bounds: u64,
}

/// Counters updated by every dataport call.
///
/// Relaxed atomics: emulated threads bump these concurrently and readers only need an
/// approximate, eventually consistent view.
#[derive(Debug, Default)]
pub struct DataportStats {
    reads: AtomicU64,
    writes: AtomicU64,
    atomics: AtomicU64,
    rejected: AtomicU64,
    lanes_executed: AtomicU64,
    lanes_masked: AtomicU64,
    lanes_out_of_bounds: AtomicU64,
}

impl DataportStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_reads(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_writes(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_atomics(&self) {
        self.atomics.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_lanes(&self, lanes: LaneTally) {
        if lanes.executed != 0 {
            self.lanes_executed
                .fetch_add(lanes.executed, Ordering::Relaxed);
        }
        if lanes.masked != 0 {
            self.lanes_masked.fetch_add(lanes.masked, Ordering::Relaxed);
        }
        if lanes.out_of_bounds != 0 {
            self.lanes_out_of_bounds
                .fetch_add(lanes.out_of_bounds, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> DataportStatsSnapshot {
        DataportStatsSnapshot {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            atomics: self.atomics.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            lanes_executed: self.lanes_executed.load(Ordering::Relaxed),
            lanes_masked: self.lanes_masked.load(Ordering::Relaxed),
            lanes_out_of_bounds: self.lanes_out_of_bounds.load(Ordering::Relaxed),
        }
    }
}

/// Per-call lane accounting, folded into [`DataportStats`] once the call finishes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LaneTally {
    pub executed: u64,
    pub masked: u64,
    pub out_of_bounds: u64,
}

impl LaneTally {
    pub(crate) fn executed(&mut self) {
        self.executed += 1;
    }

    pub(crate) fn masked(&mut self) {
        self.masked += 1;
    }

    pub(crate) fn out_of_bounds(&mut self) {
        self.out_of_bounds += 1;
    }
}
