//! Transfer counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by the cursor and batches of one pipeline run
#[derive(Debug, Default)]
pub struct TransferStats {
    windows: AtomicU64,
    shrinks: AtomicU64,
    keys_found: AtomicU64,
    bulk_reads: AtomicU64,
    bulk_writes: AtomicU64,
    entries: AtomicU64,
}

impl TransferStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn window_scanned(&self, keys: usize) {
        self.windows.fetch_add(1, Ordering::Relaxed);
        self.keys_found.fetch_add(keys as u64, Ordering::Relaxed);
    }

    pub fn window_shrunk(&self) {
        self.shrinks.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "shrinks", "Metric incremented");
    }

    pub fn bulk_read(&self) {
        self.bulk_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bulk_write(&self) {
        self.bulk_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn entries_moved(&self, count: u64) {
        self.entries.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            windows: self.windows.load(Ordering::Relaxed),
            shrinks: self.shrinks.load(Ordering::Relaxed),
            keys_found: self.keys_found.load(Ordering::Relaxed),
            bulk_reads: self.bulk_reads.load(Ordering::Relaxed),
            bulk_writes: self.bulk_writes.load(Ordering::Relaxed),
            entries: self.entries.load(Ordering::Relaxed),
        }
    }

    /// Emit the current counters at debug level
    pub fn log_summary(&self, pipeline: &str) {
        let s = self.snapshot();
        tracing::debug!(
            pipeline,
            windows = s.windows,
            shrinks = s.shrinks,
            keys_found = s.keys_found,
            bulk_reads = s.bulk_reads,
            bulk_writes = s.bulk_writes,
            entries = s.entries,
            "Transfer statistics"
        );
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub windows: u64,
    pub shrinks: u64,
    pub keys_found: u64,
    pub bulk_reads: u64,
    pub bulk_writes: u64,
    pub entries: u64,
}
