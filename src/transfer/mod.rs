//! Bulk transfer engine
//!
//! A transfer walks the store's partition space with a [`PartitionCursor`],
//! buffers keys or pairs in a batch and moves them in bulk round-trips:
//!
//! - export: cursor -> [`ExportBatch`] -> bulk get -> [`EntrySink`] (archive)
//! - import: archive -> [`ImportBatch`] -> bulk put
//!
//! Every round-trip is awaited before the next one is issued.

pub mod batch;
pub mod cursor;
pub mod export;
pub mod import;

pub use batch::{ExportBatch, ImportBatch};
pub use cursor::{CursorMode, PartitionCursor};
pub use export::{run_export, ExportOptions};
pub use import::run_import;

use std::io;
use thiserror::Error;

use crate::archive::{ArchiveError, ArchiveWriter};
use crate::store::{Key, StoreError, Value};

/// Number of pairs moved per bulk round-trip unless configured otherwise
pub const DEFAULT_BATCH_LIMIT: usize = 128;

/// Largest accepted batch limit
pub const MAX_BATCH_LIMIT: usize = 1_000_000;

/// Partition count the window heuristic assumes for the store
const ASSUMED_PARTITIONS: u64 = 257;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("cannot write output: {0}")]
    Output(#[from] io::Error),
}

/// A pipeline stopped by a fatal error
///
/// `completed` is the number of entries already moved when it stopped.
#[derive(Debug, Error)]
#[error("{cause}")]
pub struct Aborted {
    pub completed: u64,
    #[source]
    pub cause: TransferError,
}

impl Aborted {
    pub fn new(completed: u64, cause: impl Into<TransferError>) -> Self {
        Self {
            completed,
            cause: cause.into(),
        }
    }
}

/// Destination for pairs fetched by an export batch
pub trait EntrySink {
    fn accept(&mut self, key: &Key, value: &Value) -> Result<(), TransferError>;
}

impl EntrySink for ArchiveWriter {
    fn accept(&mut self, key: &Key, value: &Value) -> Result<(), TransferError> {
        self.append(key, value)?;
        Ok(())
    }
}

/// Window size derived from how densely the store is populated
///
/// Aims for roughly sixteen batches' worth of keys per window, assuming keys
/// spread evenly over 257 partitions. Never below 1.
pub fn default_window_size(batch_limit: usize, total_size: u64) -> u32 {
    let per_partition = (total_size / ASSUMED_PARTITIONS).max(1);
    let size = 16u64.saturating_mul(batch_limit as u64) / per_partition;
    size.clamp(1, u64::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_window_size() {
        // sparse stores get wide windows
        assert_eq!(default_window_size(128, 0), 2048);
        assert_eq!(default_window_size(128, 256), 2048);
        assert_eq!(default_window_size(128, 257 * 4), 512);
        // dense stores shrink to single partitions, never to zero
        assert_eq!(default_window_size(128, 257 * 10_000), 1);
        assert_eq!(default_window_size(1, 257 * 100), 1);
    }

    #[test]
    fn test_default_window_size_saturates() {
        assert_eq!(default_window_size(usize::MAX, 0), u32::MAX);
        assert_eq!(default_window_size(usize::MAX, u64::MAX), 1);
    }

    #[test]
    fn test_aborted_displays_cause() {
        let aborted = Aborted::new(7, StoreError::Request("boom".to_string()));
        assert_eq!(aborted.completed, 7);
        assert_eq!(aborted.to_string(), "store request failed: boom");
    }
}
