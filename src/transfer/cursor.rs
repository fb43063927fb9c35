//! Partition cursor with adaptive window shrink

use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::observability::TransferStats;
use crate::store::{
    Key, PartitionId, PartitionList, PartitionWindow, Predicate, Result, StoreConnector,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorMode {
    /// Caller-chosen ids, ascending; windows never shrink
    Explicit(Vec<PartitionId>),
    /// Every partition from 0 until the store reports the end of its space
    FullScan,
}

/// Walks a store's partition space window by window
///
/// In full-scan mode a window that reaches past the partition space is
/// halved and retried at the same offset, so no partition is skipped. Once a
/// single-partition window is out of range the scan is over.
pub struct PartitionCursor<'s> {
    mode: CursorMode,
    window_size: u32,
    /// Next partition id (full scan) or index into the explicit ids
    offset: u64,
    done: bool,
    stats: &'s TransferStats,
}

impl<'s> PartitionCursor<'s> {
    pub fn new(mode: CursorMode, window_size: u32, stats: &'s TransferStats) -> Self {
        Self {
            mode,
            window_size: window_size.max(1),
            offset: 0,
            done: false,
            stats,
        }
    }

    /// Explicit mode for a non-empty list, full scan otherwise
    pub fn for_partitions(
        partitions: Option<&PartitionList>,
        window_size: u32,
        stats: &'s TransferStats,
    ) -> Self {
        let mode = match partitions {
            Some(list) if !list.is_empty() => CursorMode::Explicit(list.iter().collect()),
            _ => CursorMode::FullScan,
        };
        Self::new(mode, window_size, stats)
    }

    pub fn mode(&self) -> &CursorMode {
        &self.mode
    }

    /// Current window size; only ever decreases
    pub fn window_size(&self) -> u32 {
        self.window_size
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Enumerate the next window
    ///
    /// Returns `None` once the partition space or the explicit id list is
    /// exhausted. Errors other than a recoverable range-exceeded are returned
    /// as-is and end the cursor.
    pub async fn next_window(
        &mut self,
        store: &dyn StoreConnector,
        predicate: Option<&Predicate>,
    ) -> Result<Option<(PartitionWindow, BTreeSet<Key>)>> {
        if self.done {
            return Ok(None);
        }
        let result = if matches!(self.mode, CursorMode::Explicit(_)) {
            self.next_explicit(store, predicate).await
        } else {
            self.next_range(store, predicate).await
        };
        if !matches!(result, Ok(Some(_))) {
            self.done = true;
        }
        result
    }

    async fn next_explicit(
        &mut self,
        store: &dyn StoreConnector,
        predicate: Option<&Predicate>,
    ) -> Result<Option<(PartitionWindow, BTreeSet<Key>)>> {
        let CursorMode::Explicit(ids) = &self.mode else {
            return Ok(None);
        };
        let start = self.offset as usize;
        if start >= ids.len() {
            return Ok(None);
        }
        let end = (start + self.window_size as usize).min(ids.len());
        let window = PartitionWindow::Explicit(ids[start..end].to_vec());

        let keys = store.enumerate_keys(predicate, &window).await?;
        self.offset = end as u64;
        self.record(&window, &keys);
        Ok(Some((window, keys)))
    }

    async fn next_range(
        &mut self,
        store: &dyn StoreConnector,
        predicate: Option<&Predicate>,
    ) -> Result<Option<(PartitionWindow, BTreeSet<Key>)>> {
        // one attempt per possible halving plus the final single-partition try
        for _ in 0..=u32::BITS {
            let Ok(start) = PartitionId::try_from(self.offset) else {
                return Ok(None);
            };
            let window = PartitionWindow::range(start, self.window_size);

            match store.enumerate_keys(predicate, &window).await {
                Ok(keys) => {
                    self.offset += u64::from(self.window_size);
                    self.record(&window, &keys);
                    return Ok(Some((window, keys)));
                }
                Err(e) if e.is_range_exceeded() && self.window_size > 1 => {
                    self.window_size >>= 1;
                    self.stats.window_shrunk();
                    debug!(
                        window = %window,
                        window_size = self.window_size,
                        "Window exceeds partition space, shrinking"
                    );
                }
                Err(e) if e.is_range_exceeded() => {
                    debug!(partitions = start, "Partition space exhausted");
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    fn record(&self, window: &PartitionWindow, keys: &BTreeSet<Key>) {
        self.stats.window_scanned(keys.len());
        info!("  Read partitions {} - {} entries", window, keys.len());
    }
}
