//! Batch buffers bounding each bulk round-trip

use std::collections::BTreeMap;
use tracing::debug;

use super::{EntrySink, TransferError};
use crate::observability::TransferStats;
use crate::store::{Key, Result, StoreConnector, Value};

/// Upper bound on keys preallocated per export batch
const PREALLOCATED_KEYS: usize = 4096;

/// Pending keys waiting for one bulk read
///
/// An `add` that takes the buffer past `limit` flushes it, so a single bulk
/// read carries at most `limit + 1` keys.
pub struct ExportBatch<'s> {
    keys: Vec<Key>,
    limit: usize,
    stats: &'s TransferStats,
}

impl<'s> ExportBatch<'s> {
    pub fn new(limit: usize, stats: &'s TransferStats) -> Self {
        let limit = limit.max(1);
        Self {
            keys: Vec::with_capacity(limit.min(PREALLOCATED_KEYS) + 1),
            limit,
            stats,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Queue a key, flushing into `sink` once the limit is passed
    ///
    /// Returns the number of pairs written by a flush, 0 when none ran.
    pub async fn add(
        &mut self,
        key: Key,
        store: &dyn StoreConnector,
        sink: &mut dyn EntrySink,
    ) -> std::result::Result<u64, TransferError> {
        self.keys.push(key);
        if self.keys.len() > self.limit {
            return self.flush(store, sink).await;
        }
        Ok(0)
    }

    /// Fetch all pending keys and hand the present ones to `sink`
    ///
    /// Keys the store no longer holds are skipped. The buffer is emptied even
    /// when the fetch or a sink write fails.
    pub async fn flush(
        &mut self,
        store: &dyn StoreConnector,
        sink: &mut dyn EntrySink,
    ) -> std::result::Result<u64, TransferError> {
        if self.keys.is_empty() {
            return Ok(0);
        }
        let keys = std::mem::take(&mut self.keys);
        self.keys.reserve(self.limit.min(PREALLOCATED_KEYS) + 1);

        self.stats.bulk_read();
        let pairs = store.bulk_get(&keys).await?;

        let mut written = 0u64;
        for (key, value) in &pairs {
            let Some(value) = value else {
                continue;
            };
            sink.accept(key, value)?;
            written += 1;
        }

        debug!(requested = keys.len(), written, "Export batch flushed");
        self.stats.entries_moved(written);
        Ok(written)
    }
}

/// Pending pairs waiting for one bulk write
///
/// Flushes as soon as it holds `limit` pairs.
pub struct ImportBatch<'s> {
    pairs: BTreeMap<Key, Value>,
    limit: usize,
    stats: &'s TransferStats,
}

impl<'s> ImportBatch<'s> {
    pub fn new(limit: usize, stats: &'s TransferStats) -> Self {
        Self {
            pairs: BTreeMap::new(),
            limit: limit.max(1),
            stats,
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Queue a pair, writing the batch once it reaches the limit
    ///
    /// A key repeated before a flush keeps its latest value.
    pub async fn add(&mut self, key: Key, value: Value, store: &dyn StoreConnector) -> Result<u64> {
        self.pairs.insert(key, value);
        if self.pairs.len() >= self.limit {
            return self.flush(store).await;
        }
        Ok(0)
    }

    /// Write all pending pairs in one round-trip
    pub async fn flush(&mut self, store: &dyn StoreConnector) -> Result<u64> {
        if self.pairs.is_empty() {
            return Ok(0);
        }
        self.stats.bulk_write();
        let result = store.bulk_put(&self.pairs).await;
        let written = self.pairs.len() as u64;
        self.pairs.clear();
        result?;

        debug!(written, "Import batch flushed");
        self.stats.entries_moved(written);
        Ok(written)
    }
}
