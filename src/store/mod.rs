//! Store connector abstraction for partitioned key-value stores
//!
//! The transfer engine never speaks a wire protocol directly. Everything it
//! needs from a store goes through [`StoreConnector`]:
//!
//! - `enumerate_keys` - keys living in a window of partitions, filtered store-side
//! - `bulk_get` - values for a batch of keys (absent keys map to `None`)
//! - `bulk_put` - write a batch of pairs in one round-trip
//! - `size` - entry count, optionally filtered
//!
//! Two backends ship with the crate: [`MemoryStore`] (tests, fault injection)
//! and [`LocalStore`] (fjall keyspace on disk, the CLI target).

pub mod local;
pub mod locator;
pub mod memory;
pub mod predicate;
pub mod window;

pub use local::LocalStore;
pub use locator::{Locator, LocatorError, Scheme};
pub use memory::{MemoryStore, StoreRequest};
pub use predicate::{Predicate, PredicateError};
pub use window::{PartitionId, PartitionList, PartitionListError, PartitionWindow};

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Opaque binary key, compared byte-exact
pub type Key = Bytes;

/// Opaque binary value
pub type Value = Bytes;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested window reaches past the store's partition space
    #[error("partition window {window} exceeds partition count {partition_count}")]
    RangeExceeded {
        window: String,
        partition_count: u32,
    },

    #[error("cannot connect: {0}")]
    Connection(String),

    #[error("store request failed: {0}")]
    Request(String),

    #[error("corrupt store data: {0}")]
    Corrupt(String),

    #[error("fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_range_exceeded(&self) -> bool {
        matches!(self, StoreError::RangeExceeded { .. })
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Bulk-oriented access to a partitioned key-value store
///
/// Implementations are driven strictly sequentially by one pipeline: each
/// call is awaited before the next one is issued.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// Keys stored in the partitions of `window` that match `predicate`
    ///
    /// Returns [`StoreError::RangeExceeded`] when any partition id in the
    /// window lies outside the store's partition space.
    async fn enumerate_keys(
        &self,
        predicate: Option<&Predicate>,
        window: &PartitionWindow,
    ) -> Result<BTreeSet<Key>>;

    /// Fetch values for `keys`, preserving request order
    async fn bulk_get(&self, keys: &[Key]) -> Result<Vec<(Key, Option<Value>)>>;

    /// Write every pair in one round-trip
    async fn bulk_put(&self, pairs: &BTreeMap<Key, Value>) -> Result<()>;

    /// Number of entries, or of entries matching `predicate`
    async fn size(&self, predicate: Option<&Predicate>) -> Result<u64>;

    /// Make previously written data durable
    async fn sync(&self) -> Result<()> {
        Ok(())
    }
}

/// Open the store a locator points at
pub fn connect(locator: &Locator, partition_count: u32) -> Result<Box<dyn StoreConnector>> {
    match locator.scheme {
        Scheme::Fjall => {
            let store = LocalStore::open(&locator.path, &locator.cache, partition_count)?;
            Ok(Box::new(store))
        }
    }
}

/// Partition a key lands in for a store with `partition_count` partitions
pub fn partition_of(key: &[u8], partition_count: u32) -> PartitionId {
    let hash = xxhash_rust::xxh3::xxh3_64(key);
    (hash % u64::from(partition_count.max(1))) as PartitionId
}

/// Render binary data for terminal output
///
/// Valid UTF-8 is printed as text, anything else as `0x`-prefixed hex.
pub fn render_bytes(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let mut out = String::with_capacity(2 + data.len() * 2);
            out.push_str("0x");
            for byte in data {
                out.push_str(&format!("{:02x}", byte));
            }
            out
        }
    }
}
