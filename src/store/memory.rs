//! In-memory partitioned store for tests and local experiments

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::Mutex;

use super::predicate::Predicate;
use super::window::{PartitionId, PartitionWindow};
use super::{partition_of, Key, Result, StoreConnector, StoreError, Value};

/// One request observed by a [`MemoryStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreRequest {
    Enumerate(PartitionWindow),
    BulkGet(usize),
    BulkPut(usize),
    Size,
}

#[derive(Debug, Clone)]
struct Slot {
    partition: PartitionId,
    /// `None` for keys that enumerate but vanish before they are read
    value: Option<Value>,
}

#[derive(Debug, Default)]
struct Faults {
    enumerate_at: Option<PartitionId>,
    bulk_get: bool,
    bulk_put_after: Option<usize>,
}

#[derive(Debug, Default)]
struct State {
    slots: BTreeMap<Key, Slot>,
    faults: Faults,
    bulk_puts: usize,
    requests: Vec<StoreRequest>,
}

/// Partitioned store held in memory
///
/// Behaves like a remote store with a fixed partition count: windows that
/// reach past the partition space are rejected with `RangeExceeded`. Builder
/// methods place entries in chosen partitions and inject failures; every
/// request is recorded for later inspection.
#[derive(Debug)]
pub struct MemoryStore {
    partition_count: u32,
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new(partition_count: u32) -> Self {
        Self {
            partition_count: partition_count.max(1),
            state: Mutex::new(State::default()),
        }
    }

    pub fn partition_count(&self) -> u32 {
        self.partition_count
    }

    /// Add an entry in the partition its key hashes to
    pub fn with_entry(self, key: impl Into<Key>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let partition = partition_of(&key, self.partition_count);
        self.with_entry_in(partition, key, value)
    }

    /// Add an entry in an explicit partition
    pub fn with_entry_in(
        mut self,
        partition: PartitionId,
        key: impl Into<Key>,
        value: impl Into<Value>,
    ) -> Self {
        self.state.get_mut().slots.insert(
            key.into(),
            Slot {
                partition,
                value: Some(value.into()),
            },
        );
        self
    }

    /// Add a key that is enumerated but reads back as not-found
    pub fn with_vanished_key(mut self, partition: PartitionId, key: impl Into<Key>) -> Self {
        self.state.get_mut().slots.insert(
            key.into(),
            Slot {
                partition,
                value: None,
            },
        );
        self
    }

    /// Fail any enumeration whose window contains `partition`
    pub fn fail_enumeration_at(mut self, partition: PartitionId) -> Self {
        self.state.get_mut().faults.enumerate_at = Some(partition);
        self
    }

    pub fn fail_bulk_get(mut self) -> Self {
        self.state.get_mut().faults.bulk_get = true;
        self
    }

    /// Let `successes` bulk writes through, then fail every later one
    pub fn fail_bulk_put_after(mut self, successes: usize) -> Self {
        self.state.get_mut().faults.bulk_put_after = Some(successes);
        self
    }

    /// Requests received so far, oldest first
    pub async fn requests(&self) -> Vec<StoreRequest> {
        self.state.lock().await.requests.clone()
    }

    /// Readable entries currently held
    pub async fn contents(&self) -> BTreeMap<Key, Value> {
        self.state
            .lock()
            .await
            .slots
            .iter()
            .filter_map(|(k, slot)| slot.value.clone().map(|v| (k.clone(), v)))
            .collect()
    }
}

#[async_trait]
impl StoreConnector for MemoryStore {
    async fn enumerate_keys(
        &self,
        predicate: Option<&Predicate>,
        window: &PartitionWindow,
    ) -> Result<BTreeSet<Key>> {
        let mut state = self.state.lock().await;
        state.requests.push(StoreRequest::Enumerate(window.clone()));

        if !window.fits(self.partition_count) {
            return Err(StoreError::RangeExceeded {
                window: window.to_string(),
                partition_count: self.partition_count,
            });
        }
        if let Some(bad) = state.faults.enumerate_at {
            if window.contains(bad) {
                return Err(StoreError::Request(format!(
                    "partition {} is unavailable",
                    bad
                )));
            }
        }

        let keys = state
            .slots
            .iter()
            .filter(|(_, slot)| window.contains(slot.partition))
            .filter(|(key, slot)| {
                let value = slot.value.as_deref().unwrap_or_default();
                Predicate::accepts(predicate, key, value)
            })
            .map(|(key, _)| key.clone())
            .collect();
        Ok(keys)
    }

    async fn bulk_get(&self, keys: &[Key]) -> Result<Vec<(Key, Option<Value>)>> {
        let mut state = self.state.lock().await;
        state.requests.push(StoreRequest::BulkGet(keys.len()));

        if state.faults.bulk_get {
            return Err(StoreError::Request("bulk get rejected".to_string()));
        }

        Ok(keys
            .iter()
            .map(|key| {
                let value = state.slots.get(key).and_then(|slot| slot.value.clone());
                (key.clone(), value)
            })
            .collect())
    }

    async fn bulk_put(&self, pairs: &BTreeMap<Key, Value>) -> Result<()> {
        let mut state = self.state.lock().await;
        state.requests.push(StoreRequest::BulkPut(pairs.len()));

        if let Some(limit) = state.faults.bulk_put_after {
            if state.bulk_puts >= limit {
                return Err(StoreError::Request("bulk put rejected".to_string()));
            }
        }
        state.bulk_puts += 1;

        for (key, value) in pairs {
            let partition = partition_of(key, self.partition_count);
            state.slots.insert(
                key.clone(),
                Slot {
                    partition,
                    value: Some(value.clone()),
                },
            );
        }
        Ok(())
    }

    async fn size(&self, predicate: Option<&Predicate>) -> Result<u64> {
        let mut state = self.state.lock().await;
        state.requests.push(StoreRequest::Size);

        let count = state
            .slots
            .iter()
            .filter_map(|(key, slot)| slot.value.as_ref().map(|v| (key, v)))
            .filter(|(key, value)| Predicate::accepts(predicate, key, value))
            .count();
        Ok(count as u64)
    }
}
