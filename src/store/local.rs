use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use tracing::{debug, info};

use super::predicate::Predicate;
use super::window::{PartitionId, PartitionWindow};
use super::{partition_of, Key, Result, StoreConnector, StoreError, Value};

/// Keyspace partition holding per-cache metadata, never usable as a cache
pub const META_PARTITION: &str = "kvdump_meta";

/// Fjall-backed partitioned store
///
/// Layout inside the keyspace:
/// - one fjall partition per cache: `{partition_id:u32be}{key}` -> value
/// - `kvdump_meta`: `partition_count:{cache}` -> u32be
///
/// The partition count is fixed when a cache is first opened.
#[derive(Clone)]
pub struct LocalStore {
    keyspace: Keyspace,
    entries: PartitionHandle,
    partition_count: u32,
}

impl LocalStore {
    /// Open or create `cache` inside the keyspace at `path`
    ///
    /// `default_partition_count` only applies to a cache that does not exist yet.
    pub fn open<P: AsRef<Path>>(path: P, cache: &str, default_partition_count: u32) -> Result<Self> {
        let path = path.as_ref();
        if cache == META_PARTITION {
            return Err(StoreError::Connection(format!(
                "cache name '{}' is reserved",
                cache
            )));
        }
        info!("Opening local store at: {} (cache {})", path.display(), cache);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let keyspace = Config::new(path)
            .open()
            .map_err(|e| StoreError::Connection(format!("{}: {}", path.display(), e)))?;
        let meta = keyspace.open_partition(META_PARTITION, PartitionCreateOptions::default())?;
        let entries = keyspace.open_partition(cache, PartitionCreateOptions::default())?;

        let count_key = encode_count_key(cache);
        let partition_count = match meta.get(count_key.as_slice())? {
            Some(raw) => decode_count(&raw)?,
            None => {
                let count = default_partition_count.max(1);
                meta.insert(count_key.as_slice(), count.to_be_bytes())?;
                count
            }
        };

        info!(partition_count, "Local store opened");
        Ok(Self {
            keyspace,
            entries,
            partition_count,
        })
    }

    pub fn partition_count(&self) -> u32 {
        self.partition_count
    }

    fn scan_partition(
        &self,
        partition: PartitionId,
        predicate: Option<&Predicate>,
        keys: &mut BTreeSet<Key>,
    ) -> Result<()> {
        for item in self.entries.prefix(partition.to_be_bytes()) {
            let (raw_key, value) = item?;
            let (_, key) = decode_entry_key(&raw_key)?;
            if Predicate::accepts(predicate, key, &value) {
                keys.insert(Bytes::copy_from_slice(key));
            }
        }
        Ok(())
    }

    fn entry_key(&self, key: &[u8]) -> Vec<u8> {
        encode_entry_key(partition_of(key, self.partition_count), key)
    }
}

#[async_trait]
impl StoreConnector for LocalStore {
    async fn enumerate_keys(
        &self,
        predicate: Option<&Predicate>,
        window: &PartitionWindow,
    ) -> Result<BTreeSet<Key>> {
        if !window.fits(self.partition_count) {
            return Err(StoreError::RangeExceeded {
                window: window.to_string(),
                partition_count: self.partition_count,
            });
        }

        let mut keys = BTreeSet::new();
        for partition in window.ids() {
            self.scan_partition(partition, predicate, &mut keys)?;
        }
        debug!(%window, count = keys.len(), "Enumerated keys");
        Ok(keys)
    }

    async fn bulk_get(&self, keys: &[Key]) -> Result<Vec<(Key, Option<Value>)>> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let value = self
                .entries
                .get(self.entry_key(key))?
                .map(|slice| Bytes::copy_from_slice(&slice));
            out.push((key.clone(), value));
        }
        Ok(out)
    }

    async fn bulk_put(&self, pairs: &BTreeMap<Key, Value>) -> Result<()> {
        let mut batch = self.keyspace.batch();
        for (key, value) in pairs {
            batch.insert(&self.entries, self.entry_key(key), value.as_ref());
        }
        batch.commit()?;
        debug!(count = pairs.len(), "Committed bulk write");
        Ok(())
    }

    async fn size(&self, predicate: Option<&Predicate>) -> Result<u64> {
        let mut count = 0u64;
        for item in self.entries.iter() {
            let (raw_key, value) = item?;
            let (_, key) = decode_entry_key(&raw_key)?;
            if Predicate::accepts(predicate, key, &value) {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn sync(&self) -> Result<()> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }
}

fn encode_count_key(cache: &str) -> Vec<u8> {
    format!("partition_count:{}", cache).into_bytes()
}

fn decode_count(raw: &[u8]) -> Result<u32> {
    let bytes: [u8; 4] = raw
        .try_into()
        .map_err(|_| StoreError::Corrupt(format!("partition count of {} bytes", raw.len())))?;
    Ok(u32::from_be_bytes(bytes))
}

/// Encode a stored key: {partition:u32be}{key}
fn encode_entry_key(partition: PartitionId, key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + key.len());
    out.extend_from_slice(&partition.to_be_bytes());
    out.extend_from_slice(key);
    out
}

fn decode_entry_key(raw: &[u8]) -> Result<(PartitionId, &[u8])> {
    if raw.len() < 4 {
        return Err(StoreError::Corrupt(format!(
            "stored key of {} bytes has no partition prefix",
            raw.len()
        )));
    }
    let (prefix, key) = raw.split_at(4);
    let partition = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
    Ok((partition, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store(partitions: u32) -> (LocalStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::open(temp_dir.path().join("store"), "people", partitions).unwrap();
        (store, temp_dir)
    }

    fn pairs(items: &[(&'static str, &'static str)]) -> BTreeMap<Key, Value> {
        items
            .iter()
            .map(|(k, v)| (Bytes::from(*k), Bytes::from(*v)))
            .collect()
    }

    #[test]
    fn test_entry_key_encoding() {
        let raw = encode_entry_key(7, b"k1");
        assert_eq!(raw, vec![0, 0, 0, 7, b'k', b'1']);

        let (partition, key) = decode_entry_key(&raw).unwrap();
        assert_eq!(partition, 7);
        assert_eq!(key, b"k1");

        assert!(decode_entry_key(&[0, 1]).is_err());
    }

    #[tokio::test]
    async fn test_put_get_and_size() {
        let (store, _temp) = create_test_store(16);
        store.bulk_put(&pairs(&[("k1", "v1"), ("k2", "v2")])).await.unwrap();

        let got = store
            .bulk_get(&[Bytes::from("k1"), Bytes::from("missing")])
            .await
            .unwrap();
        assert_eq!(got[0].1, Some(Bytes::from("v1")));
        assert_eq!(got[1].1, None);

        assert_eq!(store.size(None).await.unwrap(), 2);
        let predicate: Predicate = "key = 'k2'".parse().unwrap();
        assert_eq!(store.size(Some(&predicate)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_full_window_enumerates_everything() {
        let (store, _temp) = create_test_store(8);
        store
            .bulk_put(&pairs(&[("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")]))
            .await
            .unwrap();

        let keys = store
            .enumerate_keys(None, &PartitionWindow::range(0, 8))
            .await
            .unwrap();
        assert_eq!(keys.len(), 4);

        // each key is found in exactly its own partition
        let mut total = 0;
        for p in 0..8 {
            total += store
                .enumerate_keys(None, &PartitionWindow::Explicit(vec![p]))
                .await
                .unwrap()
                .len();
        }
        assert_eq!(total, 4);
    }

    #[tokio::test]
    async fn test_range_exceeded_past_partition_count() {
        let (store, _temp) = create_test_store(8);
        let err = store
            .enumerate_keys(None, &PartitionWindow::range(4, 8))
            .await
            .unwrap_err();
        assert!(err.is_range_exceeded());
    }

    #[test]
    fn test_partition_count_is_fixed_on_first_open() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store");
        {
            let store = LocalStore::open(&path, "people", 31).unwrap();
            assert_eq!(store.partition_count(), 31);
        }
        let store = LocalStore::open(&path, "people", 257).unwrap();
        assert_eq!(store.partition_count(), 31);
    }

    #[test]
    fn test_metadata_partition_cannot_be_opened_as_cache() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store");

        let err = LocalStore::open(&path, META_PARTITION, 16).err().unwrap();
        assert!(matches!(err, StoreError::Connection(ref msg) if msg.contains("reserved")));

        // a regular cache next to it still counts only its own entries
        let store = LocalStore::open(&path, "people", 16).unwrap();
        assert_eq!(store.partition_count(), 16);
    }

    #[tokio::test]
    async fn test_fresh_cache_is_empty() {
        let (store, _temp) = create_test_store(16);
        assert_eq!(store.size(None).await.unwrap(), 0);
    }
}
