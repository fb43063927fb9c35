use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub local: LocalConfig,
}

/// Bulk transfer tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransferConfig {
    /// Pairs per bulk read or write
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,
    /// Partitions per enumeration request, 0 derives it from the store size
    #[serde(default)]
    pub partition_block: u32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            batch_limit: default_batch_limit(),
            partition_block: 0,
        }
    }
}

impl TransferConfig {
    /// Configured window size, `None` when it should be derived
    pub fn window_size(&self) -> Option<u32> {
        (self.partition_block > 0).then_some(self.partition_block)
    }
}

/// Archive writer settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArchiveConfig {
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            compression_level: default_compression_level(),
        }
    }
}

/// Settings for caches held in a local fjall keyspace
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocalConfig {
    /// Partition count given to a cache when it is first created
    #[serde(default = "default_partition_count")]
    pub partition_count: u32,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            partition_count: default_partition_count(),
        }
    }
}

fn default_batch_limit() -> usize {
    crate::transfer::DEFAULT_BATCH_LIMIT
}

fn default_compression_level() -> i32 {
    3
}

fn default_partition_count() -> u32 {
    257
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.transfer.batch_limit, 128);
        assert_eq!(config.transfer.window_size(), None);
        assert_eq!(config.archive.compression_level, 3);
        assert_eq!(config.local.partition_count, 257);
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config: Config = toml::from_str(
            r#"
[transfer]
partition_block = 16
            "#,
        )
        .unwrap();
        assert_eq!(config.transfer.batch_limit, 128);
        assert_eq!(config.transfer.window_size(), Some(16));
        assert_eq!(config.local.partition_count, 257);
    }
}
