use super::models::Config;
use crate::transfer::MAX_BATCH_LIMIT;
use thiserror::Error;

const COMPRESSION_LEVELS: std::ops::RangeInclusive<i32> = 1..=22;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("batch_limit must be within 1..={max}, got {value}")]
    InvalidBatchLimit { value: usize, max: usize },

    #[error("compression_level must be within 1..=22, got {0}")]
    InvalidCompressionLevel(i32),

    #[error("partition_count must be at least 1")]
    InvalidPartitionCount,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_transfer(config)?;
    validate_archive(config)?;
    validate_local(config)?;
    Ok(())
}

fn validate_transfer(config: &Config) -> Result<(), ValidationError> {
    let value = config.transfer.batch_limit;
    if value == 0 || value > MAX_BATCH_LIMIT {
        return Err(ValidationError::InvalidBatchLimit {
            value,
            max: MAX_BATCH_LIMIT,
        });
    }
    Ok(())
}

fn validate_archive(config: &Config) -> Result<(), ValidationError> {
    let level = config.archive.compression_level;
    if !COMPRESSION_LEVELS.contains(&level) {
        return Err(ValidationError::InvalidCompressionLevel(level));
    }
    Ok(())
}

fn validate_local(config: &Config) -> Result<(), ValidationError> {
    if config.local.partition_count == 0 {
        return Err(ValidationError::InvalidPartitionCount);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_batch_limit() {
        let mut config = Config::default();
        config.transfer.batch_limit = 0;
        assert_eq!(
            validate(&config),
            Err(ValidationError::InvalidBatchLimit {
                value: 0,
                max: MAX_BATCH_LIMIT
            })
        );
    }

    #[test]
    fn test_batch_limit_maximum() {
        let mut config = Config::default();
        config.transfer.batch_limit = MAX_BATCH_LIMIT;
        assert!(validate(&config).is_ok());

        config.transfer.batch_limit = MAX_BATCH_LIMIT + 1;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidBatchLimit { .. })
        ));

        config.transfer.batch_limit = usize::MAX;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().starts_with("batch_limit must be within 1..="));
    }

    #[test]
    fn test_compression_level_bounds() {
        let mut config = Config::default();
        config.archive.compression_level = 22;
        assert!(validate(&config).is_ok());

        config.archive.compression_level = 0;
        assert_eq!(
            validate(&config),
            Err(ValidationError::InvalidCompressionLevel(0))
        );

        config.archive.compression_level = 23;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_partition_count() {
        let mut config = Config::default();
        config.local.partition_count = 0;
        assert_eq!(validate(&config), Err(ValidationError::InvalidPartitionCount));
    }
}
