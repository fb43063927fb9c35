//! Configuration management for kvdump
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! Command-line flags are applied on top by the caller.
//!
//! # Usage
//!
//! ```no_run
//! use kvdump::config::Config;
//!
//! let config = Config::load(None).expect("Failed to load configuration");
//! println!("Batch limit: {}", config.transfer.batch_limit);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `KVDUMP__<section>__<key>`
//!
//! Examples:
//! - `KVDUMP__TRANSFER__BATCH_LIMIT=512`
//! - `KVDUMP__ARCHIVE__COMPRESSION_LEVEL=9`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/kvdump.toml`.
//! This can be overridden using the `KVDUMP_CONFIG` environment variable or
//! the `--config` flag.

mod models;
mod sources;
mod validation;

pub use models::{ArchiveConfig, Config, LocalConfig, TransferConfig};
pub use validation::ValidationError;

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// `path` replaces the default file location when given.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or a value is
    /// out of range.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = sources::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges; also used after command-line overrides
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate(self)
    }
}
