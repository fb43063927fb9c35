use std::io;
use thiserror::Error;

use crate::archive::ArchiveError;
use crate::config::{ConfigError, ValidationError};
use crate::store::StoreError;
use crate::transfer::{Aborted, TransferError};

/// Everything a command invocation can fail with
///
/// Locators, filters and partition lists are parsed by clap, so their errors
/// surface as usage errors before a `CliError` can exist.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid option: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("{cause} ({completed} entries transferred before the failure)")]
    Aborted {
        completed: u64,
        #[source]
        cause: TransferError,
    },

    #[error("cannot write output: {0}")]
    Output(#[from] io::Error),
}

impl From<Aborted> for CliError {
    fn from(value: Aborted) -> Self {
        CliError::Aborted {
            completed: value.completed,
            cause: value.cause,
        }
    }
}

impl CliError {
    /// Short classification used in diagnostics
    pub fn code(&self) -> &'static str {
        match self {
            CliError::Config(_) | CliError::Validation(_) => "CONFIG",
            CliError::Store(StoreError::Connection(_)) => "CONNECTION",
            CliError::Store(_) => "STORE",
            CliError::Archive(_) => "ARCHIVE",
            CliError::Transfer(TransferError::Store(_))
            | CliError::Aborted {
                cause: TransferError::Store(_),
                ..
            } => "STORE",
            CliError::Transfer(TransferError::Archive(_))
            | CliError::Aborted {
                cause: TransferError::Archive(_),
                ..
            } => "ARCHIVE",
            CliError::Transfer(TransferError::Output(_))
            | CliError::Aborted {
                cause: TransferError::Output(_),
                ..
            }
            | CliError::Output(_) => "OUTPUT",
        }
    }
}
