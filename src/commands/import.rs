use std::io::Write;
use std::path::PathBuf;

use crate::archive::ArchiveReader;
use crate::error::CliError;
use crate::store::StoreConnector;
use crate::transfer::{run_import, DEFAULT_BATCH_LIMIT};

#[derive(Debug, Clone)]
pub struct ImportCommand {
    pub file: PathBuf,
    pub batch_limit: usize,
}

impl ImportCommand {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            batch_limit: DEFAULT_BATCH_LIMIT,
        }
    }
}

/// Load an archive into the store
///
/// `Imported: <n> entries` is printed only when something was written, and
/// also when a failure interrupts an import that already wrote entries.
pub async fn run(
    store: &dyn StoreConnector,
    command: &ImportCommand,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let reader = ArchiveReader::open(&command.file)?;
    let (imported, outcome) = match run_import(store, reader, command.batch_limit).await {
        Ok(count) => (count, Ok(())),
        Err(aborted) => (aborted.completed, Err(CliError::from(aborted))),
    };
    if imported > 0 {
        writeln!(out, "Imported: {} entries", imported)?;
    }
    outcome
}
