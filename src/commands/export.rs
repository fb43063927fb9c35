use std::io::Write;
use std::path::PathBuf;

use crate::archive::{ArchiveWriter, WriterOptions};
use crate::error::CliError;
use crate::store::StoreConnector;
use crate::transfer::{run_export, ExportOptions};

#[derive(Debug, Clone)]
pub struct ExportCommand {
    pub file: PathBuf,
    pub writer: WriterOptions,
    pub transfer: ExportOptions,
}

/// Dump matching entries into an archive and print `Entry count: <n>`
pub async fn run(
    store: &dyn StoreConnector,
    command: &ExportCommand,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let writer = ArchiveWriter::create(&command.file, &command.writer)?;
    let count = run_export(store, &command.transfer, writer).await?;
    writeln!(out, "Entry count: {}", count)?;
    Ok(())
}
