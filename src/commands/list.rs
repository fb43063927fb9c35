use std::io::Write;
use tracing::info;

use crate::error::CliError;
use crate::observability::TransferStats;
use crate::store::{render_bytes, Key, Predicate, StoreConnector, Value};
use crate::transfer::export::resolve_window_size;
use crate::transfer::{
    CursorMode, EntrySink, ExportBatch, PartitionCursor, TransferError, DEFAULT_BATCH_LIMIT,
};

/// What `list` prints for each entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ShowMode {
    #[default]
    Keys,
    Values,
    Entries,
}

#[derive(Debug, Clone)]
pub struct ListOptions {
    pub show: ShowMode,
    pub predicate: Option<Predicate>,
    pub batch_limit: usize,
    pub window_size: Option<u32>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            show: ShowMode::Keys,
            predicate: None,
            batch_limit: DEFAULT_BATCH_LIMIT,
            window_size: None,
        }
    }
}

/// Writes fetched pairs as text lines
struct Printer<'w> {
    out: &'w mut dyn Write,
    show: ShowMode,
}

impl Printer<'_> {
    fn key(&mut self, key: &Key) -> Result<(), TransferError> {
        writeln!(self.out, "{}", render_bytes(key))?;
        Ok(())
    }
}

impl EntrySink for Printer<'_> {
    fn accept(&mut self, key: &Key, value: &Value) -> Result<(), TransferError> {
        match self.show {
            ShowMode::Keys => self.key(key)?,
            ShowMode::Values => writeln!(self.out, "{}", render_bytes(value))?,
            ShowMode::Entries => writeln!(
                self.out,
                "{} --> {}",
                render_bytes(key),
                render_bytes(value)
            )?,
        }
        Ok(())
    }
}

/// Print every matching entry in enumeration order
///
/// Keys are printed straight from enumeration; values and entries go through
/// bulk reads. Returns the number of lines printed.
pub async fn run(
    store: &dyn StoreConnector,
    options: &ListOptions,
    out: &mut dyn Write,
) -> Result<u64, CliError> {
    let stats = TransferStats::new();
    let window_size = resolve_window_size(store, options.window_size, options.batch_limit).await?;
    let predicate = options.predicate.as_ref();

    let mut cursor = PartitionCursor::new(CursorMode::FullScan, window_size, &stats);
    let mut printer = Printer {
        out,
        show: options.show,
    };
    let mut printed = 0u64;

    if options.show == ShowMode::Keys {
        while let Some((_, keys)) = cursor.next_window(store, predicate).await? {
            for key in &keys {
                printer.key(key)?;
                printed += 1;
            }
        }
    } else {
        let mut batch = ExportBatch::new(options.batch_limit, &stats);
        while let Some((_, keys)) = cursor.next_window(store, predicate).await? {
            for key in keys {
                printed += batch.add(key, store, &mut printer).await?;
            }
        }
        printed += batch.flush(store, &mut printer).await?;
    }

    stats.log_summary("list");
    info!(entries = printed, "Listing complete");
    Ok(printed)
}
