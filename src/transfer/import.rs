//! Import pipeline: archive -> store

use tracing::{info, warn};

use super::{Aborted, ImportBatch, TransferError};
use crate::archive::ArchiveReader;
use crate::observability::TransferStats;
use crate::store::StoreConnector;

/// Write every pair of `reader` into `store`
///
/// Pairs go out in bulk writes of at most `batch_limit`. The store is asked
/// to sync on every exit path. Returns the number of pairs imported.
pub async fn run_import(
    store: &dyn StoreConnector,
    mut reader: ArchiveReader,
    batch_limit: usize,
) -> Result<u64, Aborted> {
    let stats = TransferStats::new();
    let mut imported = 0u64;

    let outcome = pump(store, &mut reader, batch_limit, &stats, &mut imported).await;
    reader.close();
    let synced = store.sync().await;
    stats.log_summary("import");

    if let Err(cause) = outcome {
        if let Err(e) = synced {
            warn!(error = %e, "Failed to sync store after aborted import");
        }
        return Err(Aborted::new(imported, cause));
    }
    synced.map_err(|e| Aborted::new(imported, e))?;
    info!(entries = imported, "Import complete");
    Ok(imported)
}

async fn pump(
    store: &dyn StoreConnector,
    reader: &mut ArchiveReader,
    batch_limit: usize,
    stats: &TransferStats,
    imported: &mut u64,
) -> Result<(), TransferError> {
    let mut batch = ImportBatch::new(batch_limit, stats);

    while reader.advance()? {
        let key = reader.key().clone();
        let value = reader.value().clone();
        *imported += batch.add(key, value, store).await?;
    }
    *imported += batch.flush(store).await?;
    Ok(())
}
