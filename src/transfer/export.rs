//! Export pipeline: store -> archive

use tracing::{info, warn};

use super::{
    default_window_size, Aborted, ExportBatch, PartitionCursor, TransferError, DEFAULT_BATCH_LIMIT,
};
use crate::archive::ArchiveWriter;
use crate::observability::TransferStats;
use crate::store::{PartitionList, Predicate, StoreConnector};

/// Options for one export run
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub batch_limit: usize,
    /// Partitions per enumeration; derived from the store size when unset
    pub window_size: Option<u32>,
    /// Restrict the export to these partitions; full scan when unset
    pub partitions: Option<PartitionList>,
    pub predicate: Option<Predicate>,
    /// Archive scope to write the pairs under
    pub scope: Option<String>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            batch_limit: DEFAULT_BATCH_LIMIT,
            window_size: None,
            partitions: None,
            predicate: None,
            scope: None,
        }
    }
}

/// Resolve the enumeration window size for a run
pub async fn resolve_window_size(
    store: &dyn StoreConnector,
    configured: Option<u32>,
    batch_limit: usize,
) -> Result<u32, TransferError> {
    match configured {
        Some(size) if size > 0 => Ok(size),
        _ => {
            let total = store.size(None).await?;
            let size = default_window_size(batch_limit, total);
            info!(total, window_size = size, "Derived partition window size");
            Ok(size)
        }
    }
}

/// Copy matching entries from `store` into `writer`
///
/// The archive is finished whether or not the run succeeds, so pairs written
/// before a failure stay readable. Returns the number of pairs exported.
pub async fn run_export(
    store: &dyn StoreConnector,
    options: &ExportOptions,
    mut writer: ArchiveWriter,
) -> Result<u64, Aborted> {
    let stats = TransferStats::new();
    let mut exported = 0u64;

    let outcome = pump(store, options, &mut writer, &stats, &mut exported).await;
    let finished = writer.finish();
    stats.log_summary("export");

    if let Err(cause) = outcome {
        if let Err(e) = finished {
            warn!(error = %e, "Failed to finish archive after aborted export");
        }
        return Err(Aborted::new(exported, cause));
    }
    let summary = finished.map_err(|e| Aborted::new(exported, e))?;
    info!(
        path = %summary.path.display(),
        entries = exported,
        bytes = summary.bytes,
        "Export complete"
    );
    Ok(exported)
}

async fn pump(
    store: &dyn StoreConnector,
    options: &ExportOptions,
    sink: &mut ArchiveWriter,
    stats: &TransferStats,
    exported: &mut u64,
) -> Result<(), TransferError> {
    let window_size = resolve_window_size(store, options.window_size, options.batch_limit).await?;
    if let Some(scope) = &options.scope {
        sink.set_scope(scope)?;
    }

    let predicate = options.predicate.as_ref();
    let mut cursor = PartitionCursor::for_partitions(options.partitions.as_ref(), window_size, stats);
    let mut batch = ExportBatch::new(options.batch_limit, stats);

    while let Some((_, keys)) = cursor.next_window(store, predicate).await? {
        for key in keys {
            *exported += batch.add(key, store, sink).await?;
        }
    }
    *exported += batch.flush(store, sink).await?;
    Ok(())
}
