use std::io::Write;

use crate::error::CliError;
use crate::store::{Predicate, StoreConnector};

#[derive(Debug, Clone, Default)]
pub struct SizeOptions {
    pub predicate: Option<Predicate>,
}

/// Print the number of entries, or of entries matching the filter
pub async fn run(
    store: &dyn StoreConnector,
    options: &SizeOptions,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let size = store.size(options.predicate.as_ref()).await?;
    writeln!(out, "{}", size)?;
    Ok(())
}
