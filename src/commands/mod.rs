//! Command registry
//!
//! Each subcommand is one variant of [`Command`] carrying its resolved,
//! immutable options. [`execute`] dispatches on the variant and writes the
//! command's result lines to `out`.

pub mod export;
pub mod import;
pub mod list;
pub mod size;

pub use export::ExportCommand;
pub use import::ImportCommand;
pub use list::{ListOptions, ShowMode};
pub use size::SizeOptions;

use std::io::Write;
use tracing::debug;

use crate::error::CliError;
use crate::store::StoreConnector;

#[derive(Debug, Clone)]
pub enum Command {
    Size(SizeOptions),
    List(ListOptions),
    Export(ExportCommand),
    Import(ImportCommand),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Size(_) => "size",
            Command::List(_) => "list",
            Command::Export(_) => "export",
            Command::Import(_) => "import",
        }
    }
}

/// Run `command` against `store`
pub async fn execute(
    command: &Command,
    store: &dyn StoreConnector,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    debug!(command = command.name(), "Executing command");
    match command {
        Command::Size(options) => size::run(store, options, out).await,
        Command::List(options) => list::run(store, options, out).await.map(|_| ()),
        Command::Export(options) => export::run(store, options, out).await,
        Command::Import(options) => import::run(store, options, out).await,
    }
}
