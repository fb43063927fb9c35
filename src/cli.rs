use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use kvdump::archive::WriterOptions;
use kvdump::commands::{Command, ExportCommand, ImportCommand, ListOptions, ShowMode, SizeOptions};
use kvdump::config::Config;
use kvdump::store::{Locator, PartitionList, Predicate};
use kvdump::transfer::ExportOptions;

#[derive(Parser, Debug)]
#[command(name = "kvdump")]
#[command(about = "Bulk export and import for partitioned key-value caches", long_about = None)]
pub struct Cli {
    /// Configuration file [default: $KVDUMP_CONFIG or config/kvdump.toml]
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Target cache, e.g. fjall://data/store/people
    #[arg(short, long, value_name = "LOCATOR")]
    pub cache: Locator,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the number of entries in the cache
    Size(SizeArgs),
    /// Print keys, values or entries of the cache
    List(ListArgs),
    /// Dump cache entries into an archive file
    Export(ExportArgs),
    /// Load an archive file into the cache
    Import(ImportArgs),
}

#[derive(Args, Debug)]
pub struct FilterArgs {
    /// Filter expression, e.g. "key startswith 'user:' and not value = ''"
    #[arg(short, long, value_name = "EXPR")]
    pub filter: Option<Predicate>,
}

#[derive(Args, Debug)]
pub struct SizeArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// What to display
    #[arg(short, long, value_enum, default_value_t = ShowMode::Keys)]
    pub show: ShowMode,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Entries per bulk read
    #[arg(short, long)]
    pub batch_limit: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Archive to create
    #[arg(long, value_name = "PATH")]
    pub file: PathBuf,

    /// Replace the archive if it already exists
    #[arg(long = "override")]
    pub override_existing: bool,

    /// Entries per bulk read
    #[arg(short, long)]
    pub batch_limit: Option<usize>,

    /// Partitions per enumeration request
    #[arg(long)]
    pub partition_block: Option<u32>,

    /// Only export these partitions, e.g. 0,3,5-9
    #[arg(short, long, value_name = "LIST")]
    pub partitions: Option<PartitionList>,

    /// Archive scope to write entries under
    #[arg(long)]
    pub scope: Option<String>,

    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Archive to read
    #[arg(long, value_name = "PATH")]
    pub file: PathBuf,

    /// Entries per bulk write
    #[arg(short, long)]
    pub batch_limit: Option<usize>,
}

impl Cli {
    /// Fold command-line tuning flags into the loaded configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        let (batch_limit, partition_block) = match &self.command {
            Commands::Size(_) => (None, None),
            Commands::List(args) => (args.batch_limit, None),
            Commands::Export(args) => (args.batch_limit, args.partition_block),
            Commands::Import(args) => (args.batch_limit, None),
        };
        if let Some(limit) = batch_limit {
            config.transfer.batch_limit = limit;
        }
        if let Some(block) = partition_block {
            config.transfer.partition_block = block;
        }
    }

    /// Resolve the subcommand into an executable command
    pub fn to_command(&self, config: &Config) -> Command {
        let transfer = &config.transfer;
        match &self.command {
            Commands::Size(args) => Command::Size(SizeOptions {
                predicate: args.filter.filter.clone(),
            }),
            Commands::List(args) => Command::List(ListOptions {
                show: args.show,
                predicate: args.filter.filter.clone(),
                batch_limit: transfer.batch_limit,
                window_size: transfer.window_size(),
            }),
            Commands::Export(args) => Command::Export(ExportCommand {
                file: args.file.clone(),
                writer: WriterOptions {
                    compression_level: config.archive.compression_level,
                    override_existing: args.override_existing,
                },
                transfer: ExportOptions {
                    batch_limit: transfer.batch_limit,
                    window_size: transfer.window_size(),
                    partitions: args.partitions.clone(),
                    predicate: args.filter.filter.clone(),
                    scope: args.scope.clone(),
                },
            }),
            Commands::Import(args) => Command::Import(ImportCommand {
                file: args.file.clone(),
                batch_limit: transfer.batch_limit,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_export_flags_override_config() {
        let cli = parse(&[
            "kvdump",
            "--cache",
            "fjall://data/store/people",
            "export",
            "--file",
            "people.kvda",
            "--override",
            "--batch-limit",
            "16",
            "--partition-block",
            "4",
            "--partitions",
            "0,3,5-6",
            "--filter",
            "key startswith 'p'",
        ]);
        let mut config = Config::default();
        cli.apply_overrides(&mut config);

        let Command::Export(export) = cli.to_command(&config) else {
            panic!("expected export");
        };
        assert_eq!(export.file, PathBuf::from("people.kvda"));
        assert!(export.writer.override_existing);
        assert_eq!(export.transfer.batch_limit, 16);
        assert_eq!(export.transfer.window_size, Some(4));
        assert_eq!(
            export.transfer.partitions.unwrap().iter().collect::<Vec<_>>(),
            vec![0, 3, 5, 6]
        );
        assert!(export.transfer.predicate.is_some());
    }

    #[test]
    fn test_config_applies_without_flags() {
        let cli = parse(&["kvdump", "-c", "fjall://data/people", "import", "--file", "a.kvda"]);
        let mut config = Config::default();
        config.transfer.batch_limit = 300;
        cli.apply_overrides(&mut config);

        let Command::Import(import) = cli.to_command(&config) else {
            panic!("expected import");
        };
        assert_eq!(import.batch_limit, 300);
    }

    #[test]
    fn test_list_show_modes() {
        let cli = parse(&["kvdump", "-c", "fjall://d/c", "list", "--show", "entries"]);
        let Command::List(list) = cli.to_command(&Config::default()) else {
            panic!("expected list");
        };
        assert_eq!(list.show, ShowMode::Entries);

        let cli = parse(&["kvdump", "-c", "fjall://d/c", "list"]);
        let Command::List(list) = cli.to_command(&Config::default()) else {
            panic!("expected list");
        };
        assert_eq!(list.show, ShowMode::Keys);
    }

    #[test]
    fn test_usage_errors() {
        // bad partition list
        assert!(
            Cli::try_parse_from(["kvdump", "-c", "fjall://d/c", "export", "--file", "x", "-p", "5-1"])
                .is_err()
        );
        // bad locator
        assert!(Cli::try_parse_from(["kvdump", "-c", "nowhere", "size"]).is_err());
        // bad filter
        assert!(Cli::try_parse_from(["kvdump", "-c", "fjall://d/c", "size", "-f", "key ~ 'x'"]).is_err());
        // missing cache
        assert!(Cli::try_parse_from(["kvdump", "size"]).is_err());
    }

    #[test]
    fn test_value_errors_carry_parser_message() {
        let err = Cli::try_parse_from(["kvdump", "-c", "fjall://d/kvdump_meta", "size"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        assert!(err.to_string().contains("Cache name 'kvdump_meta' is reserved"));

        let err = Cli::try_parse_from([
            "kvdump",
            "-c",
            "fjall://d/c",
            "export",
            "--file",
            "x",
            "-p",
            "0-4000000000",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        assert!(err.to_string().contains("Invalid partition list \"0-4000000000\""));
    }
}
