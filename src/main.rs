mod cli;

use clap::Parser;
use cli::Cli;
use std::io::Write;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use kvdump::commands;
use kvdump::config::Config;
use kvdump::error::CliError;
use kvdump::store;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!(code = e.code(), "Command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    let command = cli.to_command(&config);

    info!("Opening cache at: {}", cli.cache);
    let store = store::connect(&cli.cache, config.local.partition_count)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    commands::execute(&command, store.as_ref(), &mut out).await?;
    out.flush()?;
    Ok(())
}
