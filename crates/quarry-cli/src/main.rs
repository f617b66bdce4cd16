//! Quarry CLI - Command-line interface for catalog operations.
//!
//! The main entry point for the `quarry` CLI binary.

use anyhow::Result;
use clap::Parser;

use quarry_cli::{Cli, Commands};
use quarry_core::{LogFormat, init_logging};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format.parse::<LogFormat>()?);
    quarry_client::metrics::register_metrics();
    let config = cli.config();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        match cli.command {
            Commands::Create(args) => quarry_cli::commands::create::execute(args, &config).await,
            Commands::Get(args) => quarry_cli::commands::get::execute(args, &config).await,
            Commands::Search(args) => quarry_cli::commands::search::execute(args, &config).await,
            Commands::Delete(args) => quarry_cli::commands::delete::execute(args, &config).await,
            Commands::Restore(args) => quarry_cli::commands::restore::execute(args, &config).await,
            Commands::Purge(args) => quarry_cli::commands::purge::execute(args, &config).await,
            Commands::Audit(args) => quarry_cli::commands::audit::execute(args, &config).await,
            Commands::Wait(args) => quarry_cli::commands::wait::execute(args, &config).await,
        }
    })
}
