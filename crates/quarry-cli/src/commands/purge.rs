//! Purge command - permanently remove assets.

use anyhow::Result;
use clap::Args;
use owo_colors::OwoColorize;

use super::delete::parse_guids;
use super::{connect, print_mutation};
use crate::Config;

/// Arguments for the purge command.
#[derive(Debug, Args)]
pub struct PurgeArgs {
    /// Guids of the assets to purge.
    #[arg(required = true)]
    pub guids: Vec<String>,

    /// Confirm that the removal is permanent.
    #[arg(long)]
    pub yes: bool,
}

/// Execute the purge command.
///
/// # Errors
///
/// Returns an error if `--yes` is missing, a guid is invalid, or a guid
/// does not resolve.
pub async fn execute(args: PurgeArgs, config: &Config) -> Result<()> {
    if !args.yes {
        eprintln!("{}", "Purge cannot be undone.".red());
        anyhow::bail!("Re-run with --yes to purge {} asset(s)", args.guids.len());
    }
    let guids = parse_guids(&args.guids)?;
    let client = connect(config)?;
    let response = client.purge(&guids).await?;
    print_mutation(&response, &config.format)
}
