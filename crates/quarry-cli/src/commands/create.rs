//! Create command - create assets from a JSON definition file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use quarry_core::Asset;

use super::{connect, print_mutation};
use crate::Config;

/// Arguments for the create command.
#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Path to a JSON file holding one asset definition or an array of them.
    #[arg(long, short = 'f')]
    pub file: PathBuf,
}

/// Execute the create command.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or the catalog
/// rejects the batch.
pub async fn execute(args: CreateArgs, config: &Config) -> Result<()> {
    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read definitions file: {:?}", args.file))?;
    let assets = parse_definitions(&content)?;

    let client = connect(config)?;
    let response = client
        .create_all(assets)
        .await
        .context("Create failed")?;
    print_mutation(&response, &config.format)
}

fn parse_definitions(content: &str) -> Result<Vec<Asset>> {
    let value: serde_json::Value =
        serde_json::from_str(content).context("Failed to parse definitions JSON")?;
    let assets = if value.is_array() {
        serde_json::from_value(value)
    } else {
        serde_json::from_value(value).map(|asset| vec![asset])
    };
    assets.context("Definitions do not describe assets")
}
