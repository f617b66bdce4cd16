//! Restore command - bring back a soft-deleted asset.

use anyhow::Result;
use clap::Args;
use owo_colors::OwoColorize;

use quarry_core::QualifiedName;

use super::connect;
use crate::{Config, OutputFormat};

/// Arguments for the restore command.
#[derive(Debug, Args)]
pub struct RestoreArgs {
    /// Type name of the asset.
    #[arg(long = "type")]
    pub type_name: String,

    /// Qualified name of the asset.
    #[arg(long)]
    pub qualified_name: String,
}

/// Execute the restore command.
///
/// # Errors
///
/// Returns an error if the qualified name is invalid or the request fails.
pub async fn execute(args: RestoreArgs, config: &Config) -> Result<()> {
    let qualified_name = QualifiedName::new(args.qualified_name.as_str())?;
    let client = connect(config)?;
    let restored = client.restore(&args.type_name, &qualified_name).await?;

    match config.format {
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "restored": restored }));
        }
        OutputFormat::Text | OutputFormat::Table => {
            if restored {
                println!("{} {qualified_name}", "Restored".green());
            } else {
                println!("{} {qualified_name} was not deleted", "Nothing to restore:".dimmed());
            }
        }
    }
    Ok(())
}
