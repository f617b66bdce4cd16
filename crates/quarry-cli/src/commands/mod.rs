//! Subcommand implementations and shared output helpers.

pub mod audit;
pub mod create;
pub mod delete;
pub mod get;
pub mod purge;
pub mod restore;
pub mod search;
pub mod wait;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;

use quarry_client::{CatalogClient, HttpBackend};
use quarry_core::{Asset, AssetStatus, MutationResponse};

use crate::{Config, OutputFormat};

/// Connects to the catalog; Ctrl-C cancels in-flight retries and polls.
///
/// # Errors
///
/// Returns an error if the configuration is invalid.
pub fn connect(config: &Config) -> Result<CatalogClient<HttpBackend>> {
    let client_config = config.client_config()?;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received; cancelling");
            trigger.cancel();
        }
    });
    Ok(CatalogClient::connect(client_config)
        .context("Failed to create catalog client")?
        .with_cancellation(cancel))
}

pub(crate) fn format_status_colored(status: AssetStatus) -> String {
    match status {
        AssetStatus::Active => status.as_str().green().to_string(),
        AssetStatus::Deleted => status.as_str().yellow().to_string(),
    }
}

pub(crate) fn print_assets(assets: &[Asset], format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(assets)?);
        }
        OutputFormat::Text => {
            if assets.is_empty() {
                println!("No assets");
            }
            for asset in assets {
                println!(
                    "  {} {} {}",
                    asset.type_name(),
                    asset.qualified_name,
                    format_status_colored(asset.status)
                );
                if let Some(guid) = asset.guid {
                    println!("    guid: {}", guid.dimmed());
                }
            }
        }
        OutputFormat::Table => {
            use tabled::{Table, Tabled};

            #[derive(Tabled)]
            struct AssetRow {
                #[tabled(rename = "Type")]
                type_name: String,
                #[tabled(rename = "Qualified Name")]
                qualified_name: String,
                #[tabled(rename = "Status")]
                status: String,
                #[tabled(rename = "Guid")]
                guid: String,
                #[tabled(rename = "Version")]
                version: u64,
            }

            let rows: Vec<_> = assets
                .iter()
                .map(|a| AssetRow {
                    type_name: a.type_name().to_string(),
                    qualified_name: a.qualified_name.to_string(),
                    status: a.status.to_string(),
                    guid: a.guid.map(|g| g.to_string()).unwrap_or_default(),
                    version: a.version,
                })
                .collect();

            if rows.is_empty() {
                println!("No assets");
            } else {
                println!("{}", Table::new(rows));
            }
        }
    }
    Ok(())
}

pub(crate) fn print_mutation(response: &MutationResponse, format: &OutputFormat) -> Result<()> {
    if matches!(format, OutputFormat::Json) {
        println!("{}", serde_json::to_string_pretty(response)?);
        return Ok(());
    }

    for (label, assets) in [
        ("Created", response.created_assets()),
        ("Updated", response.updated_assets()),
        ("Deleted", response.deleted_assets()),
    ] {
        if assets.is_empty() {
            continue;
        }
        println!("{label} ({}):", assets.len());
        print_assets(assets, format)?;
    }
    if response.is_empty() {
        println!("{}", "No changes".dimmed());
    }
    Ok(())
}
