//! # quarry-cli
//!
//! Command-line interface for a Quarry catalog.
//!
//! ## Commands
//!
//! - `quarry create` - Create assets from a JSON file
//! - `quarry get` - Read an asset by guid or qualified name
//! - `quarry search` - Search the asset index
//! - `quarry delete` - Soft-delete assets
//! - `quarry restore` - Restore a soft-deleted asset
//! - `quarry purge` - Permanently remove assets
//! - `quarry audit` - Search the audit trail
//! - `quarry wait` - Poll search until the index reflects a change
//!
//! ## Configuration
//!
//! Flags override the `QUARRY_*` environment variables read by
//! [`quarry_core::ClientConfig::from_env`]:
//!
//! - `QUARRY_BASE_URL` - Catalog endpoint (default: `http://localhost:8080`)
//! - `QUARRY_API_TOKEN` - Bearer token
//! - `QUARRY_MAX_RETRIES` - Retry budget for transient failures and polling

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
// CLI uses print! macros intentionally
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

pub mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use quarry_core::{ClientConfig, RetryBudget};

/// Quarry CLI - catalog mutation and consistency tooling.
#[derive(Debug, Parser)]
#[command(name = "quarry")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Catalog base URL.
    #[arg(long, env = "QUARRY_BASE_URL")]
    pub base_url: Option<String>,

    /// API authentication token.
    #[arg(long, env = "QUARRY_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Maximum attempts for transient-auth retries and consistency polls.
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Output format.
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,

    /// Log format (`pretty` or `json`).
    #[arg(long, env = "QUARRY_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Get the effective configuration.
    #[must_use]
    pub fn config(&self) -> Config {
        Config {
            base_url: self.base_url.clone(),
            api_token: self.api_token.clone(),
            max_retries: self.max_retries,
            format: self.format.clone(),
        }
    }
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create assets from a JSON file.
    Create(commands::create::CreateArgs),
    /// Read an asset.
    Get(commands::get::GetArgs),
    /// Search the asset index.
    Search(commands::search::SearchArgs),
    /// Soft-delete assets by guid.
    Delete(commands::delete::DeleteArgs),
    /// Restore a soft-deleted asset.
    Restore(commands::restore::RestoreArgs),
    /// Permanently remove assets by guid.
    Purge(commands::purge::PurgeArgs),
    /// Search the audit trail.
    Audit(commands::audit::AuditArgs),
    /// Wait until search reflects a change.
    Wait(commands::wait::WaitArgs),
}

/// Output format.
#[derive(Debug, Clone, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
    /// Table output.
    Table,
}

/// CLI configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Catalog base URL override.
    pub base_url: Option<String>,
    /// API token override.
    pub api_token: Option<String>,
    /// Retry budget override.
    pub max_retries: Option<u32>,
    /// Output format.
    pub format: OutputFormat,
}

impl Config {
    /// Client configuration: environment first, then flag overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment or the overrides are invalid.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let mut config = ClientConfig::from_env().context("Invalid QUARRY_* environment")?;
        self.apply(&mut config);
        config.validate().context("Invalid client configuration")?;
        Ok(config)
    }

    fn apply(&self, config: &mut ClientConfig) {
        if let Some(url) = &self.base_url {
            config.base_url.clone_from(url);
        }
        if let Some(token) = &self.api_token {
            config.api_token = Some(token.clone());
        }
        if let Some(attempts) = self.max_retries {
            config.retry.budget = RetryBudget::new(attempts);
        }
    }
}
