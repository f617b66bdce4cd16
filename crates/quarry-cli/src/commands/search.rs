//! Search command - query the asset index.

use anyhow::Result;
use clap::{Args, ValueEnum};

use quarry_core::search::Filter;
use quarry_core::{AssetStatus, QualifiedName, SearchRequest};

use super::{connect, print_assets};
use crate::{Config, OutputFormat};

/// Status filter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    /// Live assets.
    Active,
    /// Soft-deleted assets.
    Deleted,
}

impl From<StatusArg> for AssetStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Active => Self::Active,
            StatusArg::Deleted => Self::Deleted,
        }
    }
}

/// Filters shared by `search` and `wait`.
#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Restrict to a type name.
    #[arg(long = "type")]
    pub type_name: Option<String>,

    /// Restrict to one qualified name.
    #[arg(long)]
    pub qualified_name: Option<String>,

    /// Restrict to assets scoped under this qualified-name prefix.
    #[arg(long)]
    pub scope: Option<String>,

    /// Restrict to a lifecycle status.
    #[arg(long, value_enum)]
    pub status: Option<StatusArg>,
}

impl FilterArgs {
    /// Builds the search request these filters describe.
    ///
    /// # Errors
    ///
    /// Returns an error if the qualified name is invalid.
    pub fn to_request(&self) -> Result<SearchRequest> {
        let mut request = SearchRequest::new();
        if let Some(type_name) = &self.type_name {
            request = request.with_filter(Filter::TypeName(type_name.clone()));
        }
        if let Some(qualified_name) = &self.qualified_name {
            request = request.with_filter(Filter::QualifiedName(QualifiedName::new(
                qualified_name.as_str(),
            )?));
        }
        if let Some(scope) = &self.scope {
            request = request.with_filter(Filter::WithinScope(scope.clone()));
        }
        if let Some(status) = self.status {
            request = request.with_filter(Filter::Status(status.into()));
        }
        Ok(request)
    }
}

/// Arguments for the search command.
#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Search filters.
    #[command(flatten)]
    pub filters: FilterArgs,

    /// Maximum number of assets to return.
    #[arg(long, default_value = "50")]
    pub limit: usize,

    /// Offset of the first returned asset.
    #[arg(long, default_value = "0")]
    pub from: usize,
}

/// Execute the search command.
///
/// # Errors
///
/// Returns an error if the filters are invalid or the search fails.
pub async fn execute(args: SearchArgs, config: &Config) -> Result<()> {
    let request = args.filters.to_request()?.with_page(args.from, args.limit);
    let client = connect(config)?;
    let response = client.search(&request).await?;

    if matches!(config.format, OutputFormat::Json) {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }
    println!(
        "{} matches ({} active)",
        response.approximate_count,
        response.active_count
    );
    print_assets(&response.assets, &config.format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: SearchArgs,
    }

    #[test]
    fn test_search_args_build_request() {
        let cli = TestCli::parse_from([
            "test",
            "--type",
            "Table",
            "--scope",
            "default/pg",
            "--status",
            "deleted",
            "--limit",
            "5",
        ]);
        assert_eq!(cli.args.limit, 5);

        let request = cli.args.filters.to_request().unwrap();
        assert_eq!(request.filters.len(), 3);
        assert!(request
            .filters
            .contains(&Filter::Status(AssetStatus::Deleted)));
    }

    #[test]
    fn test_invalid_qualified_name_is_rejected() {
        let filters = FilterArgs {
            qualified_name: Some(String::new()),
            ..Default::default()
        };
        assert!(filters.to_request().is_err());
    }
}
