//! Get command - read one asset from the authoritative store.

use anyhow::{Context, Result};
use clap::Args;

use quarry_core::{Guid, QualifiedName};

use super::{connect, print_assets};
use crate::Config;

/// Arguments for the get command.
#[derive(Debug, Args)]
pub struct GetArgs {
    /// Asset guid.
    #[arg(conflicts_with_all = ["type_name", "qualified_name"])]
    pub guid: Option<String>,

    /// Type name, for lookup by qualified name.
    #[arg(long = "type", requires = "qualified_name")]
    pub type_name: Option<String>,

    /// Qualified name, for lookup by qualified name.
    #[arg(long, requires = "type_name")]
    pub qualified_name: Option<String>,

    /// Include relationships and governance fields.
    #[arg(long)]
    pub complete: bool,
}

/// Execute the get command.
///
/// # Errors
///
/// Returns an error if neither a guid nor a qualified name is given, or the
/// asset does not exist.
pub async fn execute(args: GetArgs, config: &Config) -> Result<()> {
    let client = connect(config)?;
    let asset = match (&args.guid, &args.type_name, &args.qualified_name) {
        (Some(guid), _, _) => {
            let guid: Guid = guid.parse()?;
            client.get(guid, args.complete).await?
        }
        (None, Some(type_name), Some(qualified_name)) => {
            let qualified_name = QualifiedName::new(qualified_name.as_str())?;
            client
                .get_by_qualified_name(type_name, &qualified_name, args.complete)
                .await?
        }
        _ => anyhow::bail!("Provide a guid, or --type with --qualified-name"),
    };
    print_assets(std::slice::from_ref(&asset), &config.format).context("Failed to render asset")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: GetArgs,
    }

    #[test]
    fn test_get_by_guid() {
        let cli = TestCli::parse_from(["test", "01J0000000000000000000000A", "--complete"]);
        assert_eq!(cli.args.guid.as_deref(), Some("01J0000000000000000000000A"));
        assert!(cli.args.complete);
    }

    #[test]
    fn test_get_by_name_requires_both() {
        assert!(TestCli::try_parse_from(["test", "--type", "Table"]).is_err());
        let cli = TestCli::parse_from([
            "test",
            "--type",
            "Table",
            "--qualified-name",
            "default/pg/db/s/t",
        ]);
        assert_eq!(cli.args.type_name.as_deref(), Some("Table"));
    }
}
