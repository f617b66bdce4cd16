//! Delete command - soft-delete assets.

use anyhow::Result;
use clap::Args;

use quarry_core::Guid;

use super::{connect, print_mutation};
use crate::Config;

/// Arguments for the delete command.
#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Guids of the assets to delete.
    #[arg(required = true)]
    pub guids: Vec<String>,
}

/// Parses guid arguments.
///
/// # Errors
///
/// Returns an error naming the first invalid guid.
pub fn parse_guids(raw: &[String]) -> Result<Vec<Guid>> {
    raw.iter()
        .map(|g| g.parse::<Guid>().map_err(anyhow::Error::from))
        .collect()
}

/// Execute the delete command.
///
/// # Errors
///
/// Returns an error if a guid is invalid or does not resolve.
pub async fn execute(args: DeleteArgs, config: &Config) -> Result<()> {
    let guids = parse_guids(&args.guids)?;
    let client = connect(config)?;
    let response = client.delete(&guids).await?;
    print_mutation(&response, &config.format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_guids() {
        let guid = Guid::generate();
        let parsed = parse_guids(&[guid.to_string()]).unwrap();
        assert_eq!(parsed, vec![guid]);
        assert!(parse_guids(&["not-a-guid".to_string()]).is_err());
    }

    #[test]
    fn test_delete_requires_a_guid() {
        use clap::Parser;

        #[derive(Parser)]
        struct TestCli {
            #[command(flatten)]
            args: DeleteArgs,
        }

        assert!(TestCli::try_parse_from(["test"]).is_err());
    }
}
