//! Wait command - poll search until the index reflects a change.

use anyhow::Result;
use clap::Args;
use owo_colors::OwoColorize;

use quarry_client::SearchExpectation;

use super::connect;
use super::search::FilterArgs;
use crate::{Config, OutputFormat};

/// Arguments for the wait command.
#[derive(Debug, Args)]
pub struct WaitArgs {
    /// Search filters.
    #[command(flatten)]
    pub filters: FilterArgs,

    /// Minimum number of matches to wait for.
    #[arg(long, default_value = "1")]
    pub min_count: u64,

    /// Also wait until no match is active (delete verification).
    #[arg(long)]
    pub deleted: bool,
}

impl WaitArgs {
    /// The expectation these arguments describe.
    #[must_use]
    pub fn expectation(&self) -> SearchExpectation {
        if self.deleted {
            SearchExpectation::all_deleted(self.min_count)
        } else {
            SearchExpectation::at_least(self.min_count)
        }
    }
}

/// Execute the wait command.
///
/// # Errors
///
/// Returns an error if the search fails, the wait is interrupted, or the
/// index does not reach the expected state within the retry budget.
pub async fn execute(args: WaitArgs, config: &Config) -> Result<()> {
    let request = args.filters.to_request()?;
    let client = connect(config)?;
    let outcome = client.wait_for_search(&request, args.expectation()).await?;

    match config.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "satisfied": outcome.satisfied,
                    "attempts": outcome.attempts,
                    "observed": outcome.observed(),
                    "expected": outcome.expected(),
                }))?
            );
        }
        OutputFormat::Text | OutputFormat::Table => {
            if outcome.satisfied {
                println!(
                    "{} {} after {} attempt(s)",
                    "Reached".green(),
                    outcome.expected(),
                    outcome.attempts
                );
            } else {
                println!(
                    "{} after {} attempt(s): observed {}, expected {}",
                    "Gave up".red(),
                    outcome.attempts,
                    outcome.observed(),
                    outcome.expected()
                );
            }
        }
    }

    outcome.ensure_satisfied()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: WaitArgs,
    }

    #[test]
    fn test_wait_args_expectation() {
        let cli = TestCli::parse_from(["test", "--qualified-name", "glossary/g", "--deleted"]);
        assert_eq!(cli.args.expectation(), SearchExpectation::all_deleted(1));

        let cli = TestCli::parse_from(["test", "--type", "Table", "--min-count", "3"]);
        assert_eq!(cli.args.expectation(), SearchExpectation::at_least(3));
    }
}
