//! Audit command - search the audit trail.

use anyhow::Result;
use clap::{Args, ValueEnum};

use quarry_core::{AuditAction, AuditSearchRequest, Guid, QualifiedName};

use super::connect;
use crate::{Config, OutputFormat};

/// Audit action filter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ActionArg {
    /// Creations.
    Create,
    /// Updates.
    Update,
    /// Soft deletes.
    Delete,
    /// Restores.
    Restore,
    /// Purges.
    Purge,
}

impl From<ActionArg> for AuditAction {
    fn from(value: ActionArg) -> Self {
        match value {
            ActionArg::Create => Self::EntityCreate,
            ActionArg::Update => Self::EntityUpdate,
            ActionArg::Delete => Self::EntityDelete,
            ActionArg::Restore => Self::EntityRestore,
            ActionArg::Purge => Self::EntityPurge,
        }
    }
}

/// Arguments for the audit command.
#[derive(Debug, Args)]
pub struct AuditArgs {
    /// Guid of the asset.
    #[arg(long, conflicts_with = "qualified_name", required_unless_present = "qualified_name")]
    pub guid: Option<String>,

    /// Qualified name of the asset (matches across purge and re-create).
    #[arg(long)]
    pub qualified_name: Option<String>,

    /// Restrict to these actions.
    #[arg(long = "action", value_enum)]
    pub actions: Vec<ActionArg>,

    /// Maximum number of entries.
    #[arg(long, default_value = "25")]
    pub size: usize,

    /// Wait until at least this many entries match.
    #[arg(long)]
    pub wait_for: Option<u64>,
}

impl AuditArgs {
    /// Builds the audit request these arguments describe.
    ///
    /// # Errors
    ///
    /// Returns an error if the guid or qualified name is invalid.
    pub fn to_request(&self) -> Result<AuditSearchRequest> {
        let mut request = match (&self.guid, &self.qualified_name) {
            (Some(guid), _) => AuditSearchRequest::for_guid(guid.parse::<Guid>()?),
            (None, Some(qn)) => {
                AuditSearchRequest::for_qualified_name(QualifiedName::new(qn.as_str())?)
            }
            (None, None) => anyhow::bail!("Provide --guid or --qualified-name"),
        };
        for action in &self.actions {
            request = request.with_action((*action).into());
        }
        Ok(request.with_size(self.size))
    }
}

/// Execute the audit command.
///
/// # Errors
///
/// Returns an error if the request is invalid, the search fails, or a
/// requested wait does not reach its count.
pub async fn execute(args: AuditArgs, config: &Config) -> Result<()> {
    let request = args.to_request()?;
    let client = connect(config)?;
    let response = match args.wait_for {
        Some(expected) => client
            .wait_for_audit(&request, expected)
            .await?
            .ensure_satisfied()?,
        None => client.audit(&request).await?,
    };

    match config.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("{} entries", response.total_count);
            for entry in &response.entries {
                println!(
                    "  {} {:?} {} by {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.action,
                    entry.qualified_name,
                    entry.user
                );
            }
        }
        OutputFormat::Table => {
            use tabled::{Table, Tabled};

            #[derive(Tabled)]
            struct AuditRow {
                #[tabled(rename = "Time")]
                time: String,
                #[tabled(rename = "Action")]
                action: String,
                #[tabled(rename = "Type")]
                type_name: String,
                #[tabled(rename = "Qualified Name")]
                qualified_name: String,
                #[tabled(rename = "User")]
                user: String,
            }

            let rows: Vec<_> = response
                .entries
                .iter()
                .map(|e| AuditRow {
                    time: e.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                    action: format!("{:?}", e.action),
                    type_name: e.type_name.clone(),
                    qualified_name: e.qualified_name.to_string(),
                    user: e.user.clone(),
                })
                .collect();

            if rows.is_empty() {
                println!("No audit entries");
            } else {
                println!("{}", Table::new(rows));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: AuditArgs,
    }

    #[test]
    fn test_audit_args_build_request() {
        let guid = Guid::generate().to_string();
        let cli = TestCli::parse_from([
            "test", "--guid", &guid, "--action", "delete", "--action", "restore", "--size", "5",
        ]);
        let request = cli.args.to_request().unwrap();
        assert_eq!(
            request.actions,
            vec![AuditAction::EntityDelete, AuditAction::EntityRestore]
        );
        assert_eq!(request.size, 5);
    }

    #[test]
    fn test_audit_requires_a_target() {
        assert!(TestCli::try_parse_from(["test"]).is_err());
        assert!(TestCli::try_parse_from(["test", "--qualified-name", "glossary/g"]).is_ok());
    }
}
