//! Credential CLI commands

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::PathBuf;

use super::output;
use crate::backend::{ApigeeBackend, RequestContext, RevocationMetadata};

#[derive(Subcommand)]
pub enum CredsCommands {
    /// Issue a credential for a role and print the lease as JSON
    Issue {
        /// Role name
        #[arg(value_name = "ROLE")]
        role: String,
    },

    /// Revoke a credential using the revocation metadata printed at issue time
    #[command(after_help = "EXAMPLES:\n    apigee-secrets creds revoke --metadata '{\"org_name\":\"o\",\"developer_email\":\"d@x.com\",\"app_name\":\"a\",\"key\":\"k\"}'\n\n    apigee-secrets creds issue test | jq .internal > lease.json\n    apigee-secrets creds revoke --metadata-file lease.json")]
    Revoke(RevokeArgs),
}

#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct RevokeArgs {
    /// Revocation metadata as a JSON object
    #[arg(long, value_name = "JSON")]
    metadata: Option<String>,

    /// File containing the revocation metadata JSON object
    #[arg(long, value_name = "FILE")]
    metadata_file: Option<PathBuf>,
}

/// Handle creds commands
pub async fn handle_creds_command(
    command: CredsCommands,
    backend: &ApigeeBackend,
    ctx: &RequestContext,
) -> Result<()> {
    match command {
        CredsCommands::Issue { role } => {
            let lease = backend.credential_issue(ctx, &role.to_lowercase()).await?;
            output::print_json(&lease)?;
        }
        CredsCommands::Revoke(args) => {
            let metadata = load_metadata(args)?;
            backend.credential_revoke(ctx, &metadata).await?;
            println!("Credential '{}' revoked", metadata.key);
        }
    }

    Ok(())
}

fn load_metadata(args: RevokeArgs) -> Result<RevocationMetadata> {
    let raw = match (args.metadata, args.metadata_file) {
        (Some(json), _) => json,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?,
        (None, None) => anyhow::bail!("Pass --metadata or --metadata-file"),
    };

    let value: serde_json::Value =
        serde_json::from_str(&raw).context("Failed to parse revocation metadata JSON")?;
    Ok(RevocationMetadata::from_value(&value)?)
}
