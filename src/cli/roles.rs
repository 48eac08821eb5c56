//! Role CLI commands

use anyhow::Result;
use clap::Subcommand;

use super::output::{self, OutputFormat};
use crate::backend::{ApigeeBackend, RequestContext, RoleWriteRequest, TtlInput};

#[derive(Subcommand)]
pub enum RoleCommands {
    /// Create or replace a role
    #[command(
        long_about = "Create or replace a role.\n\nEvery scope flag is required on every write; a role cannot be partially updated.",
        after_help = "EXAMPLES:\n    apigee-secrets role write test --org-name my-org --developer-email dev@example.com \\\n        --app-name my-app --api-products gold,silver --ttl 24h"
    )]
    Write {
        /// Role name
        #[arg(value_name = "NAME")]
        name: String,

        #[arg(long)]
        org_name: Option<String>,

        #[arg(long)]
        developer_email: Option<String>,

        #[arg(long)]
        app_name: Option<String>,

        /// Comma-separated API product names
        #[arg(long)]
        api_products: Option<String>,

        /// Lease TTL as seconds or a duration such as 90m or 24h
        #[arg(long)]
        ttl: Option<String>,
    },

    /// Show a role
    Read {
        #[arg(value_name = "NAME")]
        name: String,

        /// Output format (json or table)
        #[arg(short, long, default_value = "table", value_parser = ["json", "table"])]
        output: String,
    },

    /// Delete a role
    Delete {
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// List role names
    List {
        /// Output format (json or table)
        #[arg(short, long, default_value = "table", value_parser = ["json", "table"])]
        output: String,
    },
}

/// Handle role commands
pub async fn handle_role_command(
    command: RoleCommands,
    backend: &ApigeeBackend,
    ctx: &RequestContext,
) -> Result<()> {
    match command {
        RoleCommands::Write { name, org_name, developer_email, app_name, api_products, ttl } => {
            let request = RoleWriteRequest {
                org_name,
                developer_email,
                app_name,
                api_products,
                ttl: ttl.map(TtlInput::Text),
            };
            backend.role_write(ctx, &name, request).await?;
            println!("Role '{}' written", name);
        }
        RoleCommands::Read { name, output } => {
            let Some(role) = backend.role_read(ctx, &name).await? else {
                anyhow::bail!("Role '{}' not found", name);
            };
            match OutputFormat::parse(&output)? {
                OutputFormat::Json => output::print_json(&role)?,
                OutputFormat::Table => output::print_rows(&[
                    ("org_name", role.org_name),
                    ("developer_email", role.developer_email),
                    ("app_name", role.app_name),
                    ("api_products", role.api_products),
                    ("ttl", role.ttl.to_string()),
                ]),
            }
        }
        RoleCommands::Delete { name } => {
            backend.role_delete(ctx, &name).await?;
            println!("Role '{}' deleted", name);
        }
        RoleCommands::List { output } => {
            let names = backend.role_list(ctx).await?;
            match OutputFormat::parse(&output)? {
                OutputFormat::Json => output::print_json(&names)?,
                OutputFormat::Table if names.is_empty() => println!("No roles found"),
                OutputFormat::Table => names.iter().for_each(|n| println!("{}", n)),
            }
        }
    }

    Ok(())
}
