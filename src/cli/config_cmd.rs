//! Upstream connection CLI commands

use anyhow::Result;
use clap::Subcommand;

use super::output::{self, OutputFormat};
use crate::backend::{ApigeeBackend, ConfigWriteRequest, RequestContext};
use crate::secrets::SecretString;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the configured Management API host
    Read {
        /// Output format (json or table)
        #[arg(short, long, default_value = "table", value_parser = ["json", "table"])]
        output: String,
    },

    /// Create or update the upstream connection
    #[command(
        long_about = "Create or update the Management API connection.\n\nThe first write must include --host. Later writes only change the fields given. Authentication uses --oauth-token, or --username together with --password.",
        after_help = "EXAMPLES:\n    # Token auth\n    apigee-secrets config write --host api.enterprise.apigee.com --oauth-token $TOKEN\n\n    # Read APIGEE_HOST, APIGEE_OAUTH_TOKEN, APIGEE_USERNAME, APIGEE_PASSWORD\n    apigee-secrets config write --from-env"
    )]
    Write {
        /// Management API host
        #[arg(long)]
        host: Option<String>,

        /// OAuth bearer token
        #[arg(long)]
        oauth_token: Option<String>,

        /// Basic auth username
        #[arg(long)]
        username: Option<String>,

        /// Basic auth password
        #[arg(long)]
        password: Option<String>,

        /// Fill unset fields from APIGEE_* environment variables
        #[arg(long)]
        from_env: bool,
    },

    /// Remove the upstream connection
    Delete,
}

/// Handle config commands
pub async fn handle_config_command(
    command: ConfigCommands,
    backend: &ApigeeBackend,
    ctx: &RequestContext,
) -> Result<()> {
    match command {
        ConfigCommands::Read { output } => read_config(backend, ctx, &output).await?,
        ConfigCommands::Write { host, oauth_token, username, password, from_env } => {
            let mut request = ConfigWriteRequest {
                host,
                oauth_token: oauth_token.map(SecretString::new),
                username,
                password: password.map(SecretString::new),
            };
            if from_env {
                request = with_env_fallback(request, ConfigWriteRequest::from_env());
            }
            if request.is_empty() {
                anyhow::bail!("Nothing to write: pass --host, credentials or --from-env");
            }
            backend.config_write(ctx, request).await?;
            println!("Configuration written");
        }
        ConfigCommands::Delete => {
            backend.config_delete(ctx).await?;
            println!("Configuration deleted");
        }
    }

    Ok(())
}

async fn read_config(backend: &ApigeeBackend, ctx: &RequestContext, output: &str) -> Result<()> {
    let Some(config) = backend.config_read(ctx).await? else {
        println!("No configuration found");
        return Ok(());
    };

    match OutputFormat::parse(output)? {
        OutputFormat::Json => output::print_json(&config)?,
        OutputFormat::Table => output::print_rows(&[("host", config.host)]),
    }
    Ok(())
}

/// Explicit flags win over environment values
fn with_env_fallback(flags: ConfigWriteRequest, env: ConfigWriteRequest) -> ConfigWriteRequest {
    ConfigWriteRequest {
        host: flags.host.or(env.host),
        oauth_token: flags.oauth_token.or(env.oauth_token),
        username: flags.username.or(env.username),
        password: flags.password.or(env.password),
    }
}
