//! # Command Line Interface
//!
//! Operator tooling for the secrets engine over a file-backed store: manage the
//! upstream connection and roles, issue credentials and revoke them again.

pub mod config_cmd;
pub mod creds;
pub mod output;
pub mod roles;

use crate::backend::{ApigeeBackend, RequestContext};
use crate::config::EngineSettings;
use crate::observability::{init_logging, log_settings_info};
use crate::storage::FileStorage;
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "apigee-secrets")]
#[command(about = "Dynamic Apigee credentials: configuration, roles, issue and revoke")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding the engine's persisted state
    #[arg(
        long,
        global = true,
        env = "APIGEE_SECRETS_DATA_DIR",
        default_value = "./.apigee-secrets"
    )]
    pub data_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Abort the command after this many seconds
    #[arg(long, global = true, value_name = "SECONDS")]
    pub timeout: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upstream connection commands
    Config {
        #[command(subcommand)]
        command: config_cmd::ConfigCommands,
    },

    /// Role management commands
    Role {
        #[command(subcommand)]
        command: roles::RoleCommands,
    },

    /// Credential issue and revoke commands
    Creds {
        #[command(subcommand)]
        command: creds::CredsCommands,
    },
}

/// Run CLI commands
pub async fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = EngineSettings::from_env()?;
    if cli.verbose {
        settings.observability.log_level = "debug".to_string();
    }
    init_logging(&settings.observability)?;
    log_settings_info(&settings);

    let storage = FileStorage::open(&cli.data_dir)
        .await
        .with_context(|| format!("Failed to open data directory {}", cli.data_dir.display()))?;
    let backend = ApigeeBackend::new(Arc::new(storage), &settings)?;
    let ctx = request_context(cli.timeout);

    match cli.command {
        Commands::Config { command } => {
            config_cmd::handle_config_command(command, &backend, &ctx).await?
        }
        Commands::Role { command } => roles::handle_role_command(command, &backend, &ctx).await?,
        Commands::Creds { command } => creds::handle_creds_command(command, &backend, &ctx).await?,
    }

    Ok(())
}

/// Context for one CLI invocation: Ctrl-C cancels, `--timeout` sets the deadline
fn request_context(timeout: Option<u64>) -> RequestContext {
    let token = CancellationToken::new();
    let on_interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    let ctx = RequestContext::new().with_cancellation(token);
    match timeout {
        Some(secs) => ctx.with_timeout(Duration::from_secs(secs)),
        None => ctx,
    }
}
