//! # Structured Logging
//!
//! Subscriber setup and span macros for the secrets engine.
//!
//! Secret material (OAuth tokens, passwords, consumer secrets) is carried as
//! [`crate::secrets::SecretString`] and is never recorded as a span field.

use crate::config::ObservabilityConfig;
use crate::errors::{EngineError, Result};
use tracing_subscriber::EnvFilter;

/// Create a tracing span for a backend operation.
///
/// ```rust,ignore
/// let span = operation_span!("credential_issue", role = %name);
/// ```
#[macro_export]
macro_rules! operation_span {
    ($operation:expr) => {
        tracing::info_span!(
            "engine_operation",
            operation = %$operation,
            operation_id = %$crate::observability::logging::new_operation_id()
        )
    };
    ($operation:expr, $($field:tt)*) => {
        tracing::info_span!(
            "engine_operation",
            operation = %$operation,
            operation_id = %$crate::observability::logging::new_operation_id(),
            $($field)*
        )
    };
}

/// Create a tracing span for calls to the upstream Management API
#[macro_export]
macro_rules! upstream_span {
    ($method:expr, $path:expr) => {
        tracing::debug_span!("upstream_request", method = %$method, path = %$path)
    };
}

#[doc(hidden)]
pub fn new_operation_id() -> uuid::Uuid {
    uuid::Uuid::new_v4()
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `config.log_level`. Returns `Ok(())` if a
/// subscriber is already installed (tests, embedding hosts).
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.is_empty() => EnvFilter::try_new(directives),
        _ => EnvFilter::try_new(&config.log_level),
    }
    .map_err(|e| EngineError::configuration(format!("Invalid log filter: {}", e)))?;

    let installed = if config.json_logs {
        tracing::subscriber::set_global_default(
            tracing_subscriber::fmt().json().with_env_filter(filter).finish(),
        )
    } else {
        tracing::subscriber::set_global_default(
            tracing_subscriber::fmt().with_env_filter(filter).finish(),
        )
    };

    if installed.is_err() {
        tracing::debug!("Global subscriber already installed, keeping it");
    }

    Ok(())
}

/// Log engine settings at startup
pub fn log_settings_info(settings: &crate::config::EngineSettings) {
    tracing::info!(
        default_lease_ttl = settings.lease.default_ttl_seconds,
        max_lease_ttl = settings.lease.max_ttl_seconds,
        upstream_timeout = settings.upstream.timeout_seconds,
        json_logs = settings.observability.json_logs,
        "Apigee secrets engine configuration"
    );
}
