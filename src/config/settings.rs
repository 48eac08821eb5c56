//! # Configuration Settings
//!
//! Defines the ambient settings for the secrets engine: lease defaults the host
//! would otherwise supply, upstream HTTP behaviour, and logging.

use crate::errors::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// 768h, the usual system-wide lease default for secrets hosts.
pub const DEFAULT_LEASE_TTL_SECONDS: u64 = 768 * 60 * 60;

/// Main engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct EngineSettings {
    /// Lease duration defaults and caps
    #[validate(nested)]
    pub lease: LeaseConfig,

    /// Upstream Management API client behaviour
    #[validate(nested)]
    pub upstream: UpstreamConfig,

    /// Logging configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl EngineSettings {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(EngineError::from)?;

        if self.lease.default_ttl_seconds > self.lease.max_ttl_seconds {
            return Err(EngineError::configuration(format!(
                "default lease TTL ({}s) exceeds max lease TTL ({}s)",
                self.lease.default_ttl_seconds, self.lease.max_ttl_seconds
            )));
        }

        Ok(())
    }

    /// Load every section from environment variables and validate the result
    pub fn from_env() -> Result<Self> {
        let settings = Self {
            lease: LeaseConfig::from_env()?,
            upstream: UpstreamConfig::from_env()?,
            observability: ObservabilityConfig::from_env()?,
        };
        settings.validate()?;
        Ok(settings)
    }
}

/// Lease durations applied to issued credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct LeaseConfig {
    /// TTL used when a role does not set its own
    #[validate(range(min = 1, message = "Default lease TTL must be at least 1 second"))]
    pub default_ttl_seconds: u64,

    /// Upper bound for any lease issued by this engine
    #[validate(range(min = 1, message = "Max lease TTL must be at least 1 second"))]
    pub max_ttl_seconds: u64,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            default_ttl_seconds: DEFAULT_LEASE_TTL_SECONDS,
            max_ttl_seconds: DEFAULT_LEASE_TTL_SECONDS,
        }
    }
}

impl LeaseConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }

    pub fn max_ttl(&self) -> Duration {
        Duration::from_secs(self.max_ttl_seconds)
    }

    /// Effective lease for a role TTL: zero means "host default", and nothing exceeds the max.
    pub fn resolve(&self, role_ttl: Duration) -> Duration {
        let requested = if role_ttl.is_zero() { self.default_ttl() } else { role_ttl };

        if requested > self.max_ttl() {
            tracing::warn!(
                requested_ttl = requested.as_secs(),
                max_ttl = self.max_ttl_seconds,
                "Lease TTL exceeds maximum, clamping"
            );
            self.max_ttl()
        } else {
            requested
        }
    }

    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            default_ttl_seconds: env_parse(
                "APIGEE_SECRETS_DEFAULT_LEASE_TTL",
                defaults.default_ttl_seconds,
            )?,
            max_ttl_seconds: env_parse("APIGEE_SECRETS_MAX_LEASE_TTL", defaults.max_ttl_seconds)?,
        })
    }
}

/// Upstream HTTP client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct UpstreamConfig {
    /// Per-request timeout in seconds
    #[validate(range(min = 1, max = 300, message = "Timeout must be between 1 and 300 seconds"))]
    pub timeout_seconds: u64,

    /// User-Agent sent to the Management API
    #[validate(length(min = 1, message = "User agent cannot be empty"))]
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            user_agent: format!("{}/{}", crate::APP_NAME, crate::VERSION),
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            timeout_seconds: env_parse("APIGEE_SECRETS_HTTP_TIMEOUT", defaults.timeout_seconds)?,
            user_agent: std::env::var("APIGEE_SECRETS_USER_AGENT")
                .unwrap_or(defaults.user_agent),
        })
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ObservabilityConfig {
    /// Default filter directive when RUST_LOG is unset
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Emit JSON lines instead of human-readable output
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { log_level: "info".to_string(), json_logs: false }
    }
}

impl ObservabilityConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            log_level: std::env::var("APIGEE_SECRETS_LOG_LEVEL").unwrap_or(defaults.log_level),
            json_logs: env_parse("APIGEE_SECRETS_LOG_JSON", defaults.json_logs)?,
        })
    }
}

fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| EngineError::configuration(format!("Invalid {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}
