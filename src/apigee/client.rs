//! Upstream credential capability.
//!
//! The engine needs exactly two calls from the Apigee Management API: mint a
//! key/secret pair for a developer app, and delete a key from that app. Both
//! are expressed through the [`ApigeeApi`] trait so the lifecycle manager never
//! depends on transport or authentication details.

use crate::errors::Result;
use crate::secrets::SecretString;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the client authenticates against the Management API
#[derive(Clone, PartialEq, Eq)]
pub enum ApigeeAuth {
    /// OAuth bearer token
    Token(SecretString),
    /// HTTP basic credentials
    Basic { username: String, password: SecretString },
}

impl ApigeeAuth {
    /// Short label for logs; never includes secret material
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Token(_) => "token",
            Self::Basic { .. } => "basic",
        }
    }
}

impl fmt::Debug for ApigeeAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(_) => f.write_str("ApigeeAuth::Token([REDACTED])"),
            Self::Basic { username, .. } => f
                .debug_struct("ApigeeAuth::Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
        }
    }
}

/// The developer app a credential belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppScope {
    pub org_name: String,
    pub developer_email: String,
    pub app_name: String,
}

impl AppScope {
    pub fn new(
        org_name: impl Into<String>,
        developer_email: impl Into<String>,
        app_name: impl Into<String>,
    ) -> Self {
        Self {
            org_name: org_name.into(),
            developer_email: developer_email.into(),
            app_name: app_name.into(),
        }
    }
}

impl fmt::Display for AppScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.org_name, self.developer_email, self.app_name)
    }
}

/// Arguments for minting a credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCredentialsRequest {
    pub scope: AppScope,
    /// Comma-separated API product names
    pub api_products: String,
    /// Key lifetime; zero means no upstream expiry
    pub ttl_seconds: u64,
}

impl CreateCredentialsRequest {
    /// Product names split on commas, trimmed, empties dropped
    pub fn product_list(&self) -> Vec<String> {
        self.api_products
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Arguments for deleting a credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteCredentialsRequest {
    pub scope: AppScope,
    pub key: String,
}

/// What the upstream returns for a freshly minted credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedCredentials {
    /// Consumer key
    pub key: String,
    /// Consumer secret
    pub secret: SecretString,
    /// Opaque upstream representation of the credential
    pub credentials: String,
}

/// Upstream credential API
///
/// Implementations must be cheap to share: one instance is cached and used by
/// every concurrent request until the connection configuration changes.
#[async_trait]
pub trait ApigeeApi: Send + Sync + fmt::Debug {
    /// Mint a new key/secret for the app, granted the requested products
    async fn create_credentials(
        &self,
        request: &CreateCredentialsRequest,
    ) -> Result<CreatedCredentials>;

    /// Delete a key from the app
    async fn delete_credentials(&self, request: &DeleteCredentialsRequest) -> Result<()>;
}
