//! # Credential Lifecycle Manager
//!
//! Turns a role into a freshly minted key/secret and, later, deletes exactly
//! that key again using nothing but the revocation metadata handed back by
//! the host.
//!
//! The public lease payload and the internal revocation metadata are both
//! built from one [`IssuedCredential`] in a single call, so they cannot drift.
//! Revocation never needs the secret or the credentials blob.

use super::client_cache::ClientCache;
use super::context::RequestContext;
use super::roles::Role;
use crate::apigee::{AppScope, CreateCredentialsRequest, DeleteCredentialsRequest};
use crate::errors::{EngineError, Result};
use crate::secrets::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Secret type the host records on every lease this engine returns
pub const SECRET_TYPE: &str = "apigee_secret";

/// A credential as minted for one role. Never persisted by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedCredential {
    pub org_name: String,
    pub developer_email: String,
    pub app_name: String,
    pub api_products: String,
    pub key: String,
    #[serde(with = "crate::secrets::exposed")]
    pub secret: SecretString,
    /// Opaque upstream representation of the key
    pub credentials: String,
}

impl IssuedCredential {
    /// Just enough to delete this credential later
    pub fn revocation_metadata(&self) -> RevocationMetadata {
        RevocationMetadata {
            org_name: self.org_name.clone(),
            developer_email: self.developer_email.clone(),
            app_name: self.app_name.clone(),
            key: self.key.clone(),
        }
    }

    /// Split into the lease the host tracks: full public data plus internal revocation data
    pub fn package(self, lease_ttl: Duration) -> CredentialLease {
        let internal = self.revocation_metadata();
        CredentialLease {
            secret_type: SECRET_TYPE.to_string(),
            data: self,
            internal,
            ttl_seconds: lease_ttl.as_secs(),
        }
    }
}

/// Fields the host stores on the lease and returns when it is revoked
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevocationMetadata {
    pub org_name: String,
    pub developer_email: String,
    pub app_name: String,
    pub key: String,
}

impl RevocationMetadata {
    const FIELDS: [&'static str; 4] = ["org_name", "developer_email", "app_name", "key"];

    /// Decode lease internal data. Missing or null fields become empty strings so
    /// cleanup can still be attempted; a field of the wrong type is rejected.
    pub fn from_internal_data(data: &Map<String, Value>) -> Result<Self> {
        for field in Self::FIELDS {
            match data.get(field) {
                None | Some(Value::Null) | Some(Value::String(_)) => {}
                Some(_) => {
                    return Err(EngineError::validation_field(
                        format!("invalid value for {} in secret internal data", field),
                        field,
                    ))
                }
            }
        }

        let text = |field: &str| {
            data.get(field).and_then(Value::as_str).unwrap_or_default().to_string()
        };
        Ok(Self {
            org_name: text("org_name"),
            developer_email: text("developer_email"),
            app_name: text("app_name"),
            key: text("key"),
        })
    }

    /// Decode from any JSON value; only objects are accepted
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Object(map) => Self::from_internal_data(map),
            Value::Null => Ok(Self::default()),
            _ => Err(EngineError::validation("secret internal data must be a JSON object")),
        }
    }

    pub fn scope(&self) -> AppScope {
        AppScope::new(&self.org_name, &self.developer_email, &self.app_name)
    }
}

/// What a successful issue hands to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialLease {
    pub secret_type: String,
    pub data: IssuedCredential,
    pub internal: RevocationMetadata,
    pub ttl_seconds: u64,
}

impl CredentialLease {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

#[derive(Debug, Clone)]
pub struct CredentialManager {
    clients: Arc<ClientCache>,
}

impl CredentialManager {
    pub fn new(clients: Arc<ClientCache>) -> Self {
        Self { clients }
    }

    /// Mint a credential for `role`. The scope fields in the result are the role's,
    /// not whatever the upstream echoed back.
    pub async fn issue(
        &self,
        ctx: &RequestContext,
        role: &Role,
        lease_ttl: Duration,
    ) -> Result<IssuedCredential> {
        let client = self.clients.get_or_create(ctx).await?;

        let request = CreateCredentialsRequest {
            scope: AppScope::new(&role.org_name, &role.developer_email, &role.app_name),
            api_products: role.api_products.clone(),
            ttl_seconds: lease_ttl.as_secs(),
        };
        let created = ctx.run("create_credentials", client.create_credentials(&request)).await?;

        info!(
            scope = %request.scope,
            key = %created.key,
            ttl_seconds = request.ttl_seconds,
            "Issued credential"
        );

        Ok(IssuedCredential {
            org_name: role.org_name.clone(),
            developer_email: role.developer_email.clone(),
            app_name: role.app_name.clone(),
            api_products: role.api_products.clone(),
            key: created.key,
            secret: created.secret,
            credentials: created.credentials,
        })
    }

    /// Delete the credential described by `metadata`. Every failure is surfaced
    /// as a revocation error; nothing is retried or suppressed here.
    pub async fn revoke(&self, ctx: &RequestContext, metadata: &RevocationMetadata) -> Result<()> {
        let request =
            DeleteCredentialsRequest { scope: metadata.scope(), key: metadata.key.clone() };

        let outcome = async {
            let client = self.clients.get_or_create(ctx).await?;
            ctx.run("delete_credentials", client.delete_credentials(&request)).await
        }
        .await;

        match outcome {
            Ok(()) => {
                info!(scope = %request.scope, key = %request.key, "Revoked credential");
                Ok(())
            }
            Err(e) => {
                warn!(
                    scope = %request.scope,
                    key = %request.key,
                    upstream_status = ?e.upstream_status(),
                    error = %e,
                    "Credential revocation failed"
                );
                Err(EngineError::revocation(&metadata.key, e))
            }
        }
    }
}
