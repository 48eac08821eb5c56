//! # Configuration Store
//!
//! Persists the upstream connection under the `config` key. Auth completeness
//! is deliberately not checked on write; an incomplete record is accepted and
//! surfaces as a configuration error the first time a client is built from it.

use super::context::RequestContext;
use crate::apigee::ApigeeAuth;
use crate::errors::{EngineError, Result};
use crate::secrets::SecretString;
use crate::storage::{Storage, StorageEntry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const CONFIG_STORAGE_PATH: &str = "config";

/// Persisted upstream connection settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub host: String,

    #[serde(default, with = "crate::secrets::exposed")]
    pub oauth_token: SecretString,

    #[serde(default)]
    pub username: String,

    #[serde(default, with = "crate::secrets::exposed")]
    pub password: SecretString,
}

impl ConnectionConfig {
    /// Check the record is usable and pick the auth mode. A token wins over basic credentials.
    pub fn validate(&self) -> Result<ApigeeAuth> {
        if self.host.trim().is_empty() {
            return Err(EngineError::configuration("client host was not defined"));
        }

        if !self.oauth_token.is_empty() {
            return Ok(ApigeeAuth::Token(self.oauth_token.clone()));
        }

        if !self.username.is_empty() && !self.password.is_empty() {
            return Ok(ApigeeAuth::Basic {
                username: self.username.clone(),
                password: self.password.clone(),
            });
        }

        Err(EngineError::configuration(
            "client oauth_token or username and password was not defined",
        ))
    }

    /// Overlay the fields present in `request`
    pub fn merge(&mut self, request: &ConfigWriteRequest) {
        if let Some(host) = &request.host {
            self.host = host.clone();
        }
        if let Some(token) = &request.oauth_token {
            self.oauth_token = token.clone();
        }
        if let Some(username) = &request.username {
            self.username = username.clone();
        }
        if let Some(password) = &request.password {
            self.password = password.clone();
        }
    }
}

/// Administrative write; unset fields are left untouched on update
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConfigWriteRequest {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub oauth_token: Option<SecretString>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<SecretString>,
}

impl ConfigWriteRequest {
    /// Bootstrap from `APIGEE_HOST`, `APIGEE_OAUTH_TOKEN`, `APIGEE_USERNAME` and `APIGEE_PASSWORD`.
    /// Unset or empty variables are treated as not supplied.
    pub fn from_env() -> Self {
        fn var(name: &str) -> Option<String> {
            std::env::var(name).ok().filter(|v| !v.is_empty())
        }

        Self {
            host: var("APIGEE_HOST"),
            oauth_token: var("APIGEE_OAUTH_TOKEN").map(SecretString::new),
            username: var("APIGEE_USERNAME"),
            password: var("APIGEE_PASSWORD").map(SecretString::new),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.host.is_none()
            && self.oauth_token.is_none()
            && self.username.is_none()
            && self.password.is_none()
    }
}

/// Read-back view. Only the host is ever echoed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigReadResponse {
    pub host: String,
}

impl From<&ConnectionConfig> for ConfigReadResponse {
    fn from(config: &ConnectionConfig) -> Self {
        Self { host: config.host.clone() }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    storage: Arc<dyn Storage>,
}

impl ConfigStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn get(&self, ctx: &RequestContext) -> Result<Option<ConnectionConfig>> {
        let entry = ctx.run("config_get", self.storage.get(CONFIG_STORAGE_PATH)).await?;
        entry.map(|e| e.decode_json()).transpose()
    }

    pub async fn put(&self, ctx: &RequestContext, config: &ConnectionConfig) -> Result<()> {
        let entry = StorageEntry::json(CONFIG_STORAGE_PATH, config)?;
        ctx.run("config_put", self.storage.put(entry)).await
    }

    pub async fn delete(&self, ctx: &RequestContext) -> Result<()> {
        ctx.run("config_delete", self.storage.delete(CONFIG_STORAGE_PATH)).await
    }
}
