//! # Apigee Secrets Backend
//!
//! [`ApigeeBackend`] wires the configuration store, role store, client cache
//! and credential manager together and exposes the logical operations a host
//! delegates to this engine. Path-based routing lives in [`dispatch`].

pub mod client_cache;
pub mod config_store;
pub mod context;
pub mod credentials;
pub mod dispatch;
pub mod roles;

pub use client_cache::{ClientCache, ClientFactory, HttpClientFactory};
pub use config_store::{
    ConfigReadResponse, ConfigStore, ConfigWriteRequest, ConnectionConfig, CONFIG_STORAGE_PATH,
};
pub use context::RequestContext;
pub use credentials::{
    CredentialLease, CredentialManager, IssuedCredential, RevocationMetadata, SECRET_TYPE,
};
pub use dispatch::{Operation, Request, Response};
pub use roles::{Role, RoleResponse, RoleStore, RoleWriteRequest, TtlInput, ROLE_STORAGE_PREFIX};

use crate::config::EngineSettings;
use crate::errors::{EngineError, Result};
use crate::storage::Storage;
use std::sync::Arc;
use tracing::{debug, info, Instrument};

/// Backend-wide help text
pub const BACKEND_HELP: &str =
    "The Apigee secrets backend dynamically generates Apigee credentials.";

/// Storage keys the host should seal-wrap
pub const SEAL_WRAP_PATHS: [&str; 2] = ["config", "roles/*"];

#[derive(Debug)]
pub struct ApigeeBackend {
    settings: EngineSettings,
    config: ConfigStore,
    roles: RoleStore,
    clients: Arc<ClientCache>,
    credentials: CredentialManager,
}

impl ApigeeBackend {
    /// Backend talking to the real Management API over HTTP
    pub fn new(storage: Arc<dyn Storage>, settings: &EngineSettings) -> Result<Self> {
        let factory = Arc::new(HttpClientFactory::new(settings.upstream.clone()));
        Self::with_client_factory(storage, settings, factory)
    }

    /// Backend with a caller-supplied client factory
    pub fn with_client_factory(
        storage: Arc<dyn Storage>,
        settings: &EngineSettings,
        factory: Arc<dyn ClientFactory>,
    ) -> Result<Self> {
        settings.validate()?;

        let config = ConfigStore::new(Arc::clone(&storage));
        let roles = RoleStore::new(storage);
        let clients = Arc::new(ClientCache::new(config.clone(), factory));
        let credentials = CredentialManager::new(Arc::clone(&clients));

        Ok(Self { settings: settings.clone(), config, roles, clients, credentials })
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn client_cache(&self) -> &Arc<ClientCache> {
        &self.clients
    }

    /// Connection read-back; `None` when nothing is configured
    pub async fn config_read(&self, ctx: &RequestContext) -> Result<Option<ConfigReadResponse>> {
        let config = self.config.get(ctx).instrument(crate::operation_span!("config_read")).await?;
        Ok(config.as_ref().map(ConfigReadResponse::from))
    }

    /// Create or merge-update the connection. The cached client is dropped
    /// before the new configuration is stored.
    pub async fn config_write(
        &self,
        ctx: &RequestContext,
        request: ConfigWriteRequest,
    ) -> Result<()> {
        async {
            let (config, created) = self
                .clients
                .invalidate_with(async {
                    let (mut config, created) = match self.config.get(ctx).await? {
                        Some(existing) => (existing, false),
                        None if request.host.is_none() => {
                            return Err(EngineError::validation_field(
                                "missing host in configuration",
                                "host",
                            ))
                        }
                        None => (ConnectionConfig::default(), true),
                    };

                    config.merge(&request);
                    self.config.put(ctx, &config).await?;
                    Ok((config, created))
                })
                .await?;

            info!(host = %config.host, created, "Stored upstream configuration");
            Ok::<(), EngineError>(())
        }
        .instrument(crate::operation_span!("config_write"))
        .await
    }

    pub async fn config_delete(&self, ctx: &RequestContext) -> Result<()> {
        async {
            self.clients.invalidate_with(self.config.delete(ctx)).await?;
            info!("Deleted upstream configuration");
            Ok::<(), EngineError>(())
        }
        .instrument(crate::operation_span!("config_delete"))
        .await
    }

    /// Full replace of a role. Nothing is written unless every scope field is present.
    pub async fn role_write(
        &self,
        ctx: &RequestContext,
        name: &str,
        request: RoleWriteRequest,
    ) -> Result<()> {
        async {
            roles::validate_role_name(name)?;
            let role = request.into_role()?;
            self.roles.put(ctx, name, &role).await?;
            info!(ttl_seconds = role.ttl.as_secs(), "Stored role");
            Ok::<(), EngineError>(())
        }
        .instrument(crate::operation_span!("role_write", role = %name))
        .await
    }

    pub async fn role_read(
        &self,
        ctx: &RequestContext,
        name: &str,
    ) -> Result<Option<RoleResponse>> {
        let role = self
            .roles
            .get(ctx, name)
            .instrument(crate::operation_span!("role_read", role = %name))
            .await?;
        Ok(role.as_ref().map(RoleResponse::from))
    }

    pub async fn role_delete(&self, ctx: &RequestContext, name: &str) -> Result<()> {
        async {
            self.roles.delete(ctx, name).await?;
            info!("Deleted role");
            Ok::<(), EngineError>(())
        }
        .instrument(crate::operation_span!("role_delete", role = %name))
        .await
    }

    pub async fn role_list(&self, ctx: &RequestContext) -> Result<Vec<String>> {
        self.roles.list(ctx).instrument(crate::operation_span!("role_list")).await
    }

    /// Mint a credential for the named role and package it as a lease
    pub async fn credential_issue(
        &self,
        ctx: &RequestContext,
        role_name: &str,
    ) -> Result<CredentialLease> {
        async {
            let role = self
                .roles
                .get(ctx, role_name)
                .await?
                .ok_or_else(|| EngineError::not_found("role", role_name))?;

            let ttl = self.settings.lease.resolve(role.ttl);
            let issued = self.credentials.issue(ctx, &role, ttl).await?;
            Ok::<_, EngineError>(issued.package(ttl))
        }
        .instrument(crate::operation_span!("credential_issue", role = %role_name))
        .await
    }

    /// Delete the credential a lease refers to
    pub async fn credential_revoke(
        &self,
        ctx: &RequestContext,
        metadata: &RevocationMetadata,
    ) -> Result<()> {
        self.credentials
            .revoke(ctx, metadata)
            .instrument(crate::operation_span!("credential_revoke", key = %metadata.key))
            .await
    }

    /// Host notification that a storage key changed outside this process
    pub async fn invalidate_key(&self, key: &str) {
        if key == CONFIG_STORAGE_PATH {
            self.clients.invalidate().await;
        } else {
            debug!(key, "Ignoring invalidation for key");
        }
    }
}
