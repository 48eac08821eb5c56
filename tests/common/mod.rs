//! Common test utilities for integration tests.
//!
//! Provides a recording mock of the Management API, a counting client factory
//! and helpers for building a configured backend.

#![allow(dead_code)]
#![allow(clippy::duplicate_mod)]

use apigee_secrets::apigee::{
    ApigeeApi, ApigeeAuth, CreateCredentialsRequest, CreatedCredentials, DeleteCredentialsRequest,
};
use apigee_secrets::backend::{
    ApigeeBackend, ClientFactory, ConfigWriteRequest, RequestContext, RoleWriteRequest, TtlInput,
};
use apigee_secrets::config::EngineSettings;
use apigee_secrets::errors::{EngineError, Result};
use apigee_secrets::secrets::SecretString;
use apigee_secrets::storage::InMemoryStorage;
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A create call as seen by the mock, tagged with the host of the client that made it
#[derive(Debug, Clone)]
pub struct CreateCall {
    pub host: String,
    pub auth_mode: &'static str,
    pub request: CreateCredentialsRequest,
}

/// Calls shared by every client a [`MockFactory`] builds
#[derive(Debug, Default)]
pub struct UpstreamLog {
    pub created: Mutex<Vec<CreateCall>>,
    pub deleted: Mutex<Vec<DeleteCredentialsRequest>>,
    /// When set, deletes fail with this HTTP status
    pub delete_failure: Mutex<Option<u16>>,
    next_key: AtomicUsize,
}

impl UpstreamLog {
    pub fn created(&self) -> Vec<CreateCall> {
        self.created.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<DeleteCredentialsRequest> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn fail_deletes_with(&self, status: u16) {
        *self.delete_failure.lock().unwrap() = Some(status);
    }
}

/// Mock upstream. Its credentials blob deliberately echoes a different scope
/// so tests can tell the engine never reads scope back from the response.
#[derive(Debug)]
pub struct MockApigee {
    pub host: String,
    pub auth_mode: &'static str,
    log: Arc<UpstreamLog>,
}

#[async_trait]
impl ApigeeApi for MockApigee {
    async fn create_credentials(
        &self,
        request: &CreateCredentialsRequest,
    ) -> Result<CreatedCredentials> {
        self.log.created.lock().unwrap().push(CreateCall {
            host: self.host.clone(),
            auth_mode: self.auth_mode,
            request: request.clone(),
        });

        let n = self.log.next_key.fetch_add(1, Ordering::SeqCst) + 1;
        let key = format!("key-{}", n);
        let credentials = json!({
            "consumerKey": key,
            "status": "approved",
            "organization": "echoed-org",
            "developer": "someone-else@example.com"
        });

        Ok(CreatedCredentials {
            key,
            secret: SecretString::new(format!("secret-{}", n)),
            credentials: credentials.to_string(),
        })
    }

    async fn delete_credentials(&self, request: &DeleteCredentialsRequest) -> Result<()> {
        self.log.deleted.lock().unwrap().push(request.clone());

        match *self.log.delete_failure.lock().unwrap() {
            Some(status) => Err(EngineError::upstream(
                "delete_credentials",
                request.scope.to_string(),
                format!("HTTP {}", status),
                Some(status),
            )),
            None => Ok(()),
        }
    }
}

/// Factory that counts constructions and can be told to fail or stall
#[derive(Debug, Default)]
pub struct MockFactory {
    pub log: Arc<UpstreamLog>,
    pub constructions: AtomicUsize,
    pub failures_remaining: AtomicUsize,
    pub delay: Option<Duration>,
}

impl MockFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self { delay: Some(delay), ..Default::default() })
    }

    pub fn constructions(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self, times: usize) {
        self.failures_remaining.store(times, Ordering::SeqCst);
    }
}

#[async_trait]
impl ClientFactory for MockFactory {
    async fn create(&self, host: &str, auth: ApigeeAuth) -> Result<Arc<dyn ApigeeApi>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.constructions.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(EngineError::client_unavailable("mock construction failure"));
        }

        Ok(Arc::new(MockApigee {
            host: host.to_string(),
            auth_mode: auth.mode(),
            log: Arc::clone(&self.log),
        }))
    }
}

pub fn token_config(host: &str) -> ConfigWriteRequest {
    ConfigWriteRequest {
        host: Some(host.to_string()),
        oauth_token: Some(SecretString::new("test-token")),
        ..Default::default()
    }
}

pub fn role_request(org: &str, developer: &str, app: &str, products: &str) -> RoleWriteRequest {
    RoleWriteRequest {
        org_name: Some(org.to_string()),
        developer_email: Some(developer.to_string()),
        app_name: Some(app.to_string()),
        api_products: Some(products.to_string()),
        ttl: None,
    }
}

pub fn role_request_with_ttl(ttl: u64) -> RoleWriteRequest {
    RoleWriteRequest { ttl: Some(TtlInput::from(ttl)), ..role_request("o", "d@x.com", "a", "p") }
}

pub struct TestBackend {
    pub backend: Arc<ApigeeBackend>,
    pub factory: Arc<MockFactory>,
    pub storage: InMemoryStorage,
    pub ctx: RequestContext,
}

impl TestBackend {
    /// Backend with no configuration written yet
    pub fn new(factory: Arc<MockFactory>) -> Self {
        Self::with_settings(factory, &EngineSettings::default())
    }

    pub fn with_settings(factory: Arc<MockFactory>, settings: &EngineSettings) -> Self {
        let storage = InMemoryStorage::new();
        let backend = ApigeeBackend::with_client_factory(
            Arc::new(storage.clone()),
            settings,
            factory.clone(),
        )
        .expect("valid settings");
        Self { backend: Arc::new(backend), factory, storage, ctx: RequestContext::new() }
    }

    /// Backend with a token config and a role named `test` (o / d@x.com / a / p)
    pub async fn configured() -> Self {
        let harness = Self::new(MockFactory::new());
        harness
            .backend
            .config_write(&harness.ctx, token_config("https://c1.example.com"))
            .await
            .expect("config write");
        harness
            .backend
            .role_write(&harness.ctx, "test", role_request("o", "d@x.com", "a", "p"))
            .await
            .expect("role write");
        harness
    }

    pub fn log(&self) -> &UpstreamLog {
        &self.factory.log
    }
}
