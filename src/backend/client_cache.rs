//! # Client Cache
//!
//! Holds at most one upstream client, built lazily from the stored connection
//! configuration and dropped whenever that configuration changes.
//!
//! Acquisition is double-checked under a single `RwLock`: steady-state callers
//! only take the read lock, and the write lock is held across configuration
//! load and construction so a concurrent burst after invalidation builds one
//! client, not one per caller. Failed constructions are not cached; the next
//! call starts over.

use super::config_store::{ConfigStore, ConnectionConfig};
use super::context::RequestContext;
use crate::apigee::{ApigeeApi, ApigeeAuth, ApigeeHttpClient};
use crate::config::UpstreamConfig;
use crate::errors::{EngineError, Result};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Builds an upstream client from a validated connection
#[async_trait]
pub trait ClientFactory: Send + Sync + fmt::Debug {
    async fn create(&self, host: &str, auth: ApigeeAuth) -> Result<Arc<dyn ApigeeApi>>;
}

/// Production factory producing [`ApigeeHttpClient`]s
#[derive(Debug, Clone, Default)]
pub struct HttpClientFactory {
    options: UpstreamConfig,
}

impl HttpClientFactory {
    pub fn new(options: UpstreamConfig) -> Self {
        Self { options }
    }
}

#[async_trait]
impl ClientFactory for HttpClientFactory {
    async fn create(&self, host: &str, auth: ApigeeAuth) -> Result<Arc<dyn ApigeeApi>> {
        Ok(Arc::new(ApigeeHttpClient::new(host, auth, &self.options)?))
    }
}

pub struct ClientCache {
    config: ConfigStore,
    factory: Arc<dyn ClientFactory>,
    client: RwLock<Option<Arc<dyn ApigeeApi>>>,
}

impl fmt::Debug for ClientCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCache").field("factory", &self.factory).finish_non_exhaustive()
    }
}

impl ClientCache {
    pub fn new(config: ConfigStore, factory: Arc<dyn ClientFactory>) -> Self {
        Self { config, factory, client: RwLock::new(None) }
    }

    /// Return the cached client, building one from the current configuration if needed
    pub async fn get_or_create(&self, ctx: &RequestContext) -> Result<Arc<dyn ApigeeApi>> {
        {
            let cached = self.client.read().await;
            if let Some(client) = cached.as_ref() {
                debug!("Client cache hit");
                return Ok(Arc::clone(client));
            }
        }

        let mut slot = self.client.write().await;
        if let Some(client) = slot.as_ref() {
            debug!("Client cache hit after acquiring write lock");
            return Ok(Arc::clone(client));
        }

        debug!("Client cache miss, constructing client");
        let config = self.config.get(ctx).await?.unwrap_or_else(ConnectionConfig::default);
        let auth = config.validate()?;

        let client = ctx
            .run("client_construct", self.factory.create(&config.host, auth))
            .await
            .map_err(|e| match e {
                EngineError::Configuration { .. }
                | EngineError::ClientUnavailable { .. }
                | EngineError::Cancelled { .. }
                | EngineError::DeadlineExceeded { .. } => e,
                other => EngineError::client_unavailable_with_source(
                    "failed to construct upstream client",
                    Box::new(other),
                ),
            })?;

        info!(host = %config.host, "Constructed upstream client");
        *slot = Some(Arc::clone(&client));
        Ok(client)
    }

    /// Drop the cached client. Safe to call when nothing is cached.
    pub async fn invalidate(&self) {
        let mut slot = self.client.write().await;
        clear(&mut slot);
    }

    /// Run a configuration mutation with the write lock held and the slot
    /// already cleared. No client can be built until the mutation settles, and
    /// a caller dropped partway through leaves the cache empty rather than
    /// holding a client for the replaced configuration.
    pub async fn invalidate_with<T, F>(&self, mutation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let mut slot = self.client.write().await;
        clear(&mut slot);
        mutation.await
    }

    pub async fn is_cached(&self) -> bool {
        self.client.read().await.is_some()
    }
}

fn clear(slot: &mut Option<Arc<dyn ApigeeApi>>) {
    if slot.take().is_some() {
        info!("Invalidated cached upstream client");
    } else {
        debug!("Client cache already empty");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apigee::{CreateCredentialsRequest, CreatedCredentials, DeleteCredentialsRequest};
    use crate::secrets::SecretString;
    use crate::storage::InMemoryStorage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tracing_test::traced_test;

    #[derive(Debug)]
    struct NullClient;

    #[async_trait]
    impl ApigeeApi for NullClient {
        async fn create_credentials(
            &self,
            _request: &CreateCredentialsRequest,
        ) -> Result<CreatedCredentials> {
            Err(EngineError::upstream("create_credentials", "-", "unused", None))
        }

        async fn delete_credentials(&self, _request: &DeleteCredentialsRequest) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct CountingFactory {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ClientFactory for CountingFactory {
        async fn create(&self, _host: &str, _auth: ApigeeAuth) -> Result<Arc<dyn ApigeeApi>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(NullClient))
        }
    }

    async fn cache_with(config: Option<ConnectionConfig>) -> (ClientCache, Arc<CountingFactory>) {
        let store = ConfigStore::new(Arc::new(InMemoryStorage::new()));
        if let Some(config) = config {
            store.put(&RequestContext::new(), &config).await.unwrap();
        }
        let factory = Arc::new(CountingFactory::default());
        (ClientCache::new(store, factory.clone()), factory)
    }

    fn token_config() -> ConnectionConfig {
        ConnectionConfig {
            host: "https://api.example.com".into(),
            oauth_token: SecretString::new("t"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_absent_config_fails_with_host_error() {
        let (cache, factory) = cache_with(None).await;
        let err = cache.get_or_create(&RequestContext::new()).await.unwrap_err();

        assert_eq!(err.to_string(), "Configuration error: client host was not defined");
        assert_eq!(factory.calls.load(Ordering::SeqCst), 0);
        assert!(!cache.is_cached().await);
    }

    #[tokio::test]
    async fn test_second_call_is_cached() {
        let (cache, factory) = cache_with(Some(token_config())).await;
        let ctx = RequestContext::new();

        let first = cache.get_or_create(&ctx).await.unwrap();
        let second = cache.get_or_create(&ctx).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_rebuild() {
        let (cache, factory) = cache_with(Some(token_config())).await;
        let ctx = RequestContext::new();

        let first = cache.get_or_create(&ctx).await.unwrap();
        cache.invalidate().await;
        cache.invalidate().await;
        assert!(!cache.is_cached().await);

        let second = cache.get_or_create(&ctx).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(factory.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dropped_mutation_leaves_cache_empty() {
        let (cache, _factory) = cache_with(Some(token_config())).await;
        cache.get_or_create(&RequestContext::new()).await.unwrap();

        let mutation = cache.invalidate_with(std::future::pending::<Result<()>>());
        let outcome = tokio::time::timeout(Duration::from_millis(10), mutation).await;

        assert!(outcome.is_err());
        assert!(!cache.is_cached().await);
    }

    #[tokio::test]
    async fn test_invalidate_with_blocks_construction_until_settled() {
        let (cache, factory) = cache_with(Some(token_config())).await;
        let cache = Arc::new(cache);

        let (release, released) = tokio::sync::oneshot::channel::<()>();
        let writer = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache
                    .invalidate_with(async {
                        released.await.ok();
                        Ok(())
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let reader = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get_or_create(&RequestContext::new()).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(factory.calls.load(Ordering::SeqCst), 0);

        release.send(()).unwrap();
        writer.await.unwrap().unwrap();
        reader.await.unwrap().unwrap();
        assert_eq!(factory.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_invalidate_logs_only_when_cached() {
        let (cache, _factory) = cache_with(Some(token_config())).await;

        cache.invalidate().await;
        assert!(!logs_contain("Invalidated cached upstream client"));

        cache.get_or_create(&RequestContext::new()).await.unwrap();
        assert!(logs_contain("Constructed upstream client"));
        cache.invalidate().await;
        assert!(logs_contain("Invalidated cached upstream client"));
    }

    #[tokio::test]
    async fn test_http_factory_rejects_bad_host() {
        let factory = HttpClientFactory::default();
        let err = factory
            .create("http://[::1", ApigeeAuth::Token(SecretString::new("t")))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Configuration { .. }));
    }
}
