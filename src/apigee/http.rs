//! reqwest-based Management API client.
//!
//! Credentials are minted by updating the developer app with the requested API
//! products and a key lifetime; Apigee answers with the app, whose newest
//! `credentials` entry is the key just issued. Deletion removes that key from
//! the app.

use super::client::{
    ApigeeApi, ApigeeAuth, AppScope, CreateCredentialsRequest, CreatedCredentials,
    DeleteCredentialsRequest,
};
use crate::config::UpstreamConfig;
use crate::errors::{EngineError, Result};
use crate::secrets::SecretString;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace, Instrument};
use url::Url;

const CREATE_OPERATION: &str = "create_credentials";
const DELETE_OPERATION: &str = "delete_credentials";

/// Authenticated client for one Management API host
#[derive(Debug, Clone)]
pub struct ApigeeHttpClient {
    client: Client,
    base_url: Url,
    auth: ApigeeAuth,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateAppRequest<'a> {
    name: &'a str,
    api_products: Vec<String>,
    /// Milliseconds, -1 for keys that never expire
    key_expires_in: i64,
}

#[derive(Deserialize)]
struct DeveloperApp {
    #[serde(default)]
    credentials: Vec<Value>,
}

impl ApigeeHttpClient {
    /// Build a client for `host`. A scheme-less host is treated as https.
    pub fn new(host: &str, auth: ApigeeAuth, options: &UpstreamConfig) -> Result<Self> {
        let base_url = parse_host(host)?;

        let client = Client::builder()
            .timeout(options.timeout())
            .user_agent(options.user_agent.clone())
            .build()
            .map_err(|e| {
                EngineError::client_unavailable_with_source("Failed to build HTTP client", e.into())
            })?;

        debug!(base_url = %base_url, auth_mode = auth.mode(), "Built Apigee Management API client");

        Ok(Self { client, base_url, auth })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn app_url(&self, scope: &AppScope, extra: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                EngineError::configuration(format!("host '{}' cannot carry a path", self.base_url))
            })?;
            segments.pop_if_empty().extend([
                "v1",
                "organizations",
                scope.org_name.as_str(),
                "developers",
                scope.developer_email.as_str(),
                "apps",
                scope.app_name.as_str(),
            ]);
            segments.extend(extra);
        }
        Ok(url)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            ApigeeAuth::Token(token) => builder.bearer_auth(token.expose_secret()),
            ApigeeAuth::Basic { username, password } => {
                builder.basic_auth(username, Some(password.expose_secret()))
            }
        }
    }

    async fn send(
        &self,
        builder: RequestBuilder,
        operation: &str,
        target: &str,
    ) -> Result<Response> {
        let response = self.authorize(builder).send().await.map_err(|e| {
            EngineError::upstream(operation, target, e.to_string(), e.status().map(|s| s.as_u16()))
        })?;

        let status = response.status();
        debug!(status = %status, "Upstream response");

        if !status.is_success() {
            let body =
                response.text().await.unwrap_or_else(|_| "<unable to read error>".to_string());
            trace!(body = %body, "Upstream error body");
            return Err(EngineError::upstream(
                operation,
                target,
                format!("HTTP {}: {}", status, body.trim()),
                Some(status.as_u16()),
            ));
        }

        Ok(response)
    }
}

fn parse_host(host: &str) -> Result<Url> {
    let host = host.trim();
    if host.is_empty() {
        return Err(EngineError::configuration("client host was not defined"));
    }
    let candidate =
        if host.contains("://") { host.to_string() } else { format!("https://{}", host) };

    let url = Url::parse(&candidate)
        .map_err(|e| EngineError::configuration(format!("invalid host '{}': {}", host, e)))?;
    if url.cannot_be_a_base() {
        return Err(EngineError::configuration(format!("invalid host '{}'", host)));
    }
    Ok(url)
}

fn issued_at(credential: &Value) -> i64 {
    match credential.get("issuedAt") {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

/// Pick the most recently issued credential from an app response
fn newest_credential(app: DeveloperApp, target: &str) -> Result<CreatedCredentials> {
    let newest = app
        .credentials
        .into_iter()
        .filter(|c| c.get("consumerKey").and_then(Value::as_str).is_some())
        .max_by_key(issued_at)
        .ok_or_else(|| {
            let message = "response contained no credentials";
            EngineError::upstream(CREATE_OPERATION, target, message, None)
        })?;

    let key = newest.get("consumerKey").and_then(Value::as_str).unwrap_or_default().to_string();
    let secret = newest.get("consumerSecret").and_then(Value::as_str).unwrap_or_default();
    let secret = SecretString::new(secret);
    let credentials = serde_json::to_string(&newest)
        .map_err(|e| EngineError::serialization(e, "encoding issued credential"))?;

    Ok(CreatedCredentials { key, secret, credentials })
}

#[async_trait]
impl ApigeeApi for ApigeeHttpClient {
    async fn create_credentials(
        &self,
        request: &CreateCredentialsRequest,
    ) -> Result<CreatedCredentials> {
        let target = request.scope.to_string();
        let url = self.app_url(&request.scope, &[])?;
        let key_expires_in = match request.ttl_seconds {
            0 => -1,
            secs => i64::try_from(secs.saturating_mul(1000)).unwrap_or(i64::MAX),
        };
        let body = UpdateAppRequest {
            name: &request.scope.app_name,
            api_products: request.product_list(),
            key_expires_in,
        };

        let span = crate::upstream_span!("POST", url.path());
        async {
            let builder = self.client.post(url.clone()).json(&body);
            let response = self.send(builder, CREATE_OPERATION, &target).await?;
            let app: DeveloperApp = response.json().await.map_err(|e| {
                let message = format!("invalid response: {}", e);
                EngineError::upstream(CREATE_OPERATION, &target, message, None)
            })?;
            newest_credential(app, &target)
        }
        .instrument(span)
        .await
    }

    async fn delete_credentials(&self, request: &DeleteCredentialsRequest) -> Result<()> {
        let target = format!("{}/keys/{}", request.scope, request.key);
        let url = self.app_url(&request.scope, &["keys", request.key.as_str()])?;

        let span = crate::upstream_span!("DELETE", url.path());
        async {
            self.send(self.client.delete(url.clone()), DELETE_OPERATION, &target).await?;
            Ok::<(), EngineError>(())
        }
        .instrument(span)
        .await
    }
}
