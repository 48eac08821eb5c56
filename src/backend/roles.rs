//! # Role Store
//!
//! Named templates describing which developer app a credential is minted for
//! and how long its lease runs. Roles live under `roles/<name>` and are always
//! written whole: every scope field must be supplied on every write.

use super::context::RequestContext;
use crate::errors::{EngineError, Result};
use crate::storage::{Storage, StorageEntry};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

pub const ROLE_STORAGE_PREFIX: &str = "roles/";

/// Pattern for role names, also used by path routing
pub const NAME_PATTERN: &str = r"(?-u:\w)((?-u:[\w\-.]+)?(?-u:\w))?";

static NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("^{}$", NAME_PATTERN)).expect("role name pattern is a valid regex")
});

/// Persisted role record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub org_name: String,
    pub developer_email: String,
    pub app_name: String,
    pub api_products: String,
    /// Zero means "use the engine default"
    #[serde(with = "duration_secs", default)]
    pub ttl: Duration,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// A TTL as supplied by a caller: integer seconds or a duration string like `"24h"`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TtlInput {
    Seconds(i64),
    Text(String),
}

impl TtlInput {
    /// Whole-second duration; negative or unparseable input is a validation error on `ttl`.
    pub fn to_duration(&self) -> Result<Duration> {
        match self {
            Self::Seconds(secs) => u64::try_from(*secs).map(Duration::from_secs).map_err(|_| {
                EngineError::validation_field(format!("ttl must not be negative: {}", secs), "ttl")
            }),
            Self::Text(raw) => {
                let raw = raw.trim();
                if raw.is_empty() {
                    return Ok(Duration::ZERO);
                }
                if let Ok(secs) = raw.parse::<i64>() {
                    return Self::Seconds(secs).to_duration();
                }
                humantime::parse_duration(raw)
                    .map(|d| Duration::from_secs(d.as_secs()))
                    .map_err(|e| {
                        let message = format!("invalid ttl '{}': {}", raw, e);
                        EngineError::validation_field(message, "ttl")
                    })
            }
        }
    }
}

impl From<u64> for TtlInput {
    fn from(secs: u64) -> Self {
        Self::Seconds(i64::try_from(secs).unwrap_or(i64::MAX))
    }
}

/// Administrative role write. All four scope fields are mandatory on every call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Validate)]
pub struct RoleWriteRequest {
    #[serde(default)]
    #[validate(
        required(message = "missing org_name in role"),
        length(min = 1, message = "missing org_name in role")
    )]
    pub org_name: Option<String>,

    #[serde(default)]
    #[validate(
        required(message = "missing developer_email in role"),
        length(min = 1, message = "missing developer_email in role")
    )]
    pub developer_email: Option<String>,

    #[serde(default)]
    #[validate(
        required(message = "missing app_name in role"),
        length(min = 1, message = "missing app_name in role")
    )]
    pub app_name: Option<String>,

    #[serde(default)]
    #[validate(
        required(message = "missing api_products in role"),
        length(min = 1, message = "missing api_products in role")
    )]
    pub api_products: Option<String>,

    #[serde(default)]
    pub ttl: Option<TtlInput>,
}

impl RoleWriteRequest {
    /// Validate and convert into the persisted form
    pub fn into_role(self) -> Result<Role> {
        self.validate()?;
        let ttl = match &self.ttl {
            Some(input) => input.to_duration()?,
            None => Duration::ZERO,
        };

        Ok(Role {
            org_name: self.org_name.unwrap_or_default(),
            developer_email: self.developer_email.unwrap_or_default(),
            app_name: self.app_name.unwrap_or_default(),
            api_products: self.api_products.unwrap_or_default(),
            ttl,
        })
    }
}

/// Role read-back; `ttl` is whole seconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleResponse {
    pub org_name: String,
    pub developer_email: String,
    pub app_name: String,
    pub api_products: String,
    pub ttl: u64,
}

impl From<&Role> for RoleResponse {
    fn from(role: &Role) -> Self {
        Self {
            org_name: role.org_name.clone(),
            developer_email: role.developer_email.clone(),
            app_name: role.app_name.clone(),
            api_products: role.api_products.clone(),
            ttl: role.ttl.as_secs(),
        }
    }
}

/// Reject empty names and names the path router could never match
pub fn validate_role_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(EngineError::validation_field("missing role name", "name"));
    }
    if !NAME_REGEX.is_match(name) {
        return Err(EngineError::validation_field(format!("invalid role name '{}'", name), "name"));
    }
    Ok(())
}

fn role_key(name: &str) -> Result<String> {
    validate_role_name(name)?;
    Ok(format!("{}{}", ROLE_STORAGE_PREFIX, name))
}

#[derive(Debug, Clone)]
pub struct RoleStore {
    storage: Arc<dyn Storage>,
}

impl RoleStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn get(&self, ctx: &RequestContext, name: &str) -> Result<Option<Role>> {
        let key = role_key(name)?;
        let entry = ctx.run("role_get", self.storage.get(&key)).await?;
        entry.map(|e| e.decode_json()).transpose()
    }

    pub async fn put(&self, ctx: &RequestContext, name: &str, role: &Role) -> Result<()> {
        let entry = StorageEntry::json(role_key(name)?, role)?;
        ctx.run("role_put", self.storage.put(entry)).await
    }

    pub async fn delete(&self, ctx: &RequestContext, name: &str) -> Result<()> {
        let key = role_key(name)?;
        ctx.run("role_delete", self.storage.delete(&key)).await
    }

    /// Role names, sorted
    pub async fn list(&self, ctx: &RequestContext) -> Result<Vec<String>> {
        ctx.run("role_list", self.storage.list(ROLE_STORAGE_PREFIX)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use proptest::prelude::*;

    fn request() -> RoleWriteRequest {
        RoleWriteRequest {
            org_name: Some("o".into()),
            developer_email: Some("d@x.com".into()),
            app_name: Some("a".into()),
            api_products: Some("p".into()),
            ttl: None,
        }
    }

    #[test]
    fn test_missing_api_products() {
        let err = RoleWriteRequest { api_products: None, ..request() }.into_role().unwrap_err();
        assert_eq!(err.field(), Some("api_products"));
        assert_eq!(err.to_string(), "Validation error: missing api_products in role");
    }

    #[test]
    fn test_empty_scope_field_rejected() {
        let err = RoleWriteRequest { app_name: Some(String::new()), ..request() }
            .into_role()
            .unwrap_err();
        assert_eq!(err.field(), Some("app_name"));
    }

    #[test]
    fn test_unset_ttl_is_zero() {
        assert_eq!(request().into_role().unwrap().ttl, Duration::ZERO);
    }

    #[test]
    fn test_ttl_from_json() {
        let req: RoleWriteRequest = serde_json::from_value(serde_json::json!({
            "org_name": "o", "developer_email": "d", "app_name": "a",
            "api_products": "p", "ttl": "1h30m"
        }))
        .unwrap();
        assert_eq!(req.into_role().unwrap().ttl, Duration::from_secs(5400));

        let req: RoleWriteRequest = serde_json::from_value(serde_json::json!({"ttl": 60})).unwrap();
        assert_eq!(req.ttl, Some(TtlInput::Seconds(60)));
    }

    #[test]
    fn test_bad_ttl() {
        let inputs =
            [TtlInput::Seconds(-1), TtlInput::Text("-5".into()), TtlInput::Text("soon".into())];
        for input in inputs {
            let err = input.to_duration().unwrap_err();
            assert_eq!(err.field(), Some("ttl"), "{:?}", input);
        }
    }

    #[test]
    fn test_role_names() {
        for name in ["test", "my-role", "a", "role.v2", "ROLE_1"] {
            assert!(validate_role_name(name).is_ok(), "{}", name);
        }
        for name in ["", "-lead", "trail-", "has space", "a/b", "café", "名前"] {
            assert!(validate_role_name(name).is_err(), "{}", name);
        }
    }

    #[test]
    fn test_persisted_ttl_is_seconds() {
        let role = RoleWriteRequest { ttl: Some(TtlInput::from(90)), ..request() }
            .into_role()
            .unwrap();
        let json = serde_json::to_value(&role).unwrap();
        assert_eq!(json["ttl"], 90);
        assert_eq!(RoleResponse::from(&role).ttl, 90);
    }

    #[tokio::test]
    async fn test_store_round_trip_and_list() {
        let store = RoleStore::new(Arc::new(InMemoryStorage::new()));
        let ctx = RequestContext::new();
        let role = request().into_role().unwrap();

        assert!(store.get(&ctx, "test").await.unwrap().is_none());
        store.put(&ctx, "test", &role).await.unwrap();
        store.put(&ctx, "alpha", &role).await.unwrap();

        assert_eq!(store.get(&ctx, "test").await.unwrap(), Some(role));
        assert_eq!(store.list(&ctx).await.unwrap(), vec!["alpha", "test"]);

        store.delete(&ctx, "test").await.unwrap();
        assert!(store.get(&ctx, "test").await.unwrap().is_none());
        assert!(store.get(&ctx, "../config").await.is_err());
    }

    proptest! {
        #[test]
        fn ttl_seconds_round_trip(secs in 0u64..=100_000_000) {
            let role = RoleWriteRequest { ttl: Some(TtlInput::from(secs)), ..request() }
                .into_role()
                .unwrap();
            prop_assert_eq!(RoleResponse::from(&role).ttl, secs);
        }

        #[test]
        fn ttl_text_matches_humantime_format(secs in 1u64..=100_000_000) {
            let text = humantime::format_duration(Duration::from_secs(secs)).to_string();
            let parsed = TtlInput::Text(text).to_duration().unwrap();
            prop_assert_eq!(parsed.as_secs(), secs);
        }
    }
}
