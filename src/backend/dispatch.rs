//! # Request Dispatch
//!
//! Host-style routing from an operation, a logical path and a JSON field map
//! onto [`ApigeeBackend`] operations. Field maps are decoded once into the
//! typed request structs; nothing past this module handles untyped data.
//!
//! | Path | Operations |
//! | --- | --- |
//! | `config` | read, create, update, delete |
//! | `roles/<name>` | read, create, update, delete |
//! | `roles/` | list |
//! | `creds/<name>` | read, update (both issue) |
//! | any | revoke (lease internal data), help |

use super::config_store::ConfigWriteRequest;
use super::context::RequestContext;
use super::credentials::{CredentialLease, RevocationMetadata};
use super::roles::{RoleWriteRequest, NAME_PATTERN};
use super::{ApigeeBackend, BACKEND_HELP};
use crate::errors::{EngineError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

static ROLE_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("^roles/(?P<name>{})$", NAME_PATTERN)).expect("role path regex is valid")
});

static CREDS_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("^creds/(?P<name>{})$", NAME_PATTERN)).expect("creds path regex is valid")
});

const CONFIG_SYNOPSIS: &str = "Configure the Apigee backend.";
const CONFIG_DESCRIPTION: &str =
    "The Apigee backend requires host and either oauth_token or username and password for the \
     Apigee Management API.";
const ROLE_SYNOPSIS: &str = "Manages roles for generating Apigee credentials.";
const ROLE_DESCRIPTION: &str = "This path manages roles for generating Apigee credentials.";
const ROLE_LIST_SYNOPSIS: &str = "Lists roles for generating Apigee credentials.";
const ROLE_LIST_DESCRIPTION: &str = "This path lists roles for generating Apigee credentials.";
const CREDS_SYNOPSIS: &str = "Generate Apigee credentials from a role.";
const CREDS_DESCRIPTION: &str =
    "Reading or updating this path issues a new key and secret for the named role's app.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
    List,
    Revoke,
    Help,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::List => "list",
            Self::Revoke => "revoke",
            Self::Help => "help",
        };
        f.write_str(name)
    }
}

/// One host call
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub operation: Operation,
    pub path: String,
    /// Request fields, or lease internal data for [`Operation::Revoke`]
    pub data: Map<String, Value>,
}

impl Request {
    pub fn new(operation: Operation, path: impl Into<String>) -> Self {
        Self { operation, path: path.into(), data: Map::new() }
    }

    /// Attach a field map. Non-object values are ignored.
    pub fn with_data(mut self, data: Value) -> Self {
        if let Value::Object(map) = data {
            self.data = map;
        }
        self
    }
}

/// Help for the backend and, when the path is known, for that path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HelpText {
    pub help: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synopsis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Data(Value),
    List(Vec<String>),
    Lease(Box<CredentialLease>),
    Help(HelpText),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    Config,
    Role(String),
    RoleList,
    Creds(String),
}

impl Route {
    fn parse(path: &str) -> Option<Self> {
        let path = path.trim_start_matches('/');
        if path == "config" {
            return Some(Self::Config);
        }
        if path == "roles" || path == "roles/" {
            return Some(Self::RoleList);
        }
        if let Some(caps) = ROLE_PATH.captures(path) {
            return Some(Self::Role(caps["name"].to_string()));
        }
        if let Some(caps) = CREDS_PATH.captures(path) {
            return Some(Self::Creds(caps["name"].to_lowercase()));
        }
        None
    }

    fn help(&self) -> (&'static str, &'static str) {
        match self {
            Self::Config => (CONFIG_SYNOPSIS, CONFIG_DESCRIPTION),
            Self::Role(_) => (ROLE_SYNOPSIS, ROLE_DESCRIPTION),
            Self::RoleList => (ROLE_LIST_SYNOPSIS, ROLE_LIST_DESCRIPTION),
            Self::Creds(_) => (CREDS_SYNOPSIS, CREDS_DESCRIPTION),
        }
    }
}

fn decode<T: DeserializeOwned>(data: &Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(data.clone()))
        .map_err(|e| EngineError::validation(format!("invalid request data: {}", e)))
}

fn to_data<T: Serialize>(value: &T) -> Result<Response> {
    serde_json::to_value(value)
        .map(Response::Data)
        .map_err(|e| EngineError::serialization(e, "encoding response"))
}

/// Help for `path`; unknown paths get the backend-wide text only
pub fn help_for(path: &str) -> HelpText {
    let (synopsis, description) = match Route::parse(path) {
        Some(route) => {
            let (s, d) = route.help();
            (Some(s.to_string()), Some(d.to_string()))
        }
        None => (None, None),
    };
    HelpText { help: BACKEND_HELP.to_string(), synopsis, description }
}

impl ApigeeBackend {
    /// Route a host request. `Ok(None)` is a successful call with no response body.
    pub async fn handle_request(
        &self,
        ctx: &RequestContext,
        request: &Request,
    ) -> Result<Option<Response>> {
        match request.operation {
            Operation::Help => return Ok(Some(Response::Help(help_for(&request.path)))),
            Operation::Revoke => {
                let metadata = RevocationMetadata::from_internal_data(&request.data)?;
                self.credential_revoke(ctx, &metadata).await?;
                return Ok(None);
            }
            _ => {}
        }

        let unsupported = || EngineError::unsupported(request.operation.to_string(), &request.path);
        let route = Route::parse(&request.path).ok_or_else(unsupported)?;

        match (route, request.operation) {
            (Route::Config, Operation::Read) => match self.config_read(ctx).await? {
                Some(config) => to_data(&config).map(Some),
                None => Ok(None),
            },
            (Route::Config, Operation::Create | Operation::Update) => {
                let write: ConfigWriteRequest = decode(&request.data)?;
                self.config_write(ctx, write).await?;
                Ok(None)
            }
            (Route::Config, Operation::Delete) => {
                self.config_delete(ctx).await?;
                Ok(None)
            }
            (Route::Role(name), Operation::Read) => match self.role_read(ctx, &name).await? {
                Some(role) => to_data(&role).map(Some),
                None => Ok(None),
            },
            (Route::Role(name), Operation::Create | Operation::Update) => {
                let write: RoleWriteRequest = decode(&request.data)?;
                self.role_write(ctx, &name, write).await?;
                Ok(None)
            }
            (Route::Role(name), Operation::Delete) => {
                self.role_delete(ctx, &name).await?;
                Ok(None)
            }
            (Route::RoleList, Operation::List) => {
                Ok(Some(Response::List(self.role_list(ctx).await?)))
            }
            (Route::Creds(name), Operation::Read | Operation::Update) => {
                let lease = self.credential_issue(ctx, &name).await?;
                Ok(Some(Response::Lease(Box::new(lease))))
            }
            _ => Err(unsupported()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_parse() {
        assert_eq!(Route::parse("config"), Some(Route::Config));
        assert_eq!(Route::parse("/config"), Some(Route::Config));
        assert_eq!(Route::parse("roles"), Some(Route::RoleList));
        assert_eq!(Route::parse("roles/"), Some(Route::RoleList));
        assert_eq!(Route::parse("roles/my-role"), Some(Route::Role("my-role".into())));
        assert_eq!(Route::parse("creds/Test"), Some(Route::Creds("test".into())));

        assert_eq!(Route::parse("roles/a/b"), None);
        assert_eq!(Route::parse("roles/-x"), None);
        assert_eq!(Route::parse("creds/"), None);
        assert_eq!(Route::parse("unknown"), None);
    }

    #[test]
    fn test_help_for_known_and_unknown_paths() {
        let help = help_for("roles/test");
        assert_eq!(help.help, BACKEND_HELP);
        assert_eq!(help.synopsis.as_deref(), Some(ROLE_SYNOPSIS));

        let help = help_for("nowhere");
        assert!(help.synopsis.is_none());
        assert!(help.description.is_none());
    }

    #[test]
    fn test_decode_type_mismatch_is_validation() {
        let data = serde_json::json!({"host": 5});
        let Value::Object(map) = data else { unreachable!() };
        let err = decode::<ConfigWriteRequest>(&map).unwrap_err();
        assert!(matches!(err, EngineError::Validation { .. }));
    }

    #[test]
    fn test_operation_serde_names() {
        assert_eq!(serde_json::to_value(Operation::Revoke).unwrap(), "revoke");
        assert_eq!(Operation::List.to_string(), "list");
    }
}
