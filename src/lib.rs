//! # Apigee Secrets
//!
//! A dynamic-credentials secrets engine for the Apigee Management API. A host
//! (policy or secret-management server) delegates a small set of logical paths
//! to this crate; the engine persists the upstream connection and named roles,
//! mints a key/secret for a role on demand, and deletes that key again when the
//! host revokes the lease.
//!
//! ## Architecture
//!
//! ```text
//! dispatch ──► RoleStore ──► CredentialManager ──► ClientCache ──► ApigeeApi
//!    │                                                 │
//!    └──────────► ConfigStore ◄────────────────────────┘
//! ```
//!
//! The host owns lease bookkeeping, storage durability and encryption. Storage
//! is reached through the [`storage::Storage`] trait and the Management API
//! through [`apigee::ApigeeApi`].
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use apigee_secrets::backend::{ApigeeBackend, ConfigWriteRequest, RequestContext};
//! use apigee_secrets::storage::InMemoryStorage;
//! use apigee_secrets::{EngineSettings, Result};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let storage = Arc::new(InMemoryStorage::new());
//!     let backend = ApigeeBackend::new(storage, &EngineSettings::default())?;
//!     let ctx = RequestContext::new();
//!
//!     let config = ConfigWriteRequest {
//!         host: Some("https://api.enterprise.apigee.com".into()),
//!         oauth_token: Some("token".into()),
//!         ..Default::default()
//!     };
//!     backend.config_write(&ctx, config).await?;
//!
//!     let lease = backend.credential_issue(&ctx, "test").await?;
//!     backend.credential_revoke(&ctx, &lease.internal).await
//! }
//! ```

pub mod apigee;
pub mod backend;
pub mod cli;
pub mod config;
pub mod errors;
pub mod observability;
pub mod secrets;
pub mod storage;

// Re-export commonly used types and traits
pub use backend::{ApigeeBackend, RequestContext};
pub use config::EngineSettings;
pub use errors::{EngineError, Result};
pub use observability::init_logging;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
