//! # Configuration Management
//!
//! Engine-level settings loaded from the environment. Upstream connection
//! settings (host, token, basic credentials) are not here: they are persisted
//! records managed through [`crate::backend::config_store`].

pub mod settings;

pub use settings::{
    EngineSettings, LeaseConfig, ObservabilityConfig, UpstreamConfig, DEFAULT_LEASE_TTL_SECONDS,
};
