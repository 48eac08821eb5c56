//! # Observability
//!
//! Structured logging for the secrets engine.

pub mod logging;

pub use logging::{init_logging, log_settings_info};
