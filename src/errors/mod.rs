//! # Error Handling
//!
//! Error taxonomy for the Apigee secrets engine. Every failure surfaced to the
//! host is an [`EngineError`]; nothing in this crate retries or swallows errors.

pub mod types;

pub use types::{EngineError, Result};
