//! Secret-material hygiene.
//!
//! Upstream OAuth tokens, basic-auth passwords and issued consumer secrets are
//! carried as [`SecretString`] so they cannot leak through logs or error messages.

pub mod types;

pub use types::{exposed, SecretString};
