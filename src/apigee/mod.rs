//! Apigee Management API integration.
//!
//! [`ApigeeApi`] is the capability the credential lifecycle depends on;
//! [`ApigeeHttpClient`] is the production implementation.

pub mod client;
pub mod http;

pub use client::{
    ApigeeApi, ApigeeAuth, AppScope, CreateCredentialsRequest, CreatedCredentials,
    DeleteCredentialsRequest,
};
pub use http::ApigeeHttpClient;
