//! Internhub Core Library
//!
//! Credential lifecycle for the internhub API client: encrypted token
//! storage, expiry checks, single-flight refresh and an HTTP pipeline that
//! recovers from expired access tokens without the caller noticing.

pub mod api;
pub mod auth;
pub mod config;
pub mod storage;

#[cfg(test)]
mod test_utils;

pub use api::{ApiClient, ApiError, ApiRequest, CredentialStatus};
pub use auth::{Credential, CredentialPair, Role, UserProfile};
pub use config::Config;
