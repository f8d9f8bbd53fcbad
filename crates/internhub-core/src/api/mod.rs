//! API module for the internhub REST API.
//!
//! This module provides:
//! - `ApiClient`: request pipeline with transparent credential refresh
//! - `ApiRequest`: a resendable request description
//! - `ApiError`: error types for API operations
//! - Session operations (login, status, logout) on `ApiClient`

pub mod client;
pub mod error;
pub mod request;
pub mod session;

pub use client::ApiClient;
pub use error::ApiError;
pub use request::ApiRequest;
pub use session::CredentialStatus;
