//! Authentication module for credential lifecycle management.
//!
//! This module provides:
//! - `Vault`: symmetric encryption of tokens at rest
//! - `CredentialStore`: encrypted persistence of the access/refresh pair
//! - `clock`: expiry checks on decoded token claims
//! - `RefreshCoordinator`: single-flight token refresh shared by all requests
//!
//! Credentials are written in pairs, encrypted, and mirrored into session
//! cookies that expire after 7 days.

pub mod clock;
pub mod credentials;
pub mod error;
pub mod refresh;
pub mod store;
pub mod vault;

pub use clock::Claims;
pub use credentials::{Credential, CredentialPair, LoadedCredentials, Role, UserProfile};
pub use error::{RefreshError, StoreError, VaultError};
pub use refresh::{HttpRefreshTransport, RefreshCoordinator, RefreshTransport};
pub use store::CredentialStore;
pub use vault::Vault;
