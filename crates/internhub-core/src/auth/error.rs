use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    #[error("Token encryption key is not configured")]
    MissingKey,

    #[error("Refusing to encrypt an empty value")]
    EmptyInput,

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Encryption failed")]
    Encryption,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Credential pair is incomplete - both access and refresh tokens are required")]
    PartialPair,

    #[error("Failed to encrypt credential: {0}")]
    Vault(#[from] VaultError),

    #[error("Credential storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Terminal outcome of a refresh cycle. Every caller waiting on the cycle
/// receives its own copy, hence `Clone`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("Refresh rejected by server (status {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Refresh request failed: {0}")]
    Transport(String),

    #[error("No refresh token available - login required")]
    MissingRefreshToken,

    #[error("Refresh did not complete within {0:?}")]
    TimedOut(Duration),

    #[error("Failed to persist refreshed credentials: {0}")]
    Persistence(String),

    #[error("Refresh was abandoned before completing")]
    Abandoned,
}
