//! Durable key/value slots for encrypted credentials.
//!
//! This module provides:
//! - `SlotStorage`: the primary storage seam used by the credential store
//! - `FileStorage`: JSON map in the cache directory
//! - `KeyringStorage`: one OS keychain entry per slot
//! - `MemoryStorage`: process-local, for tests and throwaway sessions
//! - `CookieJar`: the secondary cookie channel mirrored on every save,
//!   persisted next to the slots
//!
//! Storage only ever sees ciphertext.

pub mod cookies;
pub mod file;
pub mod keychain;
pub mod memory;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub use cookies::{CookieJar, SameSite, SessionCookie};
pub use file::FileStorage;
pub use keychain::KeyringStorage;
pub use memory::MemoryStorage;

pub trait SlotStorage: Send + Sync {
    /// `Ok(None)` when the slot has never been written or was removed
    fn get(&self, slot: &str) -> Result<Option<String>>;

    fn set(&self, slot: &str, value: &str) -> Result<()>;

    /// Removing a missing slot is not an error
    fn remove(&self, slot: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

/// Build the configured backend
pub fn open(backend: StorageBackend, cache_dir: &Path) -> Result<Arc<dyn SlotStorage>> {
    let storage: Arc<dyn SlotStorage> = match backend {
        StorageBackend::File => Arc::new(FileStorage::new(cache_dir)?),
        StorageBackend::Keyring => Arc::new(KeyringStorage::new()),
        StorageBackend::Memory => Arc::new(MemoryStorage::new()),
    };
    Ok(storage)
}

/// Cookie mirror matching the backend: durable unless slots are in memory
pub fn open_cookies(backend: StorageBackend, cache_dir: &Path) -> Result<CookieJar> {
    match backend {
        StorageBackend::Memory => Ok(CookieJar::new()),
        StorageBackend::File | StorageBackend::Keyring => CookieJar::open(cache_dir),
    }
}
