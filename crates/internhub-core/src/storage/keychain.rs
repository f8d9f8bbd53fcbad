use anyhow::{Context, Result};
use keyring::Entry;

use super::SlotStorage;

const SERVICE_NAME: &str = "internhub";

/// Slots kept in the OS keychain, one entry per slot name.
#[derive(Debug, Clone, Default)]
pub struct KeyringStorage;

impl KeyringStorage {
    pub fn new() -> Self {
        Self
    }

    fn entry(slot: &str) -> Result<Entry> {
        Entry::new(SERVICE_NAME, slot).context("Failed to create keyring entry")
    }
}

impl SlotStorage for KeyringStorage {
    fn get(&self, slot: &str) -> Result<Option<String>> {
        match Self::entry(slot)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to read slot from keychain"),
        }
    }

    fn set(&self, slot: &str, value: &str) -> Result<()> {
        Self::entry(slot)?
            .set_password(value)
            .context("Failed to store slot in keychain")
    }

    fn remove(&self, slot: &str) -> Result<()> {
        match Self::entry(slot)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete slot from keychain"),
        }
    }
}
