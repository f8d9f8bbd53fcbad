use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::debug;

use super::SlotStorage;

/// Slots file name in cache directory
const SLOTS_FILE: &str = "credentials.json";

/// All slots in one JSON object, rewritten atomically on every change.
pub struct FileStorage {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(cache_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)
            .with_context(|| format!("Failed to create cache directory {}", cache_dir.display()))?;
        Ok(Self {
            path: cache_dir.join(SLOTS_FILE),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents =
            std::fs::read_to_string(&self.path).context("Failed to read credentials file")?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents).context("Failed to parse credentials file")
    }

    fn write_all(&self, slots: &BTreeMap<String, String>) -> Result<()> {
        if slots.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path).context("Failed to remove credentials file")?;
            }
            return Ok(());
        }

        let contents = serde_json::to_string_pretty(slots)?;
        let tmp = self.path.with_extension(format!("{}.tmp", std::process::id()));
        std::fs::write(&tmp, contents).context("Failed to write credentials file")?;
        std::fs::rename(&tmp, &self.path).context("Failed to replace credentials file")?;
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut slots = self.read_all()?;
        f(&mut slots);
        self.write_all(&slots)
    }
}

impl SlotStorage for FileStorage {
    fn get(&self, slot: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.get(slot).cloned())
    }

    fn set(&self, slot: &str, value: &str) -> Result<()> {
        debug!(slot, path = %self.path.display(), "Writing slot");
        self.update(|slots| {
            slots.insert(slot.to_string(), value.to_string());
        })
    }

    fn remove(&self, slot: &str) -> Result<()> {
        self.update(|slots| {
            slots.remove(slot);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let storage = FileStorage::new(dir.path()).unwrap();
            storage.set("accessToken", "a-cipher").unwrap();
            storage.set("refreshToken", "r-cipher").unwrap();
        }

        let reopened = FileStorage::new(dir.path()).unwrap();
        assert_eq!(reopened.get("accessToken").unwrap().as_deref(), Some("a-cipher"));
        assert_eq!(reopened.get("refreshToken").unwrap().as_deref(), Some("r-cipher"));
        assert_eq!(reopened.get("user").unwrap(), None);
    }

    #[test]
    fn test_removing_last_slot_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        storage.set("accessToken", "x").unwrap();
        assert!(storage.path().exists());

        storage.remove("accessToken").unwrap();
        assert!(!storage.path().exists());

        // Removing again is a no-op
        storage.remove("accessToken").unwrap();
    }

    #[test]
    fn test_unparseable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        std::fs::write(storage.path(), "{ not json").unwrap();
        assert!(storage.get("accessToken").is_err());
    }
}
