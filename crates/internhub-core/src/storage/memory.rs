use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;

use super::SlotStorage;

/// Process-local slots. Clone is cheap and shares the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slots: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Overwrite a slot with arbitrary bytes, bypassing encryption
    pub fn corrupt(&self, slot: &str, garbage: &str) {
        self.slots().insert(slot.to_string(), garbage.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }
}

impl SlotStorage for MemoryStorage {
    fn get(&self, slot: &str) -> Result<Option<String>> {
        Ok(self.slots().get(slot).cloned())
    }

    fn set(&self, slot: &str, value: &str) -> Result<()> {
        self.slots().insert(slot.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, slot: &str) -> Result<()> {
        self.slots().remove(slot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_slots() {
        let a = MemoryStorage::new();
        let b = a.clone();
        a.set("k", "v").unwrap();
        assert_eq!(b.get("k").unwrap().as_deref(), Some("v"));
        b.remove("k").unwrap();
        b.remove("k").unwrap();
        assert!(a.is_empty());
    }
}
