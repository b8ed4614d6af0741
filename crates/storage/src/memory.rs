//! In-memory state store (does not persist across restarts).

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::{IterFn, StateStore, StoreError, StoreResult};

/// In-memory state store for testing.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl StateStore for MemoryStateStore {
    fn get_bytes(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn put_bytes(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.entries.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn iterate(&self, prefix: &str, visit: &mut IterFn<'_>) -> StoreResult<()> {
        // Copy out so the visitor may use the store.
        let matching: Vec<(String, Vec<u8>)> = self
            .entries
            .read()
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        for (key, value) in &matching {
            if visit(key, value)? {
                break;
            }
        }
        Ok(())
    }
}
