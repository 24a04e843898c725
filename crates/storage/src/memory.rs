//! In-memory state store (does not persist across restarts).

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;

use crate::{StateStore, StoreError, Visitor};

/// In-memory state store for testing and ephemeral nodes.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.entries.write().insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn iterate(&self, prefix: &str, visit: &mut Visitor<'_>) -> Result<(), StoreError> {
        // Visit a snapshot so the visitor may write to the store.
        let snapshot: Vec<(String, Vec<u8>)> = self
            .entries
            .read()
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        for (key, value) in &snapshot {
            if visit(key, value)? {
                break;
            }
        }
        Ok(())
    }
}
