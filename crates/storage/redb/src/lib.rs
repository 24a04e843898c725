//! redb-backed [`StateStore`].
//!
//! All entries live in a single table keyed by string. Every mutation is its
//! own write transaction; reads and iteration use read transactions, which
//! see a consistent snapshot and never block writers.

use std::path::{Path, PathBuf};

use redb::{Database, TableDefinition};
use tracing::debug;
use vertex_storage::{StateStore, StoreError, Visitor};

const STATE: TableDefinition<&str, &[u8]> = TableDefinition::new("state");

/// Durable state store in a single redb file.
pub struct RedbStateStore {
    path: PathBuf,
    db: Database,
}

impl std::fmt::Debug for RedbStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStateStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl RedbStateStore {
    /// Open the database at `path`, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let db = Database::create(&path).map_err(backend)?;

        // Create the table up front so read transactions can always open it.
        let txn = db.begin_write().map_err(backend)?;
        txn.open_table(STATE).map_err(backend)?;
        txn.commit().map_err(backend)?;

        debug!(path = %path.display(), "opened state store");
        Ok(Self { path, db })
    }

    /// Create the parent directories of `path`, then open it.
    pub fn open_with_create_dir(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(backend)?;
        }
        Self::open(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write<F>(&self, f: F) -> Result<(), redb::Error>
    where
        F: FnOnce(&mut redb::Table<'_, &str, &[u8]>) -> Result<(), redb::Error>,
    {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(STATE)?;
            f(&mut table)?;
        }
        txn.commit()?;
        Ok(())
    }
}

impl StateStore for RedbStateStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let txn = self.db.begin_read().map_err(backend)?;
        let table = txn.open_table(STATE).map_err(backend)?;
        match table.get(key).map_err(backend)? {
            Some(value) => Ok(value.value().to_vec()),
            None => Err(StoreError::NotFound),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.write(|table| {
            table.insert(key, value)?;
            Ok(())
        })
        .map_err(backend)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.write(|table| {
            table.remove(key)?;
            Ok(())
        })
        .map_err(backend)
    }

    fn iterate(&self, prefix: &str, visit: &mut Visitor<'_>) -> Result<(), StoreError> {
        let txn = self.db.begin_read().map_err(backend)?;
        let table = txn.open_table(STATE).map_err(backend)?;

        for item in table.range(prefix..).map_err(backend)? {
            let (key, value) = item.map_err(backend)?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            if visit(key, value.value())? {
                break;
            }
        }
        Ok(())
    }
}

fn backend(err: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(store: &RedbStateStore, prefix: &str) -> Vec<String> {
        let mut keys = Vec::new();
        store
            .iterate(prefix, &mut |key, _| {
                keys.push(key.to_owned());
                Ok(false)
            })
            .unwrap();
        keys
    }

    #[test]
    fn test_basic() {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStateStore::open(dir.path().join("state.redb")).unwrap();

        assert_eq!(store.get("a"), Err(StoreError::NotFound));
        store.put("a", b"1").unwrap();
        assert_eq!(store.get("a").unwrap(), b"1");

        store.delete("a").unwrap();
        assert_eq!(store.get("a"), Err(StoreError::NotFound));
        store.delete("a").unwrap();
    }

    #[test]
    fn test_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.redb");

        {
            let store = RedbStateStore::open_with_create_dir(&path).unwrap();
            store.put("blocklist-01", b"one").unwrap();
            store.put("blocklist-02", b"two").unwrap();
        }

        let store = RedbStateStore::open(&path).unwrap();
        assert_eq!(store.get("blocklist-02").unwrap(), b"two");
        assert_eq!(keys(&store, "blocklist-"), ["blocklist-01", "blocklist-02"]);
    }

    #[test]
    fn test_iterate_prefix_and_stop() {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStateStore::open(dir.path().join("state.redb")).unwrap();
        for key in ["a-1", "b-1", "b-2", "b-3", "c-1"] {
            store.put(key, b"").unwrap();
        }

        assert_eq!(keys(&store, "b-"), ["b-1", "b-2", "b-3"]);

        let mut seen = Vec::new();
        store
            .iterate("b-", &mut |key, _| {
                seen.push(key.to_owned());
                Ok(true)
            })
            .unwrap();
        assert_eq!(seen, ["b-1"]);
    }

    #[test]
    fn test_visitor_may_mutate_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStateStore::open(dir.path().join("state.redb")).unwrap();
        for key in ["k-1", "k-2"] {
            store.put(key, b"").unwrap();
        }

        store
            .iterate("k-", &mut |key, _| {
                store.delete(key)?;
                Ok(false)
            })
            .unwrap();
        assert!(keys(&store, "k-").is_empty());
    }
}
