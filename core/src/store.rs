//! Optional persistence seam for item snapshots.
//!
//! The cache is the session source of truth; a configured store is a
//! write-behind mirror that survives restarts. Store failures surface as
//! [`SyncError::Store`] and are logged by the service rather than aborting
//! a sync cycle.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use crate::error::SyncError;
use crate::types::Item;

/// Durable item storage.
///
/// `insert` and `update` are both upserts; `delete` of an unknown id is a
/// no-op. Mirroring the cache must never fail over ordering races between
/// the two.
pub trait ItemStore: Send + Sync {
    fn insert(&self, item: &Item) -> Result<(), SyncError>;
    fn update(&self, item: &Item) -> Result<(), SyncError>;
    fn delete(&self, id: &str) -> Result<(), SyncError>;
    fn fetch_all(&self) -> Result<Vec<Item>, SyncError>;
}

fn store_error(err: impl std::fmt::Display) -> SyncError {
    SyncError::Store(err.to_string())
}

/// Whole-snapshot JSON file store.
///
/// Keeps the working set in memory and rewrites the full file after every
/// mutation. Item lists are small enough that snapshot writes beat
/// incremental bookkeeping.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    items: Mutex<HashMap<String, Item>>,
}

impl JsonFileStore {
    /// Opens the store, loading any existing snapshot at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SyncError> {
        let path = path.into();
        let items = match fs::read_to_string(&path) {
            Ok(data) if data.trim().is_empty() => HashMap::new(),
            Ok(data) => {
                let list: Vec<Item> = serde_json::from_str(&data).map_err(store_error)?;
                list.into_iter().map(|item| (item.id.clone(), item)).collect()
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(store_error(err)),
        };
        Ok(Self {
            path,
            items: Mutex::new(items),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Item>>, SyncError> {
        self.items
            .lock()
            .map_err(|_| SyncError::Store("store mutex poisoned".to_string()))
    }

    fn persist(&self, items: &HashMap<String, Item>) -> Result<(), SyncError> {
        let mut list: Vec<&Item> = items.values().collect();
        // Sorted output keeps the file diffable across runs.
        list.sort_by(|a, b| a.id.cmp(&b.id));
        let data = serde_json::to_string_pretty(&list).map_err(store_error)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(store_error)?;
            }
        }
        fs::write(&self.path, data).map_err(store_error)?;
        Ok(())
    }
}

impl ItemStore for JsonFileStore {
    fn insert(&self, item: &Item) -> Result<(), SyncError> {
        let mut items = self.lock()?;
        items.insert(item.id.clone(), item.clone());
        self.persist(&items)
    }

    fn update(&self, item: &Item) -> Result<(), SyncError> {
        self.insert(item)
    }

    fn delete(&self, id: &str) -> Result<(), SyncError> {
        let mut items = self.lock()?;
        if items.remove(id).is_some() {
            self.persist(&items)?;
        }
        Ok(())
    }

    fn fetch_all(&self) -> Result<Vec<Item>, SyncError> {
        Ok(self.lock()?.values().cloned().collect())
    }
}

/// In-memory store for tests and hosts without durable storage.
#[derive(Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, Item>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Item>>, SyncError> {
        self.items
            .lock()
            .map_err(|_| SyncError::Store("store mutex poisoned".to_string()))
    }
}

impl ItemStore for MemoryStore {
    fn insert(&self, item: &Item) -> Result<(), SyncError> {
        self.lock()?.insert(item.id.clone(), item.clone());
        Ok(())
    }

    fn update(&self, item: &Item) -> Result<(), SyncError> {
        self.insert(item)
    }

    fn delete(&self, id: &str) -> Result<(), SyncError> {
        self.lock()?.remove(id);
        Ok(())
    }

    fn fetch_all(&self) -> Result<Vec<Item>, SyncError> {
        Ok(self.lock()?.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted_texts(items: Vec<Item>) -> Vec<String> {
        let mut texts: Vec<String> = items.into_iter().map(|i| i.text).collect();
        texts.sort();
        texts
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.json");

        let store = JsonFileStore::open(&path).unwrap();
        let kept = Item::new("kept");
        let dropped = Item::new("dropped");
        store.insert(&kept).unwrap();
        store.insert(&dropped).unwrap();
        store.delete(&dropped.id).unwrap();

        let reopened = JsonFileStore::open(&path).unwrap();
        let items = reopened.fetch_all().unwrap();
        assert_eq!(sorted_texts(items), vec!["kept"]);
    }

    #[test]
    fn file_store_update_replaces_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("items.json")).unwrap();

        let mut item = Item::new("draft");
        store.insert(&item).unwrap();
        item.text = "final".to_string();
        store.update(&item).unwrap();

        let items = store.fetch_all().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "final");
    }

    #[test]
    fn file_store_delete_of_unknown_id_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("items.json")).unwrap();
        store.delete("missing").unwrap();
        assert!(store.fetch_all().unwrap().is_empty());
    }

    #[test]
    fn file_store_rejects_corrupt_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = JsonFileStore::open(&path).unwrap_err();
        assert!(matches!(err, SyncError::Store(_)));
    }

    #[test]
    fn memory_store_upserts_and_deletes() {
        let store = MemoryStore::new();
        let mut item = Item::new("a");
        store.insert(&item).unwrap();
        item.text = "b".to_string();
        store.update(&item).unwrap();

        let items = store.fetch_all().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "b");

        store.delete(&item.id).unwrap();
        assert!(store.fetch_all().unwrap().is_empty());
    }
}
