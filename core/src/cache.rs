//! In-memory item collection keyed by id, plus the last acknowledged
//! revision.
//!
//! # Design
//! The cache is the session's source of truth: the UI reads it, mutations
//! land in it first, and the orchestrator's merge step overwrites it with
//! whatever the server returns. Items are replaced as whole records, so a
//! reader never observes a half-updated item. The cache does not validate
//! `revision`; the orchestrator is its only writer and keeps it monotonic.

use std::collections::HashMap;

use crate::types::Item;

/// Keyed item collection with the server revision it was last reconciled
/// against.
#[derive(Debug, Clone, Default)]
pub struct ItemCache {
    items: HashMap<String, Item>,
    revision: i64,
}

impl ItemCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.items.get(id)
    }

    /// Upsert by the item's own id, replacing any previous record whole.
    pub fn insert(&mut self, item: Item) {
        self.items.insert(item.id.clone(), item);
    }

    /// Remove by id. An absent id is a no-op, mirroring the mutation
    /// functions upstream.
    pub fn remove(&mut self, id: &str) -> Option<Item> {
        self.items.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    /// Unordered snapshot of all items. O(n); callers sort as needed.
    pub fn items(&self) -> Vec<Item> {
        self.items.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn revision(&self) -> i64 {
        self.revision
    }

    pub fn set_revision(&mut self, revision: i64) {
        self.revision = revision;
    }
}
