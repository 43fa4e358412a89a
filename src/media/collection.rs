//! In-memory collection of tracked items
//!
//! Every accessor takes the lock for the duration of one call only and hands
//! out clones, so the lock is never held across filesystem I/O.

use std::path::Path;

use parking_lot::Mutex;
use uuid::Uuid;

use super::item::Item;

#[derive(Debug, Default)]
pub struct ItemCollection {
    items: Mutex<Vec<Item>>,
}

impl ItemCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn list(&self) -> Vec<Item> {
        self.items.lock().clone()
    }

    pub fn list_by_data_source(&self, data_source: &Path) -> Vec<Item> {
        self.items
            .lock()
            .iter()
            .filter(|i| i.data_source == data_source)
            .cloned()
            .collect()
    }

    pub fn get_by_id(&self, id: Uuid) -> Option<Item> {
        self.items.lock().iter().find(|i| i.id == id).cloned()
    }

    /// Single-item lookup: the item whose directory is exactly `path`
    pub fn get_by_path(&self, path: &Path) -> Option<Item> {
        self.items
            .lock()
            .iter()
            .find(|i| i.path == path && !i.multi_item_dir)
            .cloned()
    }

    /// Every item living in `dir`, regardless of directory regime
    pub fn list_in_dir(&self, dir: &Path) -> Vec<Item> {
        self.items
            .lock()
            .iter()
            .filter(|i| i.path == dir)
            .cloned()
            .collect()
    }

    /// Insert or replace by id; returns true when the item is new
    pub fn upsert(&self, item: Item) -> bool {
        let mut items = self.items.lock();
        match items.iter_mut().find(|i| i.id == item.id) {
            Some(slot) => {
                *slot = item;
                false
            }
            None => {
                items.push(item);
                true
            }
        }
    }

    /// Apply a mutation to one item and return its new state
    pub fn update<F>(&self, id: Uuid, f: F) -> Option<Item>
    where
        F: FnOnce(&mut Item),
    {
        let mut items = self.items.lock();
        let item = items.iter_mut().find(|i| i.id == id)?;
        f(item);
        Some(item.clone())
    }

    pub fn delete(&self, id: Uuid) -> Option<Item> {
        let mut items = self.items.lock();
        let idx = items.iter().position(|i| i.id == id)?;
        Some(items.remove(idx))
    }

    /// Clear the transient discovery flag on every item
    pub fn clear_just_discovered(&self) {
        for item in self.items.lock().iter_mut() {
            item.just_discovered = false;
        }
    }
}
