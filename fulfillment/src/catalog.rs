//! Catalog provider seam
//!
//! The catalog owns item existence and the active flag; the coordinator only
//! consults it at the start of a fulfillment attempt. An in-memory
//! implementation ships for tests and demos.

use ledger_core::ItemId;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Catalog view of an item, as seen by the coordinator
#[derive(Debug, Clone)]
pub struct CatalogItem {
    /// Item identity
    pub id: ItemId,
    /// Display name
    pub name: String,
    /// Deactivated items cannot be ordered
    pub active: bool,
}

/// Item existence/active lookups, supplied by the catalog owner
pub trait CatalogProvider: Send + Sync {
    /// Look up an item; `None` if it does not exist
    fn item(&self, item_id: &ItemId) -> Option<CatalogItem>;
}

/// In-memory catalog for tests and demos
#[derive(Default)]
pub struct InMemoryCatalog {
    items: RwLock<HashMap<ItemId, CatalogItem>>,
}

impl InMemoryCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an item
    pub fn insert(&self, item: CatalogItem) {
        self.items.write().insert(item.id.clone(), item);
    }

    /// Flip an item's active flag
    pub fn set_active(&self, item_id: &ItemId, active: bool) {
        if let Some(item) = self.items.write().get_mut(item_id) {
            item.active = active;
        }
    }
}

impl CatalogProvider for InMemoryCatalog {
    fn item(&self, item_id: &ItemId) -> Option<CatalogItem> {
        self.items.read().get(item_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_catalog() {
        let catalog = InMemoryCatalog::new();
        let id = ItemId::new("sku-1");
        catalog.insert(CatalogItem {
            id: id.clone(),
            name: "Widget".to_string(),
            active: true,
        });

        assert!(catalog.item(&id).unwrap().active);

        catalog.set_active(&id, false);
        assert!(!catalog.item(&id).unwrap().active);

        assert!(catalog.item(&ItemId::new("missing")).is_none());
    }
}
