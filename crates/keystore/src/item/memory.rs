//! In-memory secure item store.

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;

use super::{ItemClass, ItemQuery, ItemResult, ItemStatus, SecureItem, SecureItemStore};

/// In-memory implementation of [`SecureItemStore`] for testing.
///
/// Items live in a thread-safe hash map keyed by `(account, class)`. Nothing
/// survives the process.
///
/// # Cloning
///
/// Clones share the same underlying map via [`Arc`].
///
/// # Examples
///
/// ```
/// use pushauth_keystore::item::{
///     ItemClass, ItemQuery, ItemStatus, MemorySecureItemStore, SecureItem, SecureItemStore,
/// };
///
/// let store = MemorySecureItemStore::new();
/// store.insert(SecureItem::new("alias", ItemClass::PublicKey, vec![4, 1, 2])).unwrap();
///
/// let duplicate = store.insert(SecureItem::new("alias", ItemClass::PublicKey, vec![4]));
/// assert_eq!(duplicate, Err(ItemStatus::DuplicateItem));
///
/// let item = store.query(&ItemQuery::new("alias", ItemClass::PublicKey)).unwrap();
/// assert_eq!(item.data.as_slice(), &[4, 1, 2]);
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemorySecureItemStore {
    items: Arc<RwLock<HashMap<(String, ItemClass), SecureItem>>>,
}

impl MemorySecureItemStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Returns `true` if the store holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    fn map_key(query: &ItemQuery) -> (String, ItemClass) {
        (query.account.clone(), query.class)
    }
}

impl SecureItemStore for MemorySecureItemStore {
    fn insert(&self, item: SecureItem) -> ItemResult<()> {
        let key = Self::map_key(&item.query());
        let mut items = self.items.write();

        if items.contains_key(&key) {
            return Err(ItemStatus::DuplicateItem);
        }

        items.insert(key, item);
        Ok(())
    }

    fn delete(&self, query: &ItemQuery) -> ItemResult<()> {
        self.items.write().remove(&Self::map_key(query)).map(|_| ()).ok_or(ItemStatus::ItemNotFound)
    }

    fn query(&self, query: &ItemQuery) -> ItemResult<SecureItem> {
        self.items.read().get(&Self::map_key(query)).cloned().ok_or(ItemStatus::ItemNotFound)
    }
}
