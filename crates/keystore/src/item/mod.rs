//! Secure item storage contract.
//!
//! A [`SecureItemStore`] is the narrow surface a platform secure store
//! (keychain, keystore, HSM-backed vault) exposes to the key store: insert
//! an item, delete an item, query an item. Every operation answers with a
//! platform status; success is `Ok`, anything else is an [`ItemStatus`].
//!
//! Two statuses are distinguished because the key store branches on them:
//!
//! - [`ItemStatus::DuplicateItem`]: an item with the same account and class exists
//! - [`ItemStatus::ItemNotFound`]: no item matched the query
//!
//! Every other failure carries its raw code in [`ItemStatus::Other`].
//!
//! # Implementations
//!
//! | Store | Use Case | Persistence |
//! |-------|----------|-------------|
//! | [`MemorySecureItemStore`] | Testing, ephemeral sessions | No |
//! | [`FileSecureItemStore`] | Single-user devices, development | Yes |

mod file;
mod memory;

use std::fmt;

pub use file::{FileSecureItemStore, STATUS_IO_FAILURE};
pub use memory::MemorySecureItemStore;
use zeroize::Zeroizing;

/// Raw code reported for a duplicate item.
pub const STATUS_DUPLICATE_ITEM: i32 = -25299;

/// Raw code reported when no item matches a query.
pub const STATUS_ITEM_NOT_FOUND: i32 = -25300;

/// Result type for secure item operations.
pub type ItemResult<T> = Result<T, ItemStatus>;

/// Non-success status reported by a secure item store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ItemStatus {
    /// An item with the same account and class already exists.
    DuplicateItem,
    /// No item matched the query.
    ItemNotFound,
    /// Any other platform failure, with its raw code.
    Other(i32),
}

impl ItemStatus {
    /// Returns the raw platform status code.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::DuplicateItem => STATUS_DUPLICATE_ITEM,
            Self::ItemNotFound => STATUS_ITEM_NOT_FOUND,
            Self::Other(code) => code,
        }
    }

    /// Maps a raw platform code back to a status.
    #[must_use]
    pub fn from_code(code: i32) -> Self {
        match code {
            STATUS_DUPLICATE_ITEM => Self::DuplicateItem,
            STATUS_ITEM_NOT_FOUND => Self::ItemNotFound,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateItem => write!(f, "duplicate item ({})", self.code()),
            Self::ItemNotFound => write!(f, "item not found ({})", self.code()),
            Self::Other(code) => write!(f, "status {code}"),
        }
    }
}

/// Kind of key material held by an item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemClass {
    /// Private half of a key pair. Never leaves the key store.
    PrivateKey,
    /// Public half of a key pair.
    PublicKey,
}

impl ItemClass {
    /// Short stable name, used for on-disk layout.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PrivateKey => "private",
            Self::PublicKey => "public",
        }
    }
}

/// Identifies a single item: the account (key alias) and its class.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemQuery {
    /// Key alias the item is stored under.
    pub account: String,
    /// Kind of key material.
    pub class: ItemClass,
}

impl ItemQuery {
    /// Creates a query for the given alias and class.
    #[must_use]
    pub fn new(account: impl Into<String>, class: ItemClass) -> Self {
        Self { account: account.into(), class }
    }
}

/// An item held by a secure store.
///
/// The payload is wrapped in [`Zeroizing`] so key bytes are scrubbed when
/// the item is dropped.
#[derive(Clone)]
pub struct SecureItem {
    /// Key alias the item is stored under.
    pub account: String,
    /// Kind of key material.
    pub class: ItemClass,
    /// Encoded key material.
    pub data: Zeroizing<Vec<u8>>,
}

impl SecureItem {
    /// Creates a new item.
    #[must_use]
    pub fn new(account: impl Into<String>, class: ItemClass, data: Vec<u8>) -> Self {
        Self { account: account.into(), class, data: Zeroizing::new(data) }
    }

    /// Returns the query that addresses this item.
    #[must_use]
    pub fn query(&self) -> ItemQuery {
        ItemQuery::new(self.account.clone(), self.class)
    }
}

impl fmt::Debug for SecureItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureItem")
            .field("account", &self.account)
            .field("class", &self.class)
            .field("data", &format_args!("<{} bytes>", self.data.len()))
            .finish()
    }
}

/// Contract of a platform secure store.
///
/// Operations are blocking and must be callable from any thread. A store is
/// not required to serialize concurrent writers to the same account; the key
/// store treats one alias as having one logical owner.
pub trait SecureItemStore: Send + Sync {
    /// Inserts an item.
    ///
    /// # Errors
    ///
    /// Returns [`ItemStatus::DuplicateItem`] if an item with the same
    /// account and class exists, or [`ItemStatus::Other`] on platform failure.
    fn insert(&self, item: SecureItem) -> ItemResult<()>;

    /// Deletes the item matching the query.
    ///
    /// # Errors
    ///
    /// Returns [`ItemStatus::ItemNotFound`] if nothing matched.
    fn delete(&self, query: &ItemQuery) -> ItemResult<()>;

    /// Returns the item matching the query.
    ///
    /// # Errors
    ///
    /// Returns [`ItemStatus::ItemNotFound`] if nothing matched.
    fn query(&self, query: &ItemQuery) -> ItemResult<SecureItem>;
}

impl<S: SecureItemStore + ?Sized> SecureItemStore for std::sync::Arc<S> {
    fn insert(&self, item: SecureItem) -> ItemResult<()> {
        (**self).insert(item)
    }

    fn delete(&self, query: &ItemQuery) -> ItemResult<()> {
        (**self).delete(query)
    }

    fn query(&self, query: &ItemQuery) -> ItemResult<SecureItem> {
        (**self).query(query)
    }
}
