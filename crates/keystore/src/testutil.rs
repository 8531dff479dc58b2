//! Shared test utilities for key store testing.
//!
//! This module provides a [`ScriptedItemStore`] that records every call and
//! can be scripted to answer with chosen statuses, plus small fixtures. It is
//! feature-gated behind `testutil` to prevent leaking into production builds.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! pushauth-keystore = { path = "../keystore", features = ["testutil"] }
//! ```
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use pushauth_keystore::testutil::{ItemOp, ScriptedItemStore};
//! ```

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::{
    EcKeyStore,
    item::{
        ItemClass, ItemQuery, ItemResult, ItemStatus, MemorySecureItemStore, SecureItem,
        SecureItemStore,
    },
};

/// A call observed by [`ScriptedItemStore`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemOp {
    /// `insert` for the given account and class.
    Insert(String, ItemClass),
    /// `delete` for the given account and class.
    Delete(String, ItemClass),
    /// `query` for the given account and class.
    Query(String, ItemClass),
}

/// [`SecureItemStore`] wrapper that records calls and replays scripted statuses.
///
/// Scripted results are consumed in order, one per call of the matching
/// kind. A scripted `Err` is returned as-is; a scripted `Ok` or an empty
/// queue forwards the call to an inner [`MemorySecureItemStore`].
#[derive(Debug, Default)]
pub struct ScriptedItemStore {
    inner: MemorySecureItemStore,
    ops: Mutex<Vec<ItemOp>>,
    insert_script: Mutex<VecDeque<ItemResult<()>>>,
    delete_script: Mutex<VecDeque<ItemResult<()>>>,
}

impl ScriptedItemStore {
    /// Creates an empty store with no scripted statuses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues results for upcoming `insert` calls.
    #[must_use]
    pub fn with_inserts(self, results: impl IntoIterator<Item = ItemResult<()>>) -> Self {
        self.insert_script.lock().extend(results);
        self
    }

    /// Queues results for upcoming `delete` calls.
    #[must_use]
    pub fn with_deletes(self, results: impl IntoIterator<Item = ItemResult<()>>) -> Self {
        self.delete_script.lock().extend(results);
        self
    }

    /// Returns the calls observed so far.
    #[must_use]
    pub fn ops(&self) -> Vec<ItemOp> {
        self.ops.lock().clone()
    }

    /// Returns the number of `insert` calls observed.
    #[must_use]
    pub fn insert_count(&self) -> usize {
        self.ops.lock().iter().filter(|op| matches!(op, ItemOp::Insert(..))).count()
    }

    /// Returns the number of `delete` calls observed.
    #[must_use]
    pub fn delete_count(&self) -> usize {
        self.ops.lock().iter().filter(|op| matches!(op, ItemOp::Delete(..))).count()
    }

    /// Returns the inner store.
    #[must_use]
    pub fn inner(&self) -> &MemorySecureItemStore {
        &self.inner
    }
}

impl SecureItemStore for ScriptedItemStore {
    fn insert(&self, item: SecureItem) -> ItemResult<()> {
        self.ops.lock().push(ItemOp::Insert(item.account.clone(), item.class));
        let scripted = self.insert_script.lock().pop_front();
        match scripted {
            Some(Err(status)) => Err(status),
            Some(Ok(())) | None => self.inner.insert(item),
        }
    }

    fn delete(&self, query: &ItemQuery) -> ItemResult<()> {
        self.ops.lock().push(ItemOp::Delete(query.account.clone(), query.class));
        let scripted = self.delete_script.lock().pop_front();
        match scripted {
            Some(Err(status)) => Err(status),
            Some(Ok(())) | None => self.inner.delete(query),
        }
    }

    fn query(&self, query: &ItemQuery) -> ItemResult<SecureItem> {
        self.ops.lock().push(ItemOp::Query(query.account.clone(), query.class));
        self.inner.query(query)
    }
}

/// Creates an [`EcKeyStore`] backed by a fresh in-memory item store.
#[must_use]
pub fn memory_key_store() -> EcKeyStore<MemorySecureItemStore> {
    EcKeyStore::new(MemorySecureItemStore::new())
}

/// Shorthand for a scripted duplicate-item answer.
#[must_use]
pub fn duplicate() -> ItemResult<()> {
    Err(ItemStatus::DuplicateItem)
}
