//! Secure key store: lifecycle of P-256 key pairs addressed by alias.
//!
//! This module provides the [`SecureKeyStore`] trait and [`EcKeyStore`], its
//! implementation on top of any [`SecureItemStore`].
//!
//! # Key Lifecycle
//!
//! ```text
//! generate_key_pair(alias) ──► retrieve / sign ──► delete(alias)
//!          │                        ▲
//!          └── force_save(public) ──┘
//! ```
//!
//! # Bounded Upsert
//!
//! Secure stores can keep stale entries across reinstalls, so a plain insert
//! may report a duplicate for an alias the application believes is free.
//! Every write goes through an upsert that inserts, and on
//! [`ItemStatus::DuplicateItem`] deletes the existing item and inserts once
//! more. There is no third attempt.

use std::sync::Arc;

use fail::fail_point;
use p256::ecdsa::{SigningKey, VerifyingKey, signature::Signer};
use rand_core::OsRng;

use crate::{
    error::{KeyStoreError, KeyStoreResult},
    item::{ItemClass, ItemQuery, ItemResult, ItemStatus, SecureItem, SecureItemStore},
    key_pair::{KeyPair, PublicKey},
    signature::{Signature, verify_signature},
};

/// Owner of asymmetric key pairs.
///
/// Operations are blocking calls into the underlying secure store. They are
/// safe to invoke from any thread, but one alias is expected to have one
/// logical owner at a time.
pub trait SecureKeyStore: Send + Sync {
    /// Creates a P-256 key pair bound to `alias`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError::KeyGeneration`] if the key material cannot
    /// be created or persisted.
    fn generate_key_pair(&self, alias: &str) -> KeyStoreResult<KeyPair>;

    /// Returns the key pair stored under `alias`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError::NotFound`] if no private key exists for the alias.
    fn retrieve(&self, alias: &str) -> KeyStoreResult<KeyPair>;

    /// Stores public key material under `alias`, replacing any stale entry.
    ///
    /// Issues at most two inserts and one delete, in the order
    /// insert → \[delete → insert\].
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError::InvalidStatus`] with the store's code for any
    /// status other than a first-attempt duplicate.
    fn force_save(&self, public_key_material: &[u8], alias: &str) -> KeyStoreResult<()>;

    /// Signs `data` with the private key stored under `alias`
    /// (ECDSA P-256 over SHA-256).
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError::KeyStorage`] if the alias is missing or signing fails.
    fn sign(&self, alias: &str, data: &[u8]) -> KeyStoreResult<Signature>;

    /// Checks `signature` over `data` against a SEC1-encoded public key.
    ///
    /// Never fails; any malformed input yields `false`.
    fn verify(&self, public_key: &[u8], data: &[u8], signature: &[u8]) -> bool {
        verify_signature(public_key, data, signature)
    }

    /// Removes the key pair stored under `alias`.
    ///
    /// Idempotent: a missing alias is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError::InvalidStatus`] if the store fails to delete.
    fn delete(&self, alias: &str) -> KeyStoreResult<()>;
}

impl<K: SecureKeyStore + ?Sized> SecureKeyStore for Arc<K> {
    fn generate_key_pair(&self, alias: &str) -> KeyStoreResult<KeyPair> {
        (**self).generate_key_pair(alias)
    }

    fn retrieve(&self, alias: &str) -> KeyStoreResult<KeyPair> {
        (**self).retrieve(alias)
    }

    fn force_save(&self, public_key_material: &[u8], alias: &str) -> KeyStoreResult<()> {
        (**self).force_save(public_key_material, alias)
    }

    fn sign(&self, alias: &str, data: &[u8]) -> KeyStoreResult<Signature> {
        (**self).sign(alias, data)
    }

    fn verify(&self, public_key: &[u8], data: &[u8], signature: &[u8]) -> bool {
        (**self).verify(public_key, data, signature)
    }

    fn delete(&self, alias: &str) -> KeyStoreResult<()> {
        (**self).delete(alias)
    }
}

/// Inserts `item`, replacing a duplicate at most once.
pub(crate) fn upsert_item<S: SecureItemStore + ?Sized>(
    store: &S,
    item: SecureItem,
) -> ItemResult<()> {
    fail_point!("keystore-insert", |_| Err(ItemStatus::Other(crate::item::STATUS_IO_FAILURE)));

    let query = item.query();
    match store.insert(item.clone()) {
        Ok(()) => Ok(()),
        Err(ItemStatus::DuplicateItem) => {
            tracing::debug!(
                account = %query.account,
                class = query.class.as_str(),
                "stale secure item found, replacing",
            );
            match store.delete(&query) {
                Ok(()) | Err(ItemStatus::ItemNotFound) => {},
                Err(status) => return Err(status),
            }
            store.insert(item)
        },
        Err(status) => Err(status),
    }
}

/// [`SecureKeyStore`] holding P-256 keys in a [`SecureItemStore`].
///
/// The private scalar is persisted as a private-key item and only
/// materialized inside [`sign`](SecureKeyStore::sign); the returned
/// [`KeyPair`] carries an opaque handle.
///
/// # Examples
///
/// ```
/// use pushauth_keystore::{EcKeyStore, SecureKeyStore, item::MemorySecureItemStore};
///
/// let store = EcKeyStore::new(MemorySecureItemStore::new());
/// let pair = store.generate_key_pair("factor-key").unwrap();
///
/// let signature = store.sign("factor-key", b"payload").unwrap();
/// let public = pair.public_key.to_sec1_bytes();
/// assert!(store.verify(&public, b"payload", signature.as_der()));
/// ```
#[derive(Debug, Clone)]
pub struct EcKeyStore<S> {
    items: S,
}

impl<S: SecureItemStore> EcKeyStore<S> {
    /// Creates a key store on top of `items`.
    #[must_use]
    pub fn new(items: S) -> Self {
        Self { items }
    }

    /// Returns the underlying item store.
    #[must_use]
    pub fn items(&self) -> &S {
        &self.items
    }

    fn load_signing_key(&self, alias: &str) -> KeyStoreResult<SigningKey> {
        let item = self
            .items
            .query(&ItemQuery::new(alias, ItemClass::PrivateKey))
            .map_err(|status| match status {
                ItemStatus::ItemNotFound => KeyStoreError::not_found(alias),
                other => KeyStoreError::from(other),
            })?;
        SigningKey::from_slice(&item.data)
            .map_err(|e| KeyStoreError::key_storage_with_source("corrupt private key item", e))
    }
}

impl<S: SecureItemStore> SecureKeyStore for EcKeyStore<S> {
    #[tracing::instrument(skip(self))]
    fn generate_key_pair(&self, alias: &str) -> KeyStoreResult<KeyPair> {
        let signing_key = SigningKey::random(&mut OsRng);
        let public_key = PublicKey::from(VerifyingKey::from(&signing_key));
        let private_item =
            SecureItem::new(alias, ItemClass::PrivateKey, signing_key.to_bytes().to_vec());

        upsert_item(&self.items, private_item).map_err(|status| {
            KeyStoreError::key_generation(format!("failed to persist private key: {status}"))
        })?;

        if let Err(err) = self.force_save(&public_key.to_sec1_bytes(), alias) {
            // Do not leave a private key without its public half
            match self.items.delete(&ItemQuery::new(alias, ItemClass::PrivateKey)) {
                Ok(()) | Err(ItemStatus::ItemNotFound) => {},
                Err(status) => {
                    tracing::warn!(%status, "failed to roll back private key item");
                },
            }
            return Err(KeyStoreError::key_generation(format!(
                "failed to persist public key: {err}"
            )));
        }

        tracing::debug!("generated key pair");
        Ok(KeyPair::new(alias, public_key))
    }

    #[tracing::instrument(skip(self))]
    fn retrieve(&self, alias: &str) -> KeyStoreResult<KeyPair> {
        let signing_key = self.load_signing_key(alias).map_err(|err| match err {
            KeyStoreError::NotFound { .. } => err,
            other => KeyStoreError::key_storage(format!("failed to read private key: {other}")),
        })?;

        let public_key = match self.items.query(&ItemQuery::new(alias, ItemClass::PublicKey)) {
            Ok(item) => PublicKey::from_sec1_bytes(&item.data)?,
            Err(ItemStatus::ItemNotFound) => PublicKey::from(VerifyingKey::from(&signing_key)),
            Err(status) => return Err(status.into()),
        };

        Ok(KeyPair::new(alias, public_key))
    }

    #[tracing::instrument(skip(self, public_key_material), fields(len = public_key_material.len()))]
    fn force_save(&self, public_key_material: &[u8], alias: &str) -> KeyStoreResult<()> {
        upsert_item(
            &self.items,
            SecureItem::new(alias, ItemClass::PublicKey, public_key_material.to_vec()),
        )
        .map_err(KeyStoreError::from)
    }

    #[tracing::instrument(skip(self, data), fields(len = data.len()))]
    fn sign(&self, alias: &str, data: &[u8]) -> KeyStoreResult<Signature> {
        let signing_key = self.load_signing_key(alias).map_err(|err| match err {
            KeyStoreError::NotFound { alias } => {
                KeyStoreError::key_storage(format!("no private key for alias {alias}"))
            },
            other => KeyStoreError::key_storage(format!("failed to load private key: {other}")),
        })?;

        let signature: p256::ecdsa::Signature = signing_key
            .try_sign(data)
            .map_err(|e| KeyStoreError::key_storage_with_source("signing failed", e))?;
        Ok(Signature::from(signature))
    }

    #[tracing::instrument(skip(self))]
    fn delete(&self, alias: &str) -> KeyStoreResult<()> {
        let mut first_error = None;
        for class in [ItemClass::PrivateKey, ItemClass::PublicKey] {
            match self.items.delete(&ItemQuery::new(alias, class)) {
                Ok(()) | Err(ItemStatus::ItemNotFound) => {},
                Err(status) => {
                    tracing::warn!(class = class.as_str(), %status, "failed to delete key item");
                    first_error.get_or_insert(status);
                },
            }
        }
        match first_error {
            Some(status) => Err(status.into()),
            None => Ok(()),
        }
    }
}
