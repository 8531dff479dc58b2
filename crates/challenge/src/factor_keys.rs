//! Key pair lifecycle of push factors.
//!
//! Each push factor is backed by one key pair whose alias is
//! `{prefix}{factor_sid}-{suffix}`, where the suffix is random so that a
//! rotated key never reuses the alias of the key it replaces.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use pushauth_keystore::{KeyPair, SecureKeyStore};
use rand_core::{OsRng, RngCore};

use crate::{
    config::PushAuthConfig,
    error::{InputError, Result, VerifyError},
    state_machine::ALIAS_NOT_FOUND,
    types::Factor,
};

/// Number of random bytes in an alias suffix.
const ALIAS_SUFFIX_BYTES: usize = 8;

/// Creates, rotates and deletes the key pairs backing push factors.
#[derive(Debug)]
pub struct FactorKeys<K> {
    key_store: K,
    alias_prefix: String,
}

impl<K: SecureKeyStore> FactorKeys<K> {
    /// Creates a lifecycle manager using `alias_prefix` for new aliases.
    #[must_use]
    pub fn new(key_store: K, alias_prefix: impl Into<String>) -> Self {
        Self { key_store, alias_prefix: alias_prefix.into() }
    }

    /// Creates a lifecycle manager using the configured alias prefix.
    #[must_use]
    pub fn from_config(key_store: K, config: &PushAuthConfig) -> Self {
        Self::new(key_store, config.key_alias_prefix())
    }

    /// Returns the key store.
    #[must_use]
    pub fn key_store(&self) -> &K {
        &self.key_store
    }

    fn new_alias(&self, factor_sid: &str) -> String {
        let mut suffix = [0u8; ALIAS_SUFFIX_BYTES];
        OsRng.fill_bytes(&mut suffix);
        format!("{}{factor_sid}-{}", self.alias_prefix, URL_SAFE_NO_PAD.encode(suffix))
    }

    /// Generates the key pair for a factor being enrolled.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::KeyStorage`] if generation fails.
    #[tracing::instrument(skip(self))]
    pub fn create(&self, factor_sid: &str) -> Result<KeyPair> {
        let alias = self.new_alias(factor_sid);
        let pair = self.key_store.generate_key_pair(&alias)?;
        tracing::debug!(alias = %pair.alias(), "created factor key pair");
        Ok(pair)
    }

    /// Returns the base64url SEC1 public key of `factor`, for enrollment payloads.
    ///
    /// # Errors
    ///
    /// - [`InputError::InvalidFactor`] if the factor is not a push factor
    /// - [`VerifyError::Storage`] if it has no key pair alias
    /// - [`VerifyError::KeyStorage`] if the key pair cannot be retrieved
    pub fn public_key_for(&self, factor: &Factor) -> Result<String> {
        let alias = signing_alias(factor)?;
        Ok(self.key_store.retrieve(alias)?.public_key.to_base64url())
    }

    /// Replaces the key pair of `factor` and returns the factor pointing at it.
    ///
    /// The old key pair is deleted only after the new one exists; if
    /// generation fails, the factor and its key are left untouched.
    ///
    /// # Errors
    ///
    /// - [`InputError::InvalidFactor`] if the factor is not a push factor
    /// - [`VerifyError::KeyStorage`] if the new key pair cannot be generated
    #[tracing::instrument(skip(self, factor), fields(factor_sid = %factor.sid))]
    pub fn rotate(&self, factor: &Factor) -> Result<Factor> {
        if !factor.kind.can_sign() {
            return Err(InputError::InvalidFactor.into());
        }

        let pair = self.create(&factor.sid)?;
        let rotated = factor.clone().with_key_pair_alias(pair.alias());

        if let Some(old_alias) = factor.key_pair_alias()
            && let Err(err) = self.key_store.delete(old_alias)
        {
            tracing::warn!(
                old_alias,
                error = %err,
                "failed to delete replaced key pair",
            );
        }

        Ok(rotated)
    }

    /// Deletes the key pair backing `factor`.
    ///
    /// Idempotent; factors without a key pair are a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::KeyStorage`] if the key store fails to delete.
    #[tracing::instrument(skip(self, factor), fields(factor_sid = %factor.sid))]
    pub fn delete(&self, factor: &Factor) -> Result<()> {
        match factor.key_pair_alias() {
            Some(alias) => Ok(self.key_store.delete(alias)?),
            None => Ok(()),
        }
    }
}

fn signing_alias(factor: &Factor) -> Result<&str> {
    if !factor.kind.can_sign() {
        return Err(InputError::InvalidFactor.into());
    }
    factor.key_pair_alias().ok_or_else(|| VerifyError::storage(ALIAS_NOT_FOUND))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use pushauth_keystore::{
        EcKeyStore, KeyStoreError, PublicKey,
        item::ItemStatus,
        testutil::{ScriptedItemStore, memory_key_store},
    };

    use super::*;
    use crate::testutil::{push_factor, totp_factor};

    #[test]
    fn test_create_uses_prefix_and_unique_suffix() {
        let keys = FactorKeys::new(memory_key_store(), "pushauth-");

        let first = keys.create("YF1").unwrap();
        let second = keys.create("YF1").unwrap();

        assert!(first.alias().starts_with("pushauth-YF1-"));
        assert_ne!(first.alias(), second.alias());
        assert!(keys.key_store().retrieve(first.alias()).is_ok());
    }

    #[test]
    fn test_public_key_for_round_trips() {
        let keys = FactorKeys::new(memory_key_store(), "p-");
        let pair = keys.create("YF1").unwrap();
        let factor = push_factor("YF1", pair.alias());

        let encoded = keys.public_key_for(&factor).unwrap();
        let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(encoded).unwrap();

        assert_eq!(PublicKey::from_sec1_bytes(&decoded).unwrap(), pair.public_key);
    }

    #[test]
    fn test_public_key_for_non_push_factor() {
        let keys = FactorKeys::new(memory_key_store(), "p-");

        let err = keys.public_key_for(&totp_factor("YF1")).unwrap_err();
        assert_eq!(err.as_input(), Some(&InputError::InvalidFactor));
    }

    #[test]
    fn test_rotate_replaces_and_deletes_old_key() {
        let keys = FactorKeys::new(memory_key_store(), "p-");
        let old = keys.create("YF1").unwrap();
        let factor = push_factor("YF1", old.alias());

        let rotated = keys.rotate(&factor).unwrap();
        let new_alias = rotated.key_pair_alias().unwrap();

        assert_ne!(new_alias, old.alias());
        assert!(keys.key_store().retrieve(new_alias).is_ok());
        assert!(matches!(
            keys.key_store().retrieve(old.alias()),
            Err(KeyStoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_rotate_failure_keeps_old_key() {
        let keys = FactorKeys::new(
            EcKeyStore::new(ScriptedItemStore::new().with_inserts([
                Ok(()),
                Ok(()),
                Err(ItemStatus::Other(-1)),
            ])),
            "p-",
        );
        let old = keys.create("YF1").unwrap();
        let factor = push_factor("YF1", old.alias());

        let err = keys.rotate(&factor).unwrap_err();

        assert!(matches!(err, VerifyError::KeyStorage(KeyStoreError::KeyGeneration { .. })));
        assert!(keys.key_store().retrieve(old.alias()).is_ok());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let keys = FactorKeys::new(memory_key_store(), "p-");
        let pair = keys.create("YF1").unwrap();
        let factor = push_factor("YF1", pair.alias());

        keys.delete(&factor).unwrap();
        keys.delete(&factor).unwrap();

        assert!(keys.key_store().retrieve(pair.alias()).is_err());
    }

    #[test]
    fn test_delete_non_push_factor_is_noop() {
        let keys = FactorKeys::new(memory_key_store(), "p-");
        keys.delete(&totp_factor("YF1")).unwrap();
    }
}
