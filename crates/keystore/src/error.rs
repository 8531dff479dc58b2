//! Key store error types and result alias.
//!
//! This module defines the errors produced by [`SecureKeyStore`](crate::SecureKeyStore)
//! implementations. Item-level status codes coming from a
//! [`SecureItemStore`](crate::item::SecureItemStore) are mapped onto these
//! variants by the key store.
//!
//! # Error Types
//!
//! - [`KeyStoreError::KeyGeneration`] - A key pair could not be created or persisted
//! - [`KeyStoreError::NotFound`] - No key pair exists for the alias
//! - [`KeyStoreError::InvalidStatus`] - The secure store answered with an unexpected status
//! - [`KeyStoreError::KeyStorage`] - Signing or reading key material failed
//!
//! # Example
//!
//! ```
//! use pushauth_keystore::{KeyStoreError, KeyStoreResult};
//!
//! fn lookup(alias: &str) -> KeyStoreResult<()> {
//!     Err(KeyStoreError::not_found(alias))
//! }
//! ```

use std::sync::Arc;

use thiserror::Error;

use crate::item::ItemStatus;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for key store operations.
pub type KeyStoreResult<T> = Result<T, KeyStoreError>;

/// Errors that can occur during key store operations.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`; new variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KeyStoreError {
    /// Key pair generation or its persistence failed.
    #[error("Key generation failed: {message}")]
    KeyGeneration {
        /// Description of the failure.
        message: String,
        /// The underlying error, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// No key material is stored under the alias.
    #[error("Key not found: {alias}")]
    NotFound {
        /// The alias that was looked up.
        alias: String,
    },

    /// The secure item store reported a status the key store cannot handle.
    #[error("Invalid secure store status: {code}")]
    InvalidStatus {
        /// Raw platform status code.
        code: i32,
    },

    /// Reading key material or producing a signature failed.
    #[error("Key storage error: {message}")]
    KeyStorage {
        /// Description of the failure.
        message: String,
        /// The underlying error, if any.
        #[source]
        source: Option<BoxError>,
    },
}

impl KeyStoreError {
    /// Creates a new `KeyGeneration` error with the given message.
    #[must_use]
    pub fn key_generation(message: impl Into<String>) -> Self {
        Self::KeyGeneration { message: message.into(), source: None }
    }

    /// Creates a new `KeyGeneration` error wrapping a source error.
    #[must_use]
    pub fn key_generation_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::KeyGeneration { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `NotFound` error for the given alias.
    #[must_use]
    pub fn not_found(alias: impl Into<String>) -> Self {
        Self::NotFound { alias: alias.into() }
    }

    /// Creates a new `InvalidStatus` error from a raw status code.
    #[must_use]
    pub fn invalid_status(code: i32) -> Self {
        Self::InvalidStatus { code }
    }

    /// Creates a new `KeyStorage` error with the given message.
    #[must_use]
    pub fn key_storage(message: impl Into<String>) -> Self {
        Self::KeyStorage { message: message.into(), source: None }
    }

    /// Creates a new `KeyStorage` error wrapping a source error.
    #[must_use]
    pub fn key_storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::KeyStorage { message: message.into(), source: Some(Arc::new(source)) }
    }
}

impl From<ItemStatus> for KeyStoreError {
    fn from(status: ItemStatus) -> Self {
        Self::InvalidStatus { code: status.code() }
    }
}
