//! Key pair handles returned by the key store.

use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use p256::ecdsa::VerifyingKey;

use crate::error::{KeyStoreError, KeyStoreResult};

/// P-256 public key.
///
/// Wraps the verifying key so callers never depend on the curve crate
/// directly. Encodes as an uncompressed SEC1 point (`0x04 || x || y`).
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Parses a SEC1-encoded (compressed or uncompressed) public key.
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError::KeyStorage`] if the bytes are not a valid
    /// point on P-256.
    pub fn from_sec1_bytes(bytes: &[u8]) -> KeyStoreResult<Self> {
        VerifyingKey::from_sec1_bytes(bytes)
            .map(Self)
            .map_err(|e| KeyStoreError::key_storage_with_source("invalid public key", e))
    }

    /// Returns the uncompressed SEC1 encoding.
    #[must_use]
    pub fn to_sec1_bytes(&self) -> Vec<u8> {
        self.0.to_encoded_point(false).as_bytes().to_vec()
    }

    /// Returns the uncompressed SEC1 encoding as base64url without padding.
    #[must_use]
    pub fn to_base64url(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.to_sec1_bytes())
    }

    /// Returns the affine `(x, y)` coordinates, each base64url-encoded
    /// without padding (JWK `x` and `y` members).
    #[must_use]
    pub fn jwk_coordinates(&self) -> (String, String) {
        let bytes = self.to_sec1_bytes();
        // Uncompressed SEC1: 0x04 || x (32) || y (32)
        (URL_SAFE_NO_PAD.encode(&bytes[1..33]), URL_SAFE_NO_PAD.encode(&bytes[33..65]))
    }

    pub(crate) fn verifying_key(&self) -> &VerifyingKey {
        &self.0
    }
}

impl From<VerifyingKey> for PublicKey {
    fn from(key: VerifyingKey) -> Self {
        Self(key)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PublicKey").field(&self.to_base64url()).finish()
    }
}

/// Opaque reference to a private key held by the key store.
///
/// Carries only the alias; the private scalar is never exposed.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PrivateKeyHandle {
    alias: String,
}

impl PrivateKeyHandle {
    pub(crate) fn new(alias: impl Into<String>) -> Self {
        Self { alias: alias.into() }
    }

    /// Alias of the key this handle refers to.
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }
}

/// A key pair identified by its alias.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyPair {
    /// Public half.
    pub public_key: PublicKey,
    /// Handle to the private half.
    pub private_key: PrivateKeyHandle,
}

impl KeyPair {
    pub(crate) fn new(alias: impl Into<String>, public_key: PublicKey) -> Self {
        Self { public_key, private_key: PrivateKeyHandle::new(alias) }
    }

    /// Alias the key pair is stored under.
    #[must_use]
    pub fn alias(&self) -> &str {
        self.private_key.alias()
    }
}
