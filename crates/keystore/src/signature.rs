//! ECDSA P-256 signatures and verification.

use p256::ecdsa::{self, VerifyingKey, signature::Verifier};

use crate::error::{KeyStoreError, KeyStoreResult};

/// Length of a fixed-size (`r || s`) P-256 signature.
pub const FIXED_SIGNATURE_LENGTH: usize = 64;

/// ECDSA P-256 / SHA-256 signature in ASN.1 DER form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature(Vec<u8>);

impl Signature {
    /// Wraps DER-encoded signature bytes.
    #[must_use]
    pub fn from_der_bytes(der: Vec<u8>) -> Self {
        Self(der)
    }

    /// Returns the DER encoding.
    #[must_use]
    pub fn as_der(&self) -> &[u8] {
        &self.0
    }

    /// Converts to the fixed 64-byte `r || s` form used by JWS (ES256).
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError::KeyStorage`] if the DER bytes are malformed.
    pub fn to_fixed_bytes(&self) -> KeyStoreResult<[u8; FIXED_SIGNATURE_LENGTH]> {
        let signature = ecdsa::Signature::from_der(&self.0)
            .map_err(|e| KeyStoreError::key_storage_with_source("malformed DER signature", e))?;
        let mut fixed = [0u8; FIXED_SIGNATURE_LENGTH];
        fixed.copy_from_slice(&signature.to_bytes());
        Ok(fixed)
    }
}

impl From<ecdsa::Signature> for Signature {
    fn from(signature: ecdsa::Signature) -> Self {
        Self(signature.to_der().as_bytes().to_vec())
    }
}

/// Verifies `signature` over `data` with a SEC1-encoded P-256 public key.
///
/// Accepts DER or fixed 64-byte signatures. Never fails: a malformed key,
/// malformed signature, or mismatch all yield `false`.
#[must_use]
pub fn verify_signature(public_key: &[u8], data: &[u8], signature: &[u8]) -> bool {
    let Ok(key) = VerifyingKey::from_sec1_bytes(public_key) else {
        return false;
    };
    let Ok(signature) =
        ecdsa::Signature::from_der(signature).or_else(|_| ecdsa::Signature::from_slice(signature))
    else {
        return false;
    };
    key.verify(data, &signature).is_ok()
}

/// Verifies a fixed 64-byte `r || s` signature, as carried by JWS (ES256).
///
/// DER input is rejected even when it encodes a valid signature, so each
/// signature has exactly one accepted encoding.
#[must_use]
pub fn verify_fixed_signature(public_key: &[u8], data: &[u8], signature: &[u8]) -> bool {
    if signature.len() != FIXED_SIGNATURE_LENGTH {
        return false;
    }
    let Ok(key) = VerifyingKey::from_sec1_bytes(public_key) else {
        return false;
    };
    let Ok(signature) = ecdsa::Signature::from_slice(signature) else {
        return false;
    };
    key.verify(data, &signature).is_ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use p256::ecdsa::{SigningKey, signature::Signer};
    use proptest::prelude::*;
    use rand_core::OsRng;

    use super::*;

    fn keypair() -> (SigningKey, Vec<u8>) {
        let signing_key = SigningKey::random(&mut OsRng);
        let public = VerifyingKey::from(&signing_key).to_encoded_point(false).as_bytes().to_vec();
        (signing_key, public)
    }

    #[test]
    fn der_and_fixed_forms_both_verify() {
        let (signing_key, public) = keypair();
        let raw: ecdsa::Signature = signing_key.sign(b"payload");
        let signature = Signature::from(raw);

        assert!(verify_signature(&public, b"payload", signature.as_der()));
        assert!(verify_signature(&public, b"payload", &signature.to_fixed_bytes().unwrap()));
    }

    #[test]
    fn fixed_verifier_rejects_der() {
        let (signing_key, public) = keypair();
        let raw: ecdsa::Signature = signing_key.sign(b"payload");
        let signature = Signature::from(raw);

        assert!(verify_fixed_signature(&public, b"payload", &signature.to_fixed_bytes().unwrap()));
        assert!(!verify_fixed_signature(&public, b"payload", signature.as_der()));
        assert!(!verify_fixed_signature(&public, b"payloaf", &signature.to_fixed_bytes().unwrap()));
    }

    #[test]
    fn malformed_der_cannot_be_fixed() {
        let signature = Signature::from_der_bytes(vec![0x30, 0x01]);
        assert!(signature.to_fixed_bytes().is_err());
    }

    proptest! {
        /// Arbitrary bytes never verify and never panic.
        #[test]
        fn arbitrary_input_is_rejected(
            key in proptest::collection::vec(any::<u8>(), 0..80),
            signature in proptest::collection::vec(any::<u8>(), 0..80),
        ) {
            prop_assert!(!verify_signature(&key, b"data", &signature));
        }
    }
}
