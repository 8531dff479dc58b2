//! Compact ES256 JWS encoding of signature payloads.
//!
//! The signed payload submitted with a challenge response is
//! `base64url(header) "." base64url(payload) "." base64url(r || s)`, with
//! the fixed header `{"alg":"ES256","typ":"JWT"}`. The key store produces
//! DER signatures; they are converted to the fixed 64-byte form here.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use pushauth_keystore::{PublicKey, SecureKeyStore, verify_fixed_signature};
use serde_json::Value;

use crate::{
    error::{Result, VerifyError},
    payload::SignaturePayload,
};

/// Protected header of every signed payload.
pub const JWS_HEADER: &str = r#"{"alg":"ES256","typ":"JWT"}"#;

/// Signs `payload` with the key stored under `alias` and returns the compact JWS.
///
/// # Errors
///
/// Returns [`VerifyError::KeyStorage`] if the key store cannot sign, and
/// [`VerifyError::Mapper`] if the payload cannot be encoded.
pub fn sign_payload<K: SecureKeyStore + ?Sized>(
    key_store: &K,
    alias: &str,
    payload: &SignaturePayload,
) -> Result<String> {
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(JWS_HEADER),
        URL_SAFE_NO_PAD.encode(payload.to_json_bytes()?)
    );
    let signature = key_store.sign(alias, signing_input.as_bytes())?;
    let fixed = signature.to_fixed_bytes()?;

    Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(fixed)))
}

/// Checks a compact JWS against `public_key`.
///
/// Never fails; a malformed token yields `false`. The signature segment
/// must be the fixed 64-byte `r || s` form; a DER segment is rejected.
#[must_use]
pub fn verify_compact(public_key: &PublicKey, token: &str) -> bool {
    let Some((signing_input, encoded_signature)) = token.rsplit_once('.') else {
        return false;
    };
    if signing_input.split('.').count() != 2 {
        return false;
    }
    let Ok(signature) = URL_SAFE_NO_PAD.decode(encoded_signature) else {
        return false;
    };
    verify_fixed_signature(&public_key.to_sec1_bytes(), signing_input.as_bytes(), &signature)
}

/// Decodes the payload segment of a compact JWS without checking the signature.
///
/// # Errors
///
/// Returns [`VerifyError::Mapper`] if the token is not a three-segment JWS
/// with a JSON payload.
pub fn decode_payload(token: &str) -> Result<Value> {
    let mut segments = token.split('.');
    let (Some(_), Some(payload), Some(_), None) =
        (segments.next(), segments.next(), segments.next(), segments.next())
    else {
        return Err(VerifyError::mapper("signed payload is not a compact JWS"));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| VerifyError::mapper_with_source("invalid JWS payload encoding", e))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| VerifyError::mapper_with_source("invalid JWS payload JSON", e))
}
