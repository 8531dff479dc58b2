//! Signature payload construction.
//!
//! A signature payload is the response of a pending challenge restricted to
//! its signature fields, plus a `status` key holding the requested target
//! status. It is built fresh for every response attempt and never persisted.
//!
//! ```text
//! signature_fields = ["a", "b"]
//! response         = {"a": "1", "b": "2", "c": "3"}
//! target           = approved
//!                         │
//!                         ▼
//! payload          = {"a": "1", "b": "2", "status": "approved"}
//! ```

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    error::{InputError, Result, VerifyError},
    types::{ChallengeStatus, SignableResponse},
};

/// Key holding the target status in every payload.
pub const STATUS_KEY: &str = "status";

/// Keyed payload that gets signed when answering a challenge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SignaturePayload(Map<String, Value>);

impl SignaturePayload {
    /// Builds the payload for answering with `target_status`.
    ///
    /// # Errors
    ///
    /// - [`InputError::InvalidSignatureFields`] if there are no signature fields
    /// - [`InputError::MissingResponseValue`] if a field has no value, or an
    ///   empty one, in the response
    ///
    /// # Examples
    ///
    /// ```
    /// use pushauth_challenge::{ChallengeStatus, SignableResponse, SignatureFields, SignaturePayload};
    /// use serde_json::json;
    ///
    /// let signable = SignableResponse {
    ///     signature_fields: SignatureFields::new(["a", "b"]),
    ///     response: json!({"a": "1", "b": "2", "c": "3"}).as_object().unwrap().clone(),
    /// };
    ///
    /// let payload = SignaturePayload::build(&signable, ChallengeStatus::Approved).unwrap();
    /// assert_eq!(payload.to_value(), json!({"a": "1", "b": "2", "status": "approved"}));
    /// ```
    pub fn build(
        signable: &SignableResponse,
        target_status: ChallengeStatus,
    ) -> std::result::Result<Self, InputError> {
        if signable.signature_fields.is_empty() {
            return Err(InputError::InvalidSignatureFields);
        }

        let mut payload = Map::new();
        for field in signable.signature_fields.iter() {
            match signable.response.get(field) {
                Some(value) if !is_empty_value(value) => {
                    payload.insert(field.to_owned(), value.clone());
                },
                _ => return Err(InputError::MissingResponseValue { field: field.to_owned() }),
            }
        }
        payload.insert(STATUS_KEY.to_owned(), Value::String(target_status.as_str().to_owned()));

        Ok(Self(payload))
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the payload keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns the payload as a JSON object value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// Serializes the payload to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Mapper`] if serialization fails.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.0)
            .map_err(|e| VerifyError::mapper_with_source("failed to encode signature payload", e))
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
