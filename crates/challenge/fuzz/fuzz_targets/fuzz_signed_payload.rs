//! Fuzz target for signature payload construction and signing.
//!
//! Builds payloads from arbitrary field lists and responses. A payload that
//! builds must contain exactly the selected fields plus the target status,
//! and its compact JWS must verify and decode back to the same object.

#![no_main]

use std::sync::LazyLock;

use arbitrary::Arbitrary;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use libfuzzer_sys::fuzz_target;
use pushauth_challenge::{
    ChallengeStatus, InputError, SignableResponse, SignatureFields, SignaturePayload,
    jws::{self, JWS_HEADER},
    payload::STATUS_KEY,
};
use pushauth_keystore::{
    EcKeyStore, KeyPair, SecureKeyStore, item::MemorySecureItemStore, testutil::memory_key_store,
};
use serde_json::{Map, Value};

const ALIAS: &str = "fuzz-key";

static KEYS: LazyLock<(EcKeyStore<MemorySecureItemStore>, KeyPair)> = LazyLock::new(|| {
    let store = memory_key_store();
    let pair = store.generate_key_pair(ALIAS).expect("key generation");
    (store, pair)
});

#[derive(Debug, Arbitrary)]
struct Input {
    fields: Vec<String>,
    response: Vec<(String, Option<String>)>,
    approve: bool,
}

fuzz_target!(|input: Input| {
    let response: Map<String, Value> = input
        .response
        .into_iter()
        .map(|(key, value)| (key, value.map_or(Value::Null, Value::String)))
        .collect();
    let signable = SignableResponse {
        signature_fields: SignatureFields::new(input.fields.iter().map(String::as_str)),
        response,
    };
    let target = if input.approve { ChallengeStatus::Approved } else { ChallengeStatus::Denied };

    let payload = match SignaturePayload::build(&signable, target) {
        Ok(payload) => payload,
        Err(InputError::InvalidSignatureFields) => {
            assert!(signable.signature_fields.is_empty());
            return;
        },
        Err(InputError::MissingResponseValue { field }) => {
            assert!(signable.signature_fields.iter().any(|name| name == field));
            return;
        },
        Err(other) => panic!("unexpected error: {other:?}"),
    };

    assert_eq!(payload.get(STATUS_KEY), Some(&Value::String(target.as_str().to_owned())));
    for key in payload.keys() {
        assert!(key == STATUS_KEY || signable.signature_fields.iter().any(|name| name == key));
    }

    let (store, pair) = &*KEYS;
    let token = jws::sign_payload(store, ALIAS, &payload).expect("signing");
    assert!(jws::verify_compact(&pair.public_key, &token));

    let header = token.split('.').next().expect("header segment");
    assert_eq!(URL_SAFE_NO_PAD.decode(header).expect("header encoding"), JWS_HEADER.as_bytes());
    assert_eq!(jws::decode_payload(&token).expect("payload decodes"), payload.to_value());
});
