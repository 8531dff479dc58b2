//! Fuzz target for challenge body mapping.
//!
//! Feeds arbitrary bodies and signature-fields headers to the mapper. Every
//! input must map to `Ok(Challenge)` or `Err(VerifyError::Mapper)`, and a
//! mapped challenge must keep its signature fields unique.

#![no_main]

use std::collections::HashSet;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pushauth_challenge::{ChallengeMapper, ChallengeStatus, VerifyError};

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    body: &'a [u8],
    header: Option<&'a str>,
    delimiter: char,
}

fuzz_target!(|input: Input<'_>| {
    let mapper = ChallengeMapper::with_delimiter(input.delimiter);

    match mapper.map(input.body, input.header) {
        Ok(challenge) => {
            if let Some(fields) = challenge.signature_fields() {
                assert_eq!(challenge.status, ChallengeStatus::Pending);
                let unique: HashSet<&str> = fields.iter().collect();
                assert_eq!(unique.len(), fields.len());
            }
        },
        Err(err) => assert!(matches!(err, VerifyError::Mapper { .. }), "unexpected error: {err:?}"),
    }
});
