//! Secure key storage for push authentication.
//!
//! This crate owns the asymmetric key material a device uses to answer
//! authentication challenges. Private keys are generated and kept inside a
//! secure item store; callers only ever see public keys and opaque handles.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Challenge signing layer                     │
//! │        (state machine, factor key lifecycle)                │
//! ├─────────────────────────────────────────────────────────────┤
//! │                  SecureKeyStore trait                       │
//! │  generate_key_pair │ retrieve │ force_save │ sign │ delete  │
//! ├─────────────────────────────────────────────────────────────┤
//! │                 SecureItemStore trait                       │
//! │            (insert, delete, query + status codes)           │
//! ├──────────────────────────┬──────────────────────────────────┤
//! │  MemorySecureItemStore   │      FileSecureItemStore         │
//! │       (testing)          │        (on-device)               │
//! └──────────────────────────┴──────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use pushauth_keystore::{EcKeyStore, SecureKeyStore, item::MemorySecureItemStore};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = EcKeyStore::new(MemorySecureItemStore::new());
//!
//! let pair = store.generate_key_pair("factor-YF0123")?;
//! let signature = store.sign("factor-YF0123", b"data")?;
//! assert!(store.verify(&pair.public_key.to_sec1_bytes(), b"data", signature.as_der()));
//!
//! store.delete("factor-YF0123")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module (scripted item store, fixtures).
//! - **`failpoints`**: Activates `fail` fail points for fault-injection tests.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod item;
mod key_pair;
mod key_store;
mod signature;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;

pub use error::{BoxError, KeyStoreError, KeyStoreResult};
pub use key_pair::{KeyPair, PrivateKeyHandle, PublicKey};
pub use key_store::{EcKeyStore, SecureKeyStore};
pub use signature::{
    FIXED_SIGNATURE_LENGTH, Signature, verify_fixed_signature, verify_signature,
};
