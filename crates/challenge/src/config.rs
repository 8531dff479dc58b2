//! Push authentication configuration.
//!
//! [`PushAuthConfig`] is constructed once by the embedding application and
//! passed to the components that need it. It can be built in code through
//! the validating builder or deserialized from a config file, in which case
//! [`PushAuthConfig::validate`] should be called before use.

use std::{path::PathBuf, sync::Arc, time::Duration};

use pushauth_keystore::{
    EcKeyStore, SecureKeyStore,
    item::{FileSecureItemStore, MemorySecureItemStore},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retry::MAX_CLOCK_SKEW_RETRIES;

/// Default request timeout (30 seconds).
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default prefix of key pair aliases.
pub const DEFAULT_KEY_ALIAS_PREFIX: &str = "pushauth-";

/// Default name of the header listing the fields to sign.
pub const DEFAULT_SIGNATURE_FIELDS_HEADER: &str = "Twilio-Verify-Signature-Fields";

/// Configuration errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A field holds an unusable value.
    #[error("invalid configuration for {field}: {message}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// The configured key store could not be opened.
    #[error("failed to open key store at {}", path.display())]
    KeyStore {
        /// Configured key store path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid { field, message: message.into() }
    }
}

/// Configuration for the challenge components.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use pushauth_challenge::PushAuthConfig;
///
/// let config = PushAuthConfig::builder()
///     .base_url("https://verify.example.com/v2")
///     .request_timeout(Duration::from_secs(10))
///     .build()?;
///
/// assert_eq!(config.clock_skew_retries(), 1);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PushAuthConfig {
    /// Base URL of the challenge API.
    pub(crate) base_url: String,

    /// Directory of the file-backed key store; in-memory when unset.
    #[serde(default)]
    pub(crate) key_store_path: Option<PathBuf>,

    /// Prefix of generated key pair aliases.
    #[serde(default = "default_key_alias_prefix")]
    pub(crate) key_alias_prefix: String,

    /// Name of the header listing the fields to sign.
    #[serde(default = "default_signature_fields_header")]
    pub(crate) signature_fields_header: String,

    /// Clock-skew retries per request (0 or 1).
    #[serde(default = "default_clock_skew_retries")]
    pub(crate) clock_skew_retries: u32,

    /// Request timeout.
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    pub(crate) request_timeout: Duration,
}

fn default_key_alias_prefix() -> String {
    DEFAULT_KEY_ALIAS_PREFIX.to_owned()
}

fn default_signature_fields_header() -> String {
    DEFAULT_SIGNATURE_FIELDS_HEADER.to_owned()
}

fn default_clock_skew_retries() -> u32 {
    MAX_CLOCK_SKEW_RETRIES
}

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

#[bon::bon]
impl PushAuthConfig {
    /// Creates a new configuration, validating all fields.
    ///
    /// # Optional Fields
    ///
    /// * `key_store_path` - Directory of the file-backed key store (default: in-memory).
    /// * `key_alias_prefix` - Prefix of key pair aliases (default: `pushauth-`).
    /// * `signature_fields_header` - Header listing the fields to sign.
    /// * `clock_skew_retries` - Retries after a clock resync, 0 or 1 (default: 1).
    /// * `request_timeout` - Request timeout (default: 30 seconds).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if:
    /// - `base_url` is empty or not an `http`/`https` URL
    /// - `key_alias_prefix` or `signature_fields_header` is empty
    /// - `clock_skew_retries` is greater than 1
    /// - `request_timeout` is zero
    #[builder]
    pub fn new(
        #[builder(into)] base_url: String,
        #[builder(into)] key_store_path: Option<PathBuf>,
        #[builder(into, default = DEFAULT_KEY_ALIAS_PREFIX.to_owned())] key_alias_prefix: String,
        #[builder(into, default = DEFAULT_SIGNATURE_FIELDS_HEADER.to_owned())]
        signature_fields_header: String,
        #[builder(default = MAX_CLOCK_SKEW_RETRIES)] clock_skew_retries: u32,
        #[builder(default = DEFAULT_REQUEST_TIMEOUT)] request_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            base_url,
            key_store_path,
            key_alias_prefix,
            signature_fields_header,
            clock_skew_retries,
            request_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks every field.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(ConfigError::invalid("base_url", "cannot be empty"));
        }
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ConfigError::invalid("base_url", "must be an http or https URL"));
        }
        if self.key_alias_prefix.is_empty() {
            return Err(ConfigError::invalid("key_alias_prefix", "cannot be empty"));
        }
        if self.signature_fields_header.trim().is_empty() {
            return Err(ConfigError::invalid("signature_fields_header", "cannot be empty"));
        }
        if self.clock_skew_retries > MAX_CLOCK_SKEW_RETRIES {
            return Err(ConfigError::invalid(
                "clock_skew_retries",
                format!("must be at most {MAX_CLOCK_SKEW_RETRIES}"),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::invalid("request_timeout", "must be positive"));
        }
        Ok(())
    }

    /// Returns the base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Returns the key store directory, if file-backed.
    #[must_use]
    pub fn key_store_path(&self) -> Option<&PathBuf> {
        self.key_store_path.as_ref()
    }

    /// Returns the key pair alias prefix.
    #[must_use]
    pub fn key_alias_prefix(&self) -> &str {
        &self.key_alias_prefix
    }

    /// Returns the name of the signature-fields header.
    #[must_use]
    pub fn signature_fields_header(&self) -> &str {
        &self.signature_fields_header
    }

    /// Returns the clock-skew retry count.
    #[must_use]
    pub fn clock_skew_retries(&self) -> u32 {
        self.clock_skew_retries
    }

    /// Returns the request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

/// Opens the key store described by `config`.
///
/// Returns a file-backed store when `key_store_path` is set, an in-memory
/// store otherwise.
///
/// # Errors
///
/// Returns [`ConfigError::KeyStore`] if the key store directory cannot be
/// created or opened.
pub fn open_key_store(config: &PushAuthConfig) -> Result<Arc<dyn SecureKeyStore>, ConfigError> {
    match config.key_store_path() {
        Some(path) => {
            let items = FileSecureItemStore::open(path)
                .map_err(|source| ConfigError::KeyStore { path: path.clone(), source })?;
            tracing::debug!(path = %path.display(), "opened file-backed key store");
            Ok(Arc::new(EcKeyStore::new(items)))
        },
        None => {
            tracing::debug!("using in-memory key store");
            Ok(Arc::new(EcKeyStore::new(MemorySecureItemStore::new())))
        },
    }
}
