//! Factor and challenge domain types.

use std::{fmt, str::FromStr};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default lifetime, in minutes, of a challenge built without an explicit expiration.
const DEFAULT_CHALLENGE_TTL_MINUTES: i64 = 5;

fn default_expiration() -> DateTime<Utc> {
    Utc::now() + TimeDelta::minutes(DEFAULT_CHALLENGE_TTL_MINUTES)
}

/// Verification state of a factor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactorStatus {
    /// Enrolled but not yet confirmed by the server.
    #[default]
    Unverified,
    /// Confirmed and usable for challenges.
    Verified,
}

/// Kind of a registered factor.
///
/// Only [`FactorKind::Push`] can sign challenges; it carries the alias of the
/// key pair backing it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum FactorKind {
    /// Device-bound push factor backed by a key pair in the secure key store.
    Push {
        /// Alias of the backing key pair, if the factor has one.
        key_pair_alias: Option<String>,
    },
    /// Time-based one-time password factor.
    Totp,
}

impl FactorKind {
    /// Returns `true` if factors of this kind can sign challenges.
    #[must_use]
    pub fn can_sign(&self) -> bool {
        matches!(self, Self::Push { .. })
    }

    /// Returns the backing key pair alias, if any.
    #[must_use]
    pub fn key_pair_alias(&self) -> Option<&str> {
        match self {
            Self::Push { key_pair_alias } => key_pair_alias.as_deref(),
            Self::Totp => None,
        }
    }

    /// Returns the kind's wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Push { .. } => "push",
            Self::Totp => "totp",
        }
    }
}

/// A registered authentication endpoint.
///
/// # Examples
///
/// ```
/// use pushauth_challenge::{Factor, FactorKind};
///
/// let factor = Factor::builder()
///     .sid("YF0123")
///     .service_sid("VA0123")
///     .entity_identity("user-1")
///     .kind(FactorKind::Push { key_pair_alias: Some("pushauth-YF0123".into()) })
///     .build();
///
/// assert!(factor.kind.can_sign());
/// assert_eq!(factor.key_pair_alias(), Some("pushauth-YF0123"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, bon::Builder)]
#[builder(on(String, into))]
pub struct Factor {
    /// Factor identifier.
    pub sid: String,
    /// Human-readable name chosen at enrollment.
    #[builder(default)]
    pub friendly_name: String,
    /// Owning account.
    #[builder(default)]
    pub account_sid: String,
    /// Service the factor is enrolled in.
    pub service_sid: String,
    /// Identity of the entity (user) owning the factor.
    pub entity_identity: String,
    /// Verification state.
    #[builder(default)]
    pub status: FactorStatus,
    /// Factor kind.
    pub kind: FactorKind,
    /// Creation time.
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
}

impl Factor {
    /// Returns the backing key pair alias, if any.
    #[must_use]
    pub fn key_pair_alias(&self) -> Option<&str> {
        self.kind.key_pair_alias()
    }

    /// Returns a copy of this push factor pointing at `alias`.
    ///
    /// Other kinds are returned unchanged.
    #[must_use]
    pub fn with_key_pair_alias(mut self, alias: impl Into<String>) -> Self {
        if let FactorKind::Push { key_pair_alias } = &mut self.kind {
            *key_pair_alias = Some(alias.into());
        }
        self
    }
}

/// Status of a challenge.
///
/// `Pending` moves to `Approved` or `Denied` by a signed response, or to
/// `Expired` server-side. The other three are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    /// Awaiting a response.
    Pending,
    /// Approved by the factor owner.
    Approved,
    /// Denied by the factor owner.
    Denied,
    /// Expired before a response arrived.
    Expired,
}

impl ChallengeStatus {
    /// Returns the status' wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Denied => "denied",
            Self::Expired => "expired",
        }
    }

    /// Returns `true` for approved, denied and expired.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Returns `true` if a caller may request a transition to this status.
    #[must_use]
    pub fn is_response_target(self) -> bool {
        matches!(self, Self::Approved | Self::Denied)
    }
}

impl fmt::Display for ChallengeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown challenge status.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown challenge status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for ChallengeStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "denied" => Ok(Self::Denied),
            "expired" => Ok(Self::Expired),
            other => Err(UnknownStatus(other.to_owned())),
        }
    }
}

/// One labelled line of challenge details.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailField {
    /// Label shown to the user.
    pub label: String,
    /// Value shown to the user.
    pub value: String,
}

/// User-facing description of a challenge.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeDetails {
    /// Main message.
    pub message: String,
    /// Additional labelled fields.
    #[serde(default)]
    pub fields: Vec<DetailField>,
    /// Optional date the challenge refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

/// Ordered, de-duplicated set of field names that must be signed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignatureFields(Vec<String>);

impl SignatureFields {
    /// Builds a set from `names`, keeping first occurrences in order.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut fields: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !fields.contains(&name) {
                fields.push(name);
            }
        }
        Self(fields)
    }

    /// Parses a delimiter-joined header value. Blank entries are skipped.
    #[must_use]
    pub fn from_header(value: &str, delimiter: char) -> Self {
        Self::new(value.split(delimiter).map(str::trim).filter(|name| !name.is_empty()))
    }

    /// Returns the field names in order.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Iterates over the field names in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The signable part of a pending challenge.
///
/// Signature fields and the response they select from are only ever present
/// together.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignableResponse {
    /// Fields that must be included in the signed payload.
    pub signature_fields: SignatureFields,
    /// Values the signed payload is built from.
    pub response: Map<String, Value>,
}

/// A server-issued authentication request addressed to one factor.
#[derive(Clone, Debug, PartialEq, bon::Builder)]
#[builder(on(String, into))]
pub struct Challenge {
    /// Challenge identifier.
    pub sid: String,
    /// Factor the challenge is addressed to.
    pub factor_sid: String,
    /// Current status.
    pub status: ChallengeStatus,
    /// User-facing details.
    #[builder(default)]
    pub details: ChallengeDetails,
    /// Opaque data the server attached for the device.
    pub hidden_details: Option<Value>,
    /// Creation time.
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    /// Last update time.
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
    /// Time after which the challenge can no longer be answered.
    #[builder(default = default_expiration())]
    pub expiration_date: DateTime<Utc>,
    /// Fields and values to sign; set only while pending.
    pub signable: Option<SignableResponse>,
}

impl Challenge {
    /// Returns the fields that must be signed, if the challenge is signable.
    #[must_use]
    pub fn signature_fields(&self) -> Option<&SignatureFields> {
        self.signable.as_ref().map(|signable| &signable.signature_fields)
    }

    /// Returns the response values, if the challenge is signable.
    #[must_use]
    pub fn response(&self) -> Option<&Map<String, Value>> {
        self.signable.as_ref().map(|signable| &signable.response)
    }
}
