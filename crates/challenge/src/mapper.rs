//! Mapping of challenge bodies into [`Challenge`] values.
//!
//! The signature fields of a pending challenge are not part of its body.
//! They arrive in a response header as a delimiter-joined list, and the
//! response they select from is the top-level body object itself.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{
    error::{Result, VerifyError},
    types::{
        Challenge, ChallengeDetails, ChallengeStatus, DetailField, SignableResponse,
        SignatureFields,
    },
};

/// Default delimiter of the signature-fields header.
pub const DEFAULT_FIELD_DELIMITER: char = ',';

#[derive(Debug, Deserialize)]
struct ChallengeBody {
    sid: String,
    factor_sid: String,
    status: String,
    date_created: String,
    date_updated: String,
    expiration_date: String,
    #[serde(default)]
    details: Option<DetailsBody>,
    #[serde(default)]
    hidden_details: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct DetailsBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    fields: Vec<DetailField>,
    #[serde(default)]
    date: Option<String>,
}

/// Maps challenge bodies plus the signature-fields header into challenges.
#[derive(Clone, Copy, Debug)]
pub struct ChallengeMapper {
    delimiter: char,
}

impl Default for ChallengeMapper {
    fn default() -> Self {
        Self { delimiter: DEFAULT_FIELD_DELIMITER }
    }
}

impl ChallengeMapper {
    /// Creates a mapper splitting the header on `,`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mapper splitting the header on `delimiter`.
    #[must_use]
    pub fn with_delimiter(delimiter: char) -> Self {
        Self { delimiter }
    }

    /// Maps a JSON challenge body.
    ///
    /// `signature_fields_header` is the raw header value, if the response
    /// carried one. It only applies to pending challenges; for any other
    /// status, or when absent, the challenge is not signable.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Mapper`] if the body is not a JSON object with
    /// the challenge fields, a timestamp is not RFC 3339, or the status is
    /// unknown.
    pub fn map(&self, body: &[u8], signature_fields_header: Option<&str>) -> Result<Challenge> {
        let object: Map<String, Value> = serde_json::from_slice(body)
            .map_err(|e| VerifyError::mapper_with_source("challenge body is not a JSON object", e))?;
        let wire: ChallengeBody = serde_json::from_value(Value::Object(object.clone()))
            .map_err(|e| VerifyError::mapper_with_source("invalid challenge body", e))?;

        let status: ChallengeStatus = wire
            .status
            .parse()
            .map_err(|e| VerifyError::mapper_with_source("invalid challenge status", e))?;

        let details = match wire.details {
            Some(details) => ChallengeDetails {
                message: details.message,
                fields: details.fields,
                date: details.date.as_deref().map(|d| parse_timestamp("details.date", d)).transpose()?,
            },
            None => ChallengeDetails::default(),
        };

        let signable = match (status, signature_fields_header) {
            (ChallengeStatus::Pending, Some(header)) => Some(SignableResponse {
                signature_fields: SignatureFields::from_header(header, self.delimiter),
                response: object,
            }),
            _ => None,
        };

        Ok(Challenge {
            sid: wire.sid,
            factor_sid: wire.factor_sid,
            status,
            details,
            hidden_details: wire.hidden_details,
            created_at: parse_timestamp("date_created", &wire.date_created)?,
            updated_at: parse_timestamp("date_updated", &wire.date_updated)?,
            expiration_date: parse_timestamp("expiration_date", &wire.expiration_date)?,
            signable,
        })
    }
}

fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|date| date.with_timezone(&Utc))
        .map_err(|e| VerifyError::mapper_with_source(format!("invalid timestamp in {field}"), e))
}
