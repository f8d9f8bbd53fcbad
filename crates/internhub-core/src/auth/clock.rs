//! Expiry checks on access credentials.
//!
//! Claims are decoded without verifying the signature. The result is only
//! used to decide whether a credential is worth sending and what to show
//! the user; the backend remains the authority on validity.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Credential;

/// Payload claims we care about. Anything else in the token is ignored.
///
/// Only `exp` can make decoding fail. Identity claims of an unexpected
/// shape (numeric ids, nested objects) are kept as text or dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct Claims {
    /// Expiry as seconds since the Unix epoch
    #[serde(deserialize_with = "numeric_date")]
    pub exp: i64,
    #[serde(default, deserialize_with = "lenient_text")]
    pub sub: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub role: Option<String>,
}

/// NumericDate: integer or fractional seconds, truncated to whole seconds
fn numeric_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .ok_or_else(|| de::Error::custom("exp out of range")),
        other => Err(de::Error::custom(format!("exp must be a number, got {}", other))),
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

impl Claims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    /// Zero tolerance: live strictly before the `exp` second.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() < self.exp
    }
}

/// Decode the payload segment. `None` for anything that is not a
/// three-segment token with a JSON payload carrying `exp`.
pub fn decode_claims(credential: &Credential) -> Option<Claims> {
    let mut segments = credential.as_str().split('.');
    let (_header, payload, _signature) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Whether the credential is unexpired right now
pub fn is_live(credential: &Credential) -> bool {
    is_live_at(credential, Utc::now())
}

pub fn is_live_at(credential: &Credential, now: DateTime<Utc>) -> bool {
    decode_claims(credential)
        .map(|claims| claims.is_live_at(now))
        .unwrap_or(false)
}

pub fn expires_at(credential: &Credential) -> Option<DateTime<Utc>> {
    decode_claims(credential).and_then(|c| c.expires_at())
}
