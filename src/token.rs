//! Bearer token inspection.
//!
//! Tokens are JWTs signed by the backend. The client never verifies the
//! signature; it only reads the payload to learn the expiry. Validity is
//! derived from `exp` on every call and never cached.

#[cfg(test)]
#[path = "token_test.rs"]
mod token_test;

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Payload embedded in a backend-issued token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub iat: Option<i64>,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

/// Literal values left behind by careless writers that must read as "absent".
#[must_use]
pub fn is_sentinel(raw: &str) -> bool {
    raw.is_empty() || raw == "undefined" || raw == "null"
}

/// Current wall-clock time in seconds since the epoch.
#[must_use]
pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

/// Current wall-clock time in milliseconds since the epoch.
#[must_use]
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

/// Decode the payload segment of a JWT without verifying its signature.
///
/// # Errors
///
/// Returns [`AuthError::TokenDecode`] if the token is not three dot-separated
/// segments, the payload is not base64url, or the JSON lacks `sub`/`exp`.
pub fn decode_claims(token: &str) -> Result<TokenClaims, AuthError> {
    decode_payload(token)
}

#[derive(Deserialize)]
struct Expiry {
    exp: serde_json::Number,
}

/// Read only the `exp` claim. Validity checks and refresh scheduling go
/// through here so issuer-specific `sub`/`roles` shapes never matter.
///
/// # Errors
///
/// Returns [`AuthError::TokenDecode`] if the token is malformed or `exp` is
/// missing or not a number.
pub fn decode_expiry(token: &str) -> Result<i64, AuthError> {
    let Expiry { exp } = decode_payload(token)?;
    #[allow(clippy::cast_possible_truncation)]
    let seconds = exp.as_i64().or_else(|| exp.as_f64().filter(|f| f.is_finite()).map(|f| f as i64));
    seconds.ok_or_else(|| AuthError::TokenDecode(format!("exp out of range: {exp}")))
}

fn decode_payload<T: DeserializeOwned>(token: &str) -> Result<T, AuthError> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::TokenDecode("expected three segments".into()));
    };

    // Some issuers keep base64 padding; the URL-safe engine rejects it.
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| AuthError::TokenDecode(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| AuthError::TokenDecode(e.to_string()))
}

/// True when `token` carries an `exp` claim that lies in the future.
#[must_use]
pub fn is_valid(token: &str) -> bool {
    is_valid_at(token, now_secs())
}

/// [`is_valid`] against an explicit clock reading.
#[must_use]
pub fn is_valid_at(token: &str, now_secs: i64) -> bool {
    if is_sentinel(token) {
        return false;
    }
    match decode_expiry(token) {
        Ok(exp) => exp > now_secs,
        Err(e) => {
            tracing::warn!(error = %e, "token rejected");
            false
        }
    }
}
