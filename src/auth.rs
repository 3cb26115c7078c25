//! Local inspection of bearer tokens
//!
//! Device tokens are JWTs handed out at activation; the client reads their
//! `exp` claim so an expired device token fails before any request is sent.
//! Signatures are not verified; that is the server's job.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as B64_URL_SAFE, Engine};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// JWT claims (only includes fields we care about)
#[derive(Debug, Deserialize)]
struct JwtClaims {
    /// Expiration time (seconds since Unix epoch)
    #[serde(default)]
    exp: Option<i64>,
}

/// Clock skew tolerance for token expiry checks (in seconds)
const CLOCK_SKEW_TOLERANCE: i64 = 60;

/// Expiry claim of a JWT.
/// Returns `None` for non-JWT tokens or tokens without an `exp` claim.
#[must_use]
pub fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut parts = token.split('.');
    let (Some(_), Some(payload), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };

    // Tokens may or may not carry base64 padding
    let decoded = B64_URL_SAFE.decode(payload.trim_end_matches('=')).ok()?;
    let claims: JwtClaims = serde_json::from_slice(&decoded).ok()?;
    DateTime::from_timestamp(claims.exp?, 0)
}

/// Whether a JWT is past its `exp` claim, allowing for clock skew.
/// Tokens without a readable expiry are never considered expired.
#[must_use]
pub fn is_jwt_expired(token: &str) -> bool {
    jwt_expiry(token).is_some_and(|exp| is_past(exp, Utc::now()))
}

fn is_past(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now > expires_at + Duration::seconds(CLOCK_SKEW_TOLERANCE)
}
