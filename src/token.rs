//! User tokens as described by `/auth/tokenInfo`

use crate::account::{Account, Role};
use crate::error::{OispError, Result};
use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;
use std::fmt;

/// Token metadata response from `/auth/tokenInfo`
///
/// ```json
/// {
///   "header": { "typ": "JWT", "alg": "RS256" },
///   "payload": {
///     "jti": "7b1430a2-dd61-4a47-919c-495cadb1ea7b",
///     "iss": "http://enableiot.com",
///     "sub": "53fdff4418b547e4241b8358",
///     "exp": "2014-10-02T07:53:25.361Z",
///     "accounts": [ { "id": "...", "name": "...", "role": "admin" } ]
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenInfo {
    #[serde(default)]
    header: Option<TokenHeader>,
    #[serde(default)]
    payload: Option<TokenPayload>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TokenHeader {
    #[serde(default)]
    typ: Option<String>,
    #[serde(default)]
    alg: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TokenPayload {
    #[serde(default)]
    jti: Option<String>,
    #[serde(default)]
    iss: Option<String>,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default, deserialize_with = "deserialize_expiry")]
    exp: Option<DateTime<Utc>>,
    #[serde(default)]
    accounts: Vec<TokenAccount>,
}

#[derive(Debug, Clone, Deserialize)]
struct TokenAccount {
    id: String,
    name: String,
    #[serde(default)]
    role: Role,
}

/// A user bearer token and the metadata the service reports for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserToken {
    /// Raw token string sent as `Authorization: Bearer <value>`
    pub value: String,
    /// Token type, usually `JWT`
    pub typ: String,
    /// Signing algorithm, usually `RS256`
    pub alg: String,
    /// Unique token id
    pub jti: String,
    /// Issuer
    pub issued_by: String,
    /// Subject: id of the user owning the token
    pub user_id: String,
    /// Expiry instant
    pub expires_at: DateTime<Utc>,
    /// Accounts the user had access to when the token was issued
    pub accounts: Vec<Account>,
}

fn required<T>(value: Option<T>, key: &str) -> Result<T> {
    value.ok_or_else(|| {
        OispError::InvalidResponse(format!("Invalid JSON format key '{key}' missing"))
    })
}

impl UserToken {
    /// Build a token from its string value and the `/auth/tokenInfo` response
    ///
    /// # Errors
    ///
    /// Returns [`OispError::InvalidResponse`] naming the first missing key.
    pub fn from_token_info(value: &str, info: TokenInfo) -> Result<Self> {
        let header = required(info.header, "header")?;
        let payload = required(info.payload, "payload")?;

        Ok(Self {
            value: value.to_string(),
            typ: required(header.typ, "typ")?,
            alg: required(header.alg, "alg")?,
            jti: required(payload.jti, "jti")?,
            issued_by: required(payload.iss, "iss")?,
            user_id: required(payload.sub, "sub")?,
            expires_at: required(payload.exp, "exp")?,
            accounts: payload
                .accounts
                .into_iter()
                .map(|a| Account::new(a.name, a.id, a.role))
                .collect(),
        })
    }

    /// Whether the token is past its expiry
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Whether the token is expired at the given instant
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

impl fmt::Display for UserToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token {}", self.value)
    }
}

/// `exp` arrives either as epoch milliseconds or as an RFC 3339 string
fn deserialize_expiry<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    struct ExpiryVisitor;

    impl<'de> Visitor<'de> for ExpiryVisitor {
        type Value = Option<DateTime<Utc>>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("epoch milliseconds or an RFC 3339 timestamp")
        }

        fn visit_none<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(
            self,
            deserializer: D,
        ) -> std::result::Result<Self::Value, D::Error> {
            deserializer.deserialize_any(self)
        }

        fn visit_i64<E: de::Error>(self, ms: i64) -> std::result::Result<Self::Value, E> {
            DateTime::from_timestamp_millis(ms)
                .map(Some)
                .ok_or_else(|| E::custom(format!("timestamp {ms} out of range")))
        }

        fn visit_u64<E: de::Error>(self, ms: u64) -> std::result::Result<Self::Value, E> {
            let ms = i64::try_from(ms).map_err(E::custom)?;
            self.visit_i64(ms)
        }

        #[allow(clippy::cast_possible_truncation)]
        fn visit_f64<E: de::Error>(self, ms: f64) -> std::result::Result<Self::Value, E> {
            self.visit_i64(ms as i64)
        }

        fn visit_str<E: de::Error>(self, s: &str) -> std::result::Result<Self::Value, E> {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(E::custom)
        }
    }

    deserializer.deserialize_option(ExpiryVisitor)
}
