//! Response decoding by content type

use super::cbor;
use super::request::{CONTENT_TYPE_CBOR, CONTENT_TYPE_JSON};
use super::transport::HttpResponse;
use crate::error::{OispError, Result};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use tracing::warn;

/// Decoded response body
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Empty body
    Empty,
    /// `application/json` body
    Json(serde_json::Value),
    /// `application/cbor` body
    Cbor(ciborium::Value),
    /// Unrecognized content type, or a body that failed to decode
    Raw,
}

/// A response received from the platform
#[derive(Debug, Clone)]
pub struct Response {
    /// Numeric status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Undecoded body
    pub body: Vec<u8>,
    /// Body decoded according to `Content-Type`
    pub payload: Payload,
}

impl Response {
    pub(crate) fn decode(raw: HttpResponse) -> Self {
        let content_type = raw
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        let payload = if raw.body.is_empty() {
            Payload::Empty
        } else if content_type.starts_with(CONTENT_TYPE_JSON) {
            serde_json::from_slice(&raw.body).map_or_else(
                |e| {
                    warn!(error = %e, "response announced JSON but did not parse");
                    Payload::Raw
                },
                Payload::Json,
            )
        } else if content_type.starts_with(CONTENT_TYPE_CBOR) {
            cbor::decode(&raw.body).map_or_else(
                |e| {
                    warn!(error = %e, "response announced CBOR but did not parse");
                    Payload::Raw
                },
                Payload::Cbor,
            )
        } else {
            Payload::Raw
        };

        Self {
            status: raw.status,
            headers: raw.headers,
            body: raw.body,
            payload,
        }
    }

    /// Value of the `Content-Type` header, empty if absent
    #[must_use]
    pub fn content_type(&self) -> &str {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    /// Deserialize the body into a typed value, using the decoder the
    /// content type selected.
    ///
    /// # Errors
    ///
    /// Returns [`OispError::InvalidResponse`] for empty or undecodable bodies and
    /// [`OispError::Deserialization`] when the shape does not match `T`.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        match &self.payload {
            Payload::Json(_) => Ok(serde_json::from_slice(&self.body)?),
            Payload::Cbor(_) => cbor::decode(&self.body),
            Payload::Empty => Err(OispError::InvalidResponse(format!(
                "empty body (HTTP {})",
                self.status
            ))),
            Payload::Raw => Err(OispError::InvalidResponse(format!(
                "unsupported content type '{}'",
                self.content_type()
            ))),
        }
    }

    /// JSON body, if the response was JSON
    #[must_use]
    pub const fn json(&self) -> Option<&serde_json::Value> {
        match &self.payload {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Application error code from the body's `code` field
    #[must_use]
    pub fn error_code(&self) -> Option<i64> {
        match &self.payload {
            Payload::Json(value) => value.get("code").and_then(serde_json::Value::as_i64),
            Payload::Cbor(value) => match cbor::map_get(value, "code") {
                Some(ciborium::Value::Integer(i)) => i64::try_from(*i).ok(),
                _ => None,
            },
            _ => None,
        }
    }

    /// Build the error returned when the status is not the expected one
    pub(crate) fn to_error(&self, expected: u16) -> OispError {
        let message = match &self.payload {
            Payload::Json(value) if !value.is_null() => {
                let pretty = serde_json::to_string_pretty(value).unwrap_or_default();
                format!("\nError message: {pretty}")
            }
            Payload::Cbor(value) => format!("\nError message: {value:?}"),
            Payload::Empty => String::new(),
            _ => format!("\nResponse: {}", String::from_utf8_lossy(&self.body)),
        };

        OispError::Api {
            status: self.status,
            expected,
            code: self.error_code(),
            message,
        }
    }
}
