//! Request-side types: authorization strategy and body encoding

use super::cbor;
use crate::device::Device;
use crate::error::{OispError, Result};
use serde::Serialize;

/// Content type for JSON bodies
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Content type for CBOR bodies
pub const CONTENT_TYPE_CBOR: &str = "application/cbor";

/// JSON keys whose values never reach the logs
const SECRET_KEYS: &[&str] = &["password", "currentpwd", "token"];

/// Which bearer token, if any, a request is sent with
#[derive(Debug, Clone, Copy)]
pub enum Authorization<'a> {
    /// No `Authorization` header
    Anonymous,
    /// The session's user token; must be present and not expired
    User,
    /// The device's own token, obtained through activation
    Device(&'a Device),
    /// An explicit token string
    Bearer(&'a str),
}

/// Request body, tagged with its wire encoding
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// No body
    Empty,
    /// Sent as `application/json`
    Json(serde_json::Value),
    /// Pre-encoded CBOR, sent as `application/cbor`
    Cbor(Vec<u8>),
}

impl Body {
    /// Encode a structured value as a JSON body
    ///
    /// # Errors
    ///
    /// Returns [`OispError::Serialization`] if the value cannot be represented as JSON.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Self::Json)
            .map_err(|e| OispError::Serialization(format!("JSON encode error: {e}")))
    }

    /// Encode a structured value as a CBOR body
    ///
    /// # Errors
    ///
    /// Returns [`OispError::Serialization`] if CBOR encoding fails.
    pub fn cbor<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        cbor::encode(value).map(Self::Cbor)
    }

    /// Content type announced for this body
    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        match self {
            Self::Empty | Self::Json(_) => CONTENT_TYPE_JSON,
            Self::Cbor(_) => CONTENT_TYPE_CBOR,
        }
    }

    /// JSON payload with credential fields masked, for logging
    #[must_use]
    pub fn redacted(&self) -> Option<serde_json::Value> {
        let Self::Json(value) = self else {
            return None;
        };
        let mut value = value.clone();
        if let Some(map) = value.as_object_mut() {
            for (key, field) in map.iter_mut() {
                if SECRET_KEYS.contains(&key.as_str()) {
                    *field = serde_json::Value::String("***".to_string());
                }
            }
        }
        Some(value)
    }

    /// Bytes that go on the wire
    ///
    /// # Errors
    ///
    /// Returns [`OispError::Serialization`] if JSON rendering fails.
    pub fn into_bytes(self) -> Result<Option<Vec<u8>>> {
        match self {
            Self::Empty => Ok(None),
            Self::Json(value) => serde_json::to_vec(&value)
                .map(Some)
                .map_err(|e| OispError::Serialization(format!("JSON encode error: {e}"))),
            Self::Cbor(bytes) => Ok(Some(bytes)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::sample::SampleValue;
    use serde_json::json;

    #[test]
    fn test_json_body_content_type() {
        let body = Body::json(&json!({"name": "acc"})).unwrap();
        assert_eq!(body.content_type(), CONTENT_TYPE_JSON);
        assert_eq!(body.into_bytes().unwrap().unwrap(), br#"{"name":"acc"}"#);
    }

    #[test]
    fn test_cbor_body_keeps_bytes() {
        #[derive(Serialize)]
        struct Blob {
            value: SampleValue,
        }

        let body = Body::cbor(&Blob {
            value: SampleValue::Bytes(vec![1, 2, 3]),
        })
        .unwrap();
        assert_eq!(body.content_type(), CONTENT_TYPE_CBOR);

        let bytes = body.into_bytes().unwrap().unwrap();
        let decoded: ciborium::Value = ciborium::from_reader(&bytes[..]).unwrap();
        let map = decoded.as_map().unwrap();
        assert_eq!(map[0].1, ciborium::Value::Bytes(vec![1, 2, 3]));
    }

    #[test]
    fn test_redacted_masks_credentials() {
        let body = Body::json(&json!({ "currentpwd": "old", "password": "new", "email": "u@x" }))
            .unwrap();
        assert_eq!(
            body.redacted().unwrap(),
            json!({ "currentpwd": "***", "password": "***", "email": "u@x" })
        );
        assert_eq!(
            body.into_bytes().unwrap().unwrap(),
            br#"{"currentpwd":"old","email":"u@x","password":"new"}"#
        );
        assert!(Body::Cbor(vec![0xa0]).redacted().is_none());
    }

    #[test]
    fn test_empty_body_has_no_bytes() {
        assert!(Body::Empty.into_bytes().unwrap().is_none());
    }
}
