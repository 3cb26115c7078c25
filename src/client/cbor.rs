//! CBOR encoding for binary payloads
//!
//! Bodies carrying raw sensor bytes are sent as CBOR so byte strings survive
//! the round trip; JSON would have to re-encode them.

use crate::error::Result;
use ciborium::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encode a value as CBOR
///
/// # Errors
///
/// Returns [`crate::OispError::Serialization`] if encoding fails.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut encoded = Vec::new();
    ciborium::into_writer(value, &mut encoded)?;
    Ok(encoded)
}

/// Decode a CBOR body into a typed value
///
/// # Errors
///
/// Returns [`crate::OispError::Deserialization`] if the bytes do not decode into `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(ciborium::from_reader(bytes)?)
}

/// Look up a text key in a CBOR map
#[must_use]
pub fn map_get<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Map(entries) => entries
            .iter()
            .find(|(k, _)| matches!(k, Value::Text(t) if t == key))
            .map(|(_, v)| v),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_map_get() {
        let value = Value::Map(vec![
            (Value::Text("code".into()), Value::Integer(1404.into())),
            (Value::Text("message".into()), Value::Text("gone".into())),
        ]);
        assert_eq!(map_get(&value, "code"), Some(&Value::Integer(1404.into())));
        assert_eq!(map_get(&value, "missing"), None);
        assert_eq!(map_get(&Value::Null, "code"), None);
    }

    #[test]
    fn test_bytes_survive() {
        let encoded = encode(&Value::Bytes(vec![0, 255, 7])).unwrap();
        let decoded: Value = decode(&encoded).unwrap();
        assert_eq!(decoded, Value::Bytes(vec![0, 255, 7]));
    }
}
