//! Telemetry values and the datapoints buffered on a device

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single telemetry value.
///
/// `Bytes` values are only representable in CBOR; a submission containing
/// one is sent as `application/cbor`.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValue {
    /// Integer number
    Integer(i64),
    /// Floating point number
    Float(f64),
    /// Boolean
    Bool(bool),
    /// Text, also the platform's canonical form for most stored values
    Text(String),
    /// Raw binary data
    Bytes(Vec<u8>),
}

impl SampleValue {
    /// Whether the value needs a binary encoding
    #[must_use]
    pub const fn is_binary(&self) -> bool {
        matches!(self, Self::Bytes(_))
    }

    /// Numeric view of the value; text is parsed
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Bool(_) | Self::Bytes(_) => None,
        }
    }

    /// Integer view of the value, used for millisecond timestamps
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Float(f) => Some(*f as i64),
            Self::Text(s) => s
                .trim()
                .parse::<i64>()
                .ok()
                .or_else(|| s.trim().parse::<f64>().ok().map(|f| f as i64)),
            Self::Bool(_) | Self::Bytes(_) => None,
        }
    }
}

impl fmt::Display for SampleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Text(s) => f.write_str(s),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

macro_rules! sample_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for SampleValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(value.into())
                }
            }
        )*
    };
}

sample_value_from! {
    i64 => Integer,
    i32 => Integer,
    u32 => Integer,
    f64 => Float,
    f32 => Float,
    bool => Bool,
    String => Text,
    &str => Text,
    Vec<u8> => Bytes,
    &[u8] => Bytes,
}

impl Serialize for SampleValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Bytes(b) => serializer.serialize_bytes(b),
        }
    }
}

impl<'de> Deserialize<'de> for SampleValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SampleValueVisitor;

        impl<'de> Visitor<'de> for SampleValueVisitor {
            type Value = SampleValue;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a number, boolean, string or byte string")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(SampleValue::Bool(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(SampleValue::Integer(v))
            }

            #[allow(clippy::cast_precision_loss)]
            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(i64::try_from(v).map_or(SampleValue::Float(v as f64), SampleValue::Integer))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(SampleValue::Float(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(SampleValue::Text(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(SampleValue::Text(v))
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
                Ok(SampleValue::Bytes(v.to_vec()))
            }

            fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
                Ok(SampleValue::Bytes(v))
            }

            // JSON has no byte strings; a list of small integers is read back as bytes
            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut bytes = Vec::new();
                while let Some(byte) = seq.next_element::<u8>()? {
                    bytes.push(byte);
                }
                Ok(SampleValue::Bytes(bytes))
            }
        }

        deserializer.deserialize_any(SampleValueVisitor)
    }
}

/// A datapoint waiting on a device to be submitted
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Datapoint {
    /// Component the value belongs to
    pub component_id: String,
    /// Recorded value
    pub value: SampleValue,
    /// Timestamp in epoch milliseconds
    pub on: i64,
    /// Location of the device when the value was recorded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loc: Option<Vec<f64>>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::client::cbor;
    use serde_json::json;

    #[test]
    fn test_json_encoding_of_plain_values() {
        let point = Datapoint {
            component_id: "cid".to_string(),
            value: 10.into(),
            on: 1_500_000_000_000,
            loc: None,
        };
        assert_eq!(
            serde_json::to_value(&point).unwrap(),
            json!({ "componentId": "cid", "value": 10, "on": 1_500_000_000_000_i64 })
        );
    }

    #[test]
    fn test_bytes_round_trip_through_cbor() {
        let value = SampleValue::from(vec![1_u8, 2, 3, 4]);
        assert!(value.is_binary());
        let encoded = cbor::encode(&value).unwrap();
        let decoded: SampleValue = cbor::decode(&encoded).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_deserialize_mixed_row() {
        let row: Vec<SampleValue> =
            serde_json::from_value(json!([1_500_000_000_000_i64, "10", true, 2.5])).unwrap();
        assert_eq!(
            row,
            vec![
                SampleValue::Integer(1_500_000_000_000),
                SampleValue::Text("10".to_string()),
                SampleValue::Bool(true),
                SampleValue::Float(2.5),
            ]
        );
    }

    #[test]
    fn test_numeric_views() {
        assert_eq!(SampleValue::from("10").as_f64(), Some(10.0));
        assert_eq!(SampleValue::from("1500000000000").as_i64(), Some(1_500_000_000_000));
        assert_eq!(SampleValue::from(true).as_f64(), None);
        assert_eq!(SampleValue::from(2.9).as_i64(), Some(2));
    }
}
