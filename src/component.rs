//! Component catalog entries and device components

use serde::{Deserialize, Serialize};

/// A data channel registered on a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    /// Component id, unique per device
    pub cid: String,
    /// Component name
    pub name: String,
    /// Component type id from the catalog, e.g. `temperature.v1.0`
    #[serde(rename = "type", default)]
    pub component_type: String,
    /// Owning device, when the service includes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

/// Component type as listed in the account catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentType {
    /// Id, `<dimension>.v<version>`
    pub id: String,
    /// Dimension, e.g. `temperature`
    #[serde(default)]
    pub dimension: Option<String>,
    /// Version, e.g. `1.0`
    #[serde(default)]
    pub version: Option<String>,
    /// `sensor` or `actuator`
    #[serde(default, rename = "type")]
    pub component_type: Option<String>,
    /// `Number`, `String`, `Boolean` or `ByteArray`
    #[serde(default)]
    pub data_type: Option<String>,
    /// Value format, e.g. `float`
    #[serde(default)]
    pub format: Option<String>,
    /// Unit of measure
    #[serde(default, rename = "measureunit")]
    pub measure_unit: Option<String>,
    /// Suggested rendering, e.g. `timeSeries`
    #[serde(default)]
    pub display: Option<String>,
    /// Minimum value
    #[serde(default)]
    pub min: Option<f64>,
    /// Maximum value
    #[serde(default)]
    pub max: Option<f64>,
}

/// Payload for [`crate::Account::create_component_type`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComponentType {
    /// e.g. `temperature`
    pub dimension: String,
    /// e.g. `1.0`
    pub version: String,
    /// `sensor` or `actuator`
    #[serde(rename = "type")]
    pub component_type: String,
    /// `Number`, `String`, `Boolean` or `ByteArray`
    pub data_type: String,
    /// `float`, `boolean`, `string`, `percentage` or `integer`
    pub format: String,
    /// Unit of measure
    #[serde(rename = "measureunit")]
    pub measure_unit: String,
    /// `timeSeries`, `rawData` or `binaryDataRenderer`
    pub display: String,
    /// Minimum value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Maximum value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Actuator command definition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<serde_json::Value>,
}

impl NewComponentType {
    /// A sensor component type without bounds
    #[must_use]
    pub fn sensor(
        dimension: &str,
        version: &str,
        data_type: &str,
        format: &str,
        measure_unit: &str,
        display: &str,
    ) -> Self {
        Self {
            dimension: dimension.to_string(),
            version: version.to_string(),
            component_type: "sensor".to_string(),
            data_type: data_type.to_string(),
            format: format.to_string(),
            measure_unit: measure_unit.to_string(),
            display: display.to_string(),
            min: None,
            max: None,
            command: None,
        }
    }
}

/// Partial update for [`crate::Account::update_component_type`];
/// fields mirror [`NewComponentType`] and unset ones are left unchanged
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentTypeUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub component_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(rename = "measureunit", skip_serializing_if = "Option::is_none")]
    pub measure_unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}
