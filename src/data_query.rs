//! Advanced data inquiry: query builder, response parsing and samples

use crate::account::Account;
use crate::client::Client;
use crate::device::Device;
use crate::error::{OispError, Result};
use crate::sample::SampleValue;
use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// How aggregated values are returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// Samples and aggregations
    Include,
    /// Samples only
    Exclude,
    /// Aggregations only
    Only,
}

/// Column a result set can be sorted by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    /// Sample timestamp
    Timestamp,
    /// Sample value
    Value,
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Ascending
    Asc,
    /// Descending
    Desc,
}

/// One sort criterion, sent as `{"Timestamp": "Asc"}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    /// Column
    pub field: SortField,
    /// Direction
    pub order: SortOrder,
}

impl Serialize for Sort {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let field = match self.field {
            SortField::Timestamp => "Timestamp",
            SortField::Value => "Value",
        };
        let order = match self.order {
            SortOrder::Asc => "Asc",
            SortOrder::Desc => "Desc",
        };
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(field, order)?;
        map.end()
    }
}

/// Attribute filters map an attribute name to the accepted values
pub type AttributeFilter = BTreeMap<String, Vec<String>>;

/// Body of `/accounts/{id}/data/search/advanced`.
///
/// Timestamps are epoch milliseconds; every unset field is left out.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuery {
    /// Start of the time range, `0` unless set
    pub from: i64,
    /// End of the time range, now unless set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<i64>,
    /// Restrict to these gateways
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_ids: Option<Vec<String>>,
    /// Restrict to these devices
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_ids: Option<Vec<String>>,
    /// Restrict to these components
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_ids: Option<Vec<String>>,
    /// Measurement attributes to include in each sample
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returned_measure_attributes: Option<Vec<String>>,
    /// Include `Lat`/`Lon`/`Alt` columns
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_measure_location: Option<bool>,
    /// Aggregation mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregations: Option<Aggregation>,
    /// Filter on device and component attributes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_comp_attribute_filter: Option<AttributeFilter>,
    /// Filter on measurement attributes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement_attribute_filter: Option<AttributeFilter>,
    /// Filter on values, e.g. `{"value": ["10"]}`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_filter: Option<AttributeFilter>,
    /// Maximum number of rows per component
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_row_limit: Option<u64>,
    /// First row returned per component
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_first_row: Option<u64>,
    /// Sort criteria, applied in order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<Sort>>,
}

impl DataQuery {
    /// Query everything from the epoch until now
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the time range
    #[must_use]
    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = from.timestamp_millis();
        self.to = Some(to.timestamp_millis());
        self
    }

    /// Limit to the given devices
    #[must_use]
    pub fn devices<'a>(mut self, devices: impl IntoIterator<Item = &'a Device>) -> Self {
        self.device_ids = Some(devices.into_iter().map(|d| d.device_id.clone()).collect());
        self
    }

    /// Limit to the given component ids
    #[must_use]
    pub fn components<I, S>(mut self, component_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.component_ids = Some(component_ids.into_iter().map(Into::into).collect());
        self
    }

    /// Append a sort criterion
    #[must_use]
    pub fn sort_by(mut self, field: SortField, order: SortOrder) -> Self {
        self.sort.get_or_insert_with(Vec::new).push(Sort { field, order });
        self
    }
}

/// Raw response of an advanced data inquiry
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponseInfo {
    #[serde(default)]
    msg_type: Option<String>,
    #[serde(default)]
    account_id: Option<String>,
    #[serde(default)]
    start_timestamp: Option<f64>,
    #[serde(default)]
    end_timestamp: Option<f64>,
    #[serde(default)]
    data: Vec<DeviceRows>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceRows {
    device_id: String,
    #[serde(default)]
    components: Vec<ComponentRows>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComponentRows {
    component_id: String,
    #[serde(default)]
    data_type: Option<String>,
    #[serde(default)]
    samples_header: Vec<String>,
    #[serde(default)]
    samples: Vec<Vec<Option<SampleValue>>>,
}

/// A single datapoint returned by a query
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Device that recorded the value
    pub device_id: String,
    /// Component the value belongs to
    pub component_id: String,
    /// The value; numeric components are numbers when typed samples are enabled
    pub value: SampleValue,
    /// Recording time
    pub on: DateTime<Utc>,
    /// Location, when the query asked for it
    pub loc: Option<Vec<f64>>,
    account: Account,
}

impl Sample {
    /// Fetch the device the sample belongs to
    ///
    /// # Errors
    ///
    /// Returns an API error if the device cannot be fetched.
    pub fn fetch_device(&self, client: &mut Client) -> Result<Device> {
        self.account.get_device(client, &self.device_id)
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.on, self.value)
    }
}

/// Parsed result of [`Account::search_data`]
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResponse {
    /// Account that made the inquiry
    pub account: Account,
    /// Start of the covered time range
    pub start_time: Option<DateTime<Utc>>,
    /// End of the covered time range
    pub end_time: Option<DateTime<Utc>>,
    /// All samples, grouped by device then component
    pub samples: Vec<Sample>,
}

const ADVANCED_INQUIRY: &str = "advancedDataInquiryResponse";
const DATATYPE_NUMBER: &str = "number";

#[allow(clippy::cast_possible_truncation)]
fn from_millis(ms: f64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms as i64)
}

fn column(header: &[String], name: &str) -> Option<usize> {
    header.iter().position(|h| h.eq_ignore_ascii_case(name))
}

impl QueryResponse {
    /// Validate a raw inquiry response and flatten its samples.
    ///
    /// With `typed` set, values of components whose data type is `number`
    /// are converted from the service's string form.
    ///
    /// # Errors
    ///
    /// Returns [`OispError::InvalidResponse`] if the response is not an
    /// advanced inquiry response for `account`, or a sample row is malformed.
    pub fn from_response(account: Account, info: QueryResponseInfo, typed: bool) -> Result<Self> {
        if info.msg_type.as_deref() != Some(ADVANCED_INQUIRY) {
            return Err(OispError::InvalidResponse(
                "Only advanced inquiry responses are supported".to_string(),
            ));
        }
        if info.account_id.as_deref() != Some(account.id.as_str()) {
            return Err(OispError::InvalidResponse("Account ID mismatch".to_string()));
        }

        let mut samples = Vec::new();
        for device in info.data {
            for component in device.components {
                let header = &component.samples_header;
                let (Some(ts_i), Some(val_i)) =
                    (column(header, "Timestamp"), column(header, "Value"))
                else {
                    return Err(OispError::InvalidResponse(format!(
                        "samplesHeader of component {} lacks Timestamp or Value",
                        component.component_id
                    )));
                };
                let loc_i: Vec<usize> = ["Lat", "Lon", "Alt"]
                    .iter()
                    .filter_map(|name| column(header, name))
                    .collect();
                let numeric = typed
                    && component
                        .data_type
                        .as_deref()
                        .is_some_and(|t| t.eq_ignore_ascii_case(DATATYPE_NUMBER));

                for row in component.samples {
                    let malformed = || {
                        OispError::InvalidResponse(format!(
                            "malformed sample row for component {}",
                            component.component_id
                        ))
                    };
                    let cell = |i: usize| row.get(i).and_then(Option::as_ref);
                    let on = cell(ts_i)
                        .and_then(SampleValue::as_i64)
                        .and_then(DateTime::from_timestamp_millis)
                        .ok_or_else(malformed)?;
                    if row.get(val_i).is_none() {
                        return Err(malformed());
                    }
                    let Some(mut value) = cell(val_i).cloned() else {
                        warn!(
                            component_id = %component.component_id,
                            on = %on,
                            "skipping sample without value"
                        );
                        continue;
                    };
                    if numeric {
                        value = SampleValue::Float(value.as_f64().ok_or_else(malformed)?);
                    }
                    let loc: Vec<f64> = loc_i
                        .iter()
                        .filter_map(|&i| cell(i).and_then(SampleValue::as_f64))
                        .collect();

                    samples.push(Sample {
                        device_id: device.device_id.clone(),
                        component_id: component.component_id.clone(),
                        value,
                        on,
                        loc: (!loc.is_empty()).then_some(loc),
                        account: account.clone(),
                    });
                }
            }
        }

        Ok(Self {
            start_time: info.start_timestamp.and_then(from_millis),
            end_time: info.end_timestamp.and_then(from_millis),
            account,
            samples,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::client::mock::{self, json_body, MockTransport};
    use crate::config::ClientConfig;
    use chrono::Duration;
    use serde_json::json;

    fn response(account_id: &str, data_type: &str, samples: serde_json::Value) -> serde_json::Value {
        json!({
            "msgType": "advancedDataInquiryResponse",
            "accountId": account_id,
            "startTimestamp": 0,
            "endTimestamp": 1_500_000_001_000_i64,
            "data": [{
                "deviceId": "dev-1",
                "deviceName": "thermo",
                "components": [{
                    "componentId": "c1",
                    "dataType": data_type,
                    "samplesHeader": ["Timestamp", "Value"],
                    "samples": samples
                }]
            }]
        })
    }

    fn untyped_client() -> (Client, MockTransport) {
        let mock = MockTransport::new();
        let config = ClientConfig {
            typed_samples: false,
            ..mock::config()
        };
        let mut client = Client::with_transport(config, Box::new(mock.clone()));
        client.set_user_token(mock::user_token(Duration::hours(1)));
        (client, mock)
    }

    #[test]
    fn test_query_serializes_only_set_fields() {
        let query = DataQuery::new()
            .devices([&Device::new("dev-1")])
            .components(["c1"])
            .sort_by(SortField::Timestamp, SortOrder::Desc);
        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            json!({
                "from": 0,
                "deviceIds": ["dev-1"],
                "componentIds": ["c1"],
                "sort": [{ "Timestamp": "Desc" }]
            })
        );
    }

    #[test]
    fn test_query_aggregation_and_range() {
        let to = DateTime::from_timestamp_millis(2_000).unwrap();
        let mut query = DataQuery::new().between(DateTime::from_timestamp_millis(1_000).unwrap(), to);
        query.aggregations = Some(Aggregation::Only);
        let value = serde_json::to_value(&query).unwrap();
        assert_eq!(value["from"], 1_000);
        assert_eq!(value["to"], 2_000);
        assert_eq!(value["aggregations"], "only");
    }

    #[test]
    fn test_search_returns_typed_number() {
        let (mut client, mock) = mock::logged_in_client();
        mock.push_json(
            200,
            &response("acc-1", "Number", json!([[1_500_000_000_000_i64, "10"]])),
        );

        let result = mock::account()
            .search_data(&mut client, &DataQuery::new())
            .unwrap();

        assert_eq!(json_body(&mock.last_request()), json!({ "from": 0 }));
        assert!(mock
            .last_request()
            .url
            .ends_with("/accounts/acc-1/data/search/advanced"));
        assert_eq!(result.samples.len(), 1);
        let sample = &result.samples[0];
        assert_eq!(sample.value, SampleValue::Float(10.0));
        assert_eq!(sample.on.timestamp_millis(), 1_500_000_000_000);
        assert_eq!(sample.component_id, "c1");
        assert_eq!(result.end_time.unwrap().timestamp_millis(), 1_500_000_001_000);
    }

    #[test]
    fn test_search_keeps_server_form_when_untyped() {
        let (mut client, mock) = untyped_client();
        mock.push_json(
            200,
            &response("acc-1", "Number", json!([[1_500_000_000_000_i64, "10"]])),
        );
        let result = mock::account()
            .search_data(&mut client, &DataQuery::new())
            .unwrap();
        assert_eq!(result.samples[0].value, SampleValue::Text("10".to_string()));
    }

    #[test]
    fn test_account_mismatch_is_rejected() {
        let info: QueryResponseInfo =
            serde_json::from_value(response("acc-2", "Number", json!([]))).unwrap();
        let err = QueryResponse::from_response(mock::account(), info, true).unwrap_err();
        assert!(err.to_string().contains("Account ID mismatch"));
    }

    #[test]
    fn test_other_message_types_are_rejected() {
        let info: QueryResponseInfo =
            serde_json::from_value(json!({ "msgType": "basicDataInquiryResponse", "accountId": "acc-1" }))
                .unwrap();
        assert!(matches!(
            QueryResponse::from_response(mock::account(), info, true),
            Err(OispError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_location_columns() {
        let mut value = response("acc-1", "Number", json!([[1_000, "1.5", "45.0", "13.0"]]));
        value["data"][0]["components"][0]["samplesHeader"] = json!(["Timestamp", "Value", "Lat", "Lon"]);
        let info: QueryResponseInfo = serde_json::from_value(value).unwrap();
        let result = QueryResponse::from_response(mock::account(), info, true).unwrap();
        assert_eq!(result.samples[0].loc, Some(vec![45.0, 13.0]));
        assert_eq!(result.samples[0].value, SampleValue::Float(1.5));
    }

    #[test]
    fn test_binary_samples_from_cbor_response() {
        let (mut client, mock) = mock::logged_in_client();
        let samples = vec![vec![
            ciborium::Value::Integer(1_000.into()),
            ciborium::Value::Bytes(vec![9, 8, 7]),
        ]];
        let body = ciborium::Value::Map(vec![
            (
                ciborium::Value::Text("msgType".into()),
                ciborium::Value::Text(ADVANCED_INQUIRY.into()),
            ),
            (
                ciborium::Value::Text("accountId".into()),
                ciborium::Value::Text("acc-1".into()),
            ),
            (
                ciborium::Value::Text("data".into()),
                ciborium::Value::Array(vec![ciborium::Value::Map(vec![
                    (
                        ciborium::Value::Text("deviceId".into()),
                        ciborium::Value::Text("dev-1".into()),
                    ),
                    (
                        ciborium::Value::Text("components".into()),
                        ciborium::Value::Array(vec![ciborium::Value::Map(vec![
                            (
                                ciborium::Value::Text("componentId".into()),
                                ciborium::Value::Text("img".into()),
                            ),
                            (
                                ciborium::Value::Text("dataType".into()),
                                ciborium::Value::Text("ByteArray".into()),
                            ),
                            (
                                ciborium::Value::Text("samplesHeader".into()),
                                ciborium::Value::Array(vec![
                                    ciborium::Value::Text("Timestamp".into()),
                                    ciborium::Value::Text("Value".into()),
                                ]),
                            ),
                            (
                                ciborium::Value::Text("samples".into()),
                                ciborium::Value::Array(
                                    samples.into_iter().map(ciborium::Value::Array).collect(),
                                ),
                            ),
                        ])]),
                    ),
                ])]),
            ),
        ]);
        mock.push_cbor(200, &body);

        let result = mock::account()
            .search_data(&mut client, &DataQuery::new())
            .unwrap();
        assert_eq!(result.samples[0].value, SampleValue::Bytes(vec![9, 8, 7]));
    }

    #[test]
    fn test_sample_fetches_its_device() {
        let (mut client, mock) = mock::logged_in_client();
        mock.push_json(
            200,
            &response("acc-1", "Number", json!([[1_000, "3"]])),
        );
        let result = mock::account()
            .search_data(&mut client, &DataQuery::new())
            .unwrap();

        mock.push_json(200, &json!({ "deviceId": "dev-1", "name": "thermo" }));
        let device = result.samples[0].fetch_device(&mut client).unwrap();
        assert_eq!(device.name.as_deref(), Some("thermo"));
        assert!(mock.last_request().url.ends_with("/accounts/acc-1/devices/dev-1"));
    }

    #[test]
    fn test_null_value_rows_are_skipped() {
        let mut value = response(
            "acc-1",
            "Number",
            json!([[1_000, null, null, "13.0"], [2_000, "4", null, null]]),
        );
        value["data"][0]["components"][0]["samplesHeader"] =
            json!(["Timestamp", "Value", "Lat", "Lon"]);
        let info: QueryResponseInfo = serde_json::from_value(value).unwrap();
        let result = QueryResponse::from_response(mock::account(), info, true).unwrap();

        assert_eq!(result.samples.len(), 1);
        assert_eq!(result.samples[0].on.timestamp_millis(), 2_000);
        assert_eq!(result.samples[0].value, SampleValue::Float(4.0));
        assert_eq!(result.samples[0].loc, None);
    }

    #[test]
    fn test_null_timestamp_is_malformed() {
        let info: QueryResponseInfo =
            serde_json::from_value(response("acc-1", "Number", json!([[null, "4"]]))).unwrap();
        assert!(matches!(
            QueryResponse::from_response(mock::account(), info, true),
            Err(OispError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_submitted_value_comes_back_from_search() {
        let (mut client, mock) = mock::logged_in_client();
        let mut device = Device::new("dev-1");
        device.domain_id = Some(mock::ACCOUNT_ID.to_string());
        device.set_device_token("device-token");

        device.add_sample("c1", 21.5, Some(1_500_000_000_000), None);
        mock.push_empty(201);
        device.submit_data(&mut client, None).unwrap();
        assert!(device.unsent_data().is_empty());

        let submitted = json_body(&mock.last_request())["data"][0].clone();
        let (on, value) = (submitted["on"].clone(), submitted["value"].to_string());
        let stored = json!([[on, value]]);
        mock.push_json(200, &response("acc-1", "Number", stored));

        let query = DataQuery::new().devices([&device]).components(["c1"]);
        let result = mock::account().search_data(&mut client, &query).unwrap();

        assert_eq!(mock.request_count(), 2);
        assert_eq!(result.samples.len(), 1);
        let sample = &result.samples[0];
        assert_eq!(sample.device_id, "dev-1");
        assert_eq!(sample.component_id, "c1");
        assert_eq!(sample.value, SampleValue::Float(21.5));
        assert_eq!(sample.on.timestamp_millis(), 1_500_000_000_000);
    }
}
