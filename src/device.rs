//! Device management: activation, properties, components and data submission

use crate::account::Account;
use crate::client::{Authorization, Body, Client};
use crate::component::Component;
use crate::error::{OispError, Result};
use crate::sample::{Datapoint, SampleValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Device as returned by the service
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    device_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    gateway_id: Option<String>,
    #[serde(default)]
    domain_id: Option<String>,
    /// Epoch milliseconds
    #[serde(default)]
    created: Option<f64>,
    #[serde(default)]
    attributes: Option<BTreeMap<String, String>>,
    #[serde(default)]
    components: Option<Vec<Component>>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    loc: Option<Vec<f64>>,
}

/// Payload for [`Account::create_device`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDevice {
    /// Unique device id
    pub device_id: String,
    /// Gateway id, the device id unless set otherwise
    pub gateway_id: String,
    /// Device name
    pub name: String,
    /// Free-form tags
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Location as `[lat, lon]` or `[lat, lon, height]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loc: Option<Vec<f64>>,
    /// String attributes
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl NewDevice {
    /// A device with only id and name; the gateway id defaults to the device id
    #[must_use]
    pub fn new(device_id: impl Into<String>, name: impl Into<String>) -> Self {
        let device_id = device_id.into();
        Self {
            gateway_id: device_id.clone(),
            device_id,
            name: name.into(),
            tags: Vec::new(),
            loc: None,
            attributes: BTreeMap::new(),
        }
    }
}

/// Properties changed by [`Device::set_properties`]; unset fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProperties {
    /// New gateway id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_id: Option<String>,
    /// New name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loc: Option<Vec<f64>>,
    /// Replacement tag list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Replacement attributes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Activation {
    #[serde(default)]
    device_token: Option<String>,
    #[serde(default)]
    domain_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Submission<'a> {
    on: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    account_id: Option<&'a str>,
    data: &'a [Datapoint],
}

#[derive(Debug, Serialize)]
struct NewComponent<'a> {
    cid: &'a str,
    name: &'a str,
    #[serde(rename = "type")]
    component_type: &'a str,
}

/// A device registered on the platform.
///
/// Creating a `Device` value does not register anything on the service; see
/// [`Account::create_device`]. Devices reached through an account use the
/// user session, devices attached with [`Client::get_device`] use their own
/// device token.
#[derive(Debug, Clone)]
pub struct Device {
    /// Unique device id
    pub device_id: String,
    /// Device name
    pub name: Option<String>,
    /// `created` or `active`
    pub status: Option<String>,
    /// Gateway the device reports through
    pub gateway_id: Option<String>,
    /// Id of the owning account
    pub domain_id: Option<String>,
    /// Registration time
    pub created: Option<DateTime<Utc>>,
    /// String attributes
    pub attributes: BTreeMap<String, String>,
    /// Registered components
    pub components: Vec<Component>,
    /// Tags
    pub tags: Vec<String>,
    /// Location
    pub loc: Option<Vec<f64>>,
    account: Option<Account>,
    device_token: Option<String>,
    unsent_data: Vec<Datapoint>,
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        (&self.name, &self.device_id) == (&other.name, &other.device_id)
    }
}

impl Device {
    /// Status of a registered but not yet activated device
    pub const STATUS_CREATED: &'static str = "created";
    /// Status of an activated device
    pub const STATUS_ACTIVE: &'static str = "active";

    /// A device known only by its id
    #[must_use]
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            name: None,
            status: None,
            gateway_id: None,
            domain_id: None,
            created: None,
            attributes: BTreeMap::new(),
            components: Vec::new(),
            tags: Vec::new(),
            loc: None,
            account: None,
            device_token: None,
            unsent_data: Vec::new(),
        }
    }

    /// Build a device from the service's description
    #[must_use]
    pub fn from_info(info: DeviceInfo, account: Option<Account>) -> Self {
        let mut device = Self::new(info.device_id.clone());
        device.account = account;
        device.apply(info);
        device
    }

    /// Overwrite local fields with those present in `info`
    #[allow(clippy::cast_possible_truncation)]
    fn apply(&mut self, info: DeviceInfo) {
        if info.name.is_some() {
            self.name = info.name;
        }
        if info.status.is_some() {
            self.status = info.status;
        }
        if info.gateway_id.is_some() {
            self.gateway_id = info.gateway_id;
        }
        if info.domain_id.is_some() {
            self.domain_id = info.domain_id;
        }
        if let Some(ms) = info.created {
            self.created = DateTime::from_timestamp_millis(ms as i64);
        }
        if let Some(attributes) = info.attributes {
            self.attributes = attributes;
        }
        if let Some(components) = info.components {
            self.components = components;
        }
        if let Some(tags) = info.tags {
            self.tags = tags;
        }
        if info.loc.is_some() {
            self.loc = info.loc;
        }
    }

    /// Owning account, when the device was reached through one
    #[must_use]
    pub const fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    /// Device token from activation
    #[must_use]
    pub fn device_token(&self) -> Option<&str> {
        self.device_token.as_deref()
    }

    /// Use a previously obtained device token
    pub fn set_device_token(&mut self, token: &str) {
        self.device_token = Some(token.to_string());
    }

    /// Datapoints added but not yet submitted
    #[must_use]
    pub fn unsent_data(&self) -> &[Datapoint] {
        &self.unsent_data
    }

    /// Endpoint of this device
    #[must_use]
    pub fn url(&self) -> String {
        match &self.account {
            Some(account) => format!("/accounts/{}/devices/{}", account.id, self.device_id),
            None => format!("/devices/{}", self.device_id),
        }
    }

    /// Default authorization: the device token if there is one, the user
    /// session of the owning account otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`OispError::Authentication`] for a device with neither a
    /// device token nor an owning account.
    pub fn auth_as(&self) -> Result<Authorization<'_>> {
        if self.device_token.is_some() {
            Ok(Authorization::Device(self))
        } else if self.account.is_some() {
            Ok(Authorization::User)
        } else {
            Err(OispError::Authentication(format!(
                "Device {} has neither a device token nor an account, activate it or fetch it through its account",
                self.device_id
            )))
        }
    }

    /// Delete the device; device authorization is not sufficient
    ///
    /// # Errors
    ///
    /// Returns an API error, e.g. code 1404 if the device is already gone.
    pub fn delete(&self, client: &mut Client) -> Result<()> {
        let _ = client.delete(&self.url(), Authorization::User, Some(204))?;
        Ok(())
    }

    /// Activate the device and store its device token.
    ///
    /// Without an explicit code, one is requested from the owning account.
    ///
    /// # Errors
    ///
    /// Returns [`OispError::InvalidArgument`] when no code is given and the
    /// device has no account, and [`OispError::InvalidResponse`] when the
    /// activation answers for another account.
    pub fn activate(&mut self, client: &mut Client, activation_code: Option<&str>) -> Result<String> {
        let code = match activation_code {
            Some(code) => code.to_string(),
            None => {
                let account = self.account.as_ref().ok_or_else(|| {
                    OispError::InvalidArgument(
                        "Activation code is needed for devices without an account".to_string(),
                    )
                })?;
                account.get_activation_code(client, true)?.ok_or_else(|| {
                    OispError::InvalidResponse("account returned no activation code".to_string())
                })?
            }
        };

        let authorization = if self.account.is_some() {
            Authorization::User
        } else {
            Authorization::Anonymous
        };
        let endpoint = format!("{}/activation", self.url());
        let payload = serde_json::json!({ "activationCode": code });
        let activation: Activation = client
            .put(&endpoint, authorization, Some(200), Body::json(&payload)?)?
            .parse()?;

        if let Some(account) = &self.account {
            if activation.domain_id.as_deref() != Some(account.id.as_str()) {
                return Err(OispError::InvalidResponse(
                    "Account ID does not match activation code".to_string(),
                ));
            }
        }
        let token = activation.device_token.ok_or_else(|| {
            OispError::InvalidResponse("activation returned no device token".to_string())
        })?;

        debug!(device_id = %self.device_id, "device activated");
        self.domain_id = activation.domain_id;
        self.device_token = Some(token.clone());
        Ok(token)
    }

    /// Change device properties; local fields follow once the service accepted them
    ///
    /// # Errors
    ///
    /// Returns an API error if the update is rejected.
    pub fn set_properties(&mut self, client: &mut Client, properties: &DeviceProperties) -> Result<()> {
        let _ = client.put(
            &self.url(),
            self.auth_as()?,
            Some(200),
            Body::json(properties)?,
        )?;

        let properties = properties.clone();
        if properties.gateway_id.is_some() {
            self.gateway_id = properties.gateway_id;
        }
        if properties.name.is_some() {
            self.name = properties.name;
        }
        if properties.loc.is_some() {
            self.loc = properties.loc;
        }
        if let Some(tags) = properties.tags {
            self.tags = tags;
        }
        if let Some(attributes) = properties.attributes {
            self.attributes = attributes;
        }
        Ok(())
    }

    /// Register a component; without `cid` a UUID is generated
    ///
    /// # Errors
    ///
    /// Returns an API error, e.g. code 5409 if the component already exists.
    pub fn add_component(
        &mut self,
        client: &mut Client,
        name: &str,
        component_type: &str,
        cid: Option<&str>,
    ) -> Result<Component> {
        let cid = cid.map_or_else(|| uuid::Uuid::new_v4().to_string(), ToString::to_string);
        let endpoint = format!("{}/components", self.url());
        let payload = NewComponent {
            cid: &cid,
            name,
            component_type,
        };
        let component: Component = client
            .post(&endpoint, self.auth_as()?, Some(201), Body::json(&payload)?)?
            .parse()?;
        self.components.push(component.clone());
        Ok(component)
    }

    /// Remove a component
    ///
    /// # Errors
    ///
    /// Returns an API error if the component cannot be deleted.
    pub fn delete_component(&mut self, client: &mut Client, component_id: &str) -> Result<()> {
        let endpoint = format!("{}/components/{component_id}", self.url());
        let _ = client.delete(&endpoint, self.auth_as()?, Some(204))?;
        self.components.retain(|c| c.cid != component_id);
        Ok(())
    }

    /// Refresh the device from the service
    ///
    /// # Errors
    ///
    /// Returns an API error if the device cannot be fetched.
    pub fn update(&mut self, client: &mut Client) -> Result<()> {
        let info: DeviceInfo = client
            .get(&self.url(), self.auth_as()?, Some(200))?
            .parse()?;
        self.apply(info);
        Ok(())
    }

    /// Buffer a datapoint for [`Device::submit_data`]; `on` defaults to now
    pub fn add_sample(
        &mut self,
        component_id: &str,
        value: impl Into<SampleValue>,
        on: Option<i64>,
        loc: Option<Vec<f64>>,
    ) {
        self.unsent_data.push(Datapoint {
            component_id: component_id.to_string(),
            value: value.into(),
            on: on.unwrap_or_else(|| Utc::now().timestamp_millis()),
            loc,
        });
    }

    /// Send the buffered datapoints and clear the buffer.
    ///
    /// The submission is CBOR encoded when any value is binary, JSON otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`OispError::Authentication`] when the device has no device
    /// token; the buffer is kept on any failure.
    pub fn submit_data(&mut self, client: &mut Client, on: Option<i64>) -> Result<()> {
        if self.device_token.is_none() {
            return Err(OispError::Authentication(format!(
                "Submitting data for {} requires a device token",
                self.device_id
            )));
        }

        let submission = Submission {
            on: on.unwrap_or_else(|| Utc::now().timestamp_millis()),
            account_id: self
                .domain_id
                .as_deref()
                .or_else(|| self.account.as_ref().map(|a| a.id.as_str())),
            data: &self.unsent_data,
        };
        let body = if self.unsent_data.iter().any(|d| d.value.is_binary()) {
            Body::cbor(&submission)?
        } else {
            Body::json(&submission)?
        };

        let endpoint = format!("/data/{}", self.device_id);
        let _ = client.post(&endpoint, Authorization::Device(self), Some(201), body)?;

        debug!(device_id = %self.device_id, count = self.unsent_data.len(), "data submitted");
        self.unsent_data.clear();
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::client::mock::{self, bearer, cbor_body, header, json_body};
    use crate::client::cbor;
    use crate::error::code;
    use reqwest::header::CONTENT_TYPE;
    use reqwest::Method;
    use serde_json::json;

    fn account_device() -> Device {
        let info: DeviceInfo = serde_json::from_value(json!({
            "deviceId": "dev-1",
            "name": "thermo",
            "status": "created",
            "domainId": mock::ACCOUNT_ID
        }))
        .unwrap();
        Device::from_info(info, Some(mock::account()))
    }

    fn token_device() -> Device {
        let mut device = Device::new("dev-1");
        device.domain_id = Some(mock::ACCOUNT_ID.to_string());
        device.set_device_token("device-token");
        device
    }

    #[test]
    fn test_from_info_reads_wire_fields() {
        let info: DeviceInfo = serde_json::from_value(json!({
            "deviceId": "dev-1",
            "gatewayId": "gw-1",
            "created": 1_500_000_000_000_i64,
            "components": [{ "cid": "c1", "name": "temp", "type": "temperature.v1.0" }],
            "loc": [45.5, 13.1],
            "somethingElse": 1
        }))
        .unwrap();
        let device = Device::from_info(info, None);
        assert_eq!(device.gateway_id.as_deref(), Some("gw-1"));
        assert_eq!(device.created.unwrap().timestamp_millis(), 1_500_000_000_000);
        assert_eq!(device.components[0].cid, "c1");
        assert_eq!(device.loc, Some(vec![45.5, 13.1]));
        assert_eq!(device.url(), "/devices/dev-1");
    }

    #[test]
    fn test_url_and_auth_as() {
        let device = account_device();
        assert_eq!(device.url(), "/accounts/acc-1/devices/dev-1");
        assert!(matches!(device.auth_as(), Ok(Authorization::User)));
        assert!(matches!(token_device().auth_as(), Ok(Authorization::Device(_))));
        assert!(matches!(
            Device::new("dev-x").auth_as(),
            Err(OispError::Authentication(_))
        ));
    }

    #[test]
    fn test_detached_device_never_borrows_user_session() {
        let (mut client, mock) = mock::logged_in_client();
        let mut device = Device::new("dev-x");

        let err = device.update(&mut client).unwrap_err();
        assert!(matches!(err, OispError::Authentication(_)));
        let err = device
            .set_properties(&mut client, &DeviceProperties::default())
            .unwrap_err();
        assert!(matches!(err, OispError::Authentication(_)));
        let err = device
            .add_component(&mut client, "temp", "temperature.v1.0", Some("c1"))
            .unwrap_err();
        assert!(matches!(err, OispError::Authentication(_)));
        let err = device.delete_component(&mut client, "c1").unwrap_err();
        assert!(matches!(err, OispError::Authentication(_)));

        assert_eq!(mock.request_count(), 0);
        assert!(device.components.is_empty());
    }

    #[test]
    fn test_new_device_defaults_gateway_and_skips_empty() {
        let mut new = NewDevice::new("dev-1", "thermo");
        new.tags.push("lab".to_string());
        assert_eq!(
            serde_json::to_value(&new).unwrap(),
            json!({ "deviceId": "dev-1", "gatewayId": "dev-1", "name": "thermo", "tags": ["lab"] })
        );
    }

    #[test]
    fn test_activate_with_account_code() {
        let (mut client, mock) = mock::logged_in_client();
        let mut device = account_device();

        mock.push_json(200, &json!({ "activationCode": "code-1" }));
        mock.push_json(200, &json!({ "deviceToken": "device-token", "domainId": "acc-1" }));
        let token = device.activate(&mut client, None).unwrap();

        assert_eq!(token, "device-token");
        assert_eq!(device.device_token(), Some("device-token"));
        let request = mock.last_request();
        assert_eq!(request.method, Method::PUT);
        assert_eq!(
            request.url,
            format!("{}/accounts/acc-1/devices/dev-1/activation", mock::API_ROOT)
        );
        assert_eq!(json_body(&request), json!({ "activationCode": "code-1" }));
    }

    #[test]
    fn test_activate_rejects_foreign_account() {
        let (mut client, mock) = mock::logged_in_client();
        let mut device = account_device();
        mock.push_json(200, &json!({ "deviceToken": "device-token", "domainId": "acc-2" }));

        let err = device.activate(&mut client, Some("code-1")).unwrap_err();
        assert!(matches!(err, OispError::InvalidResponse(_)));
        assert_eq!(device.device_token(), None);
    }

    #[test]
    fn test_activate_without_account_needs_code() {
        let (mut client, mock) = mock::anonymous_client();
        let mut device = Device::new("dev-1");
        let err = device.activate(&mut client, None).unwrap_err();
        assert!(matches!(err, OispError::InvalidArgument(_)));
        assert_eq!(mock.request_count(), 0);
    }

    #[test]
    fn test_set_properties_updates_after_success() {
        let (mut client, mock) = mock::logged_in_client();
        let mut device = account_device();
        let properties = DeviceProperties {
            name: Some("renamed".to_string()),
            tags: Some(vec!["t1".to_string()]),
            ..DeviceProperties::default()
        };

        mock.push_json(400, &json!({ "code": 400, "message": "Invalid request" }));
        assert!(device.set_properties(&mut client, &properties).is_err());
        assert_eq!(device.name.as_deref(), Some("thermo"));

        mock.push_json(200, &json!({}));
        device.set_properties(&mut client, &properties).unwrap();
        assert_eq!(device.name.as_deref(), Some("renamed"));
        assert_eq!(device.tags, vec!["t1".to_string()]);
        assert_eq!(
            json_body(&mock.last_request()),
            json!({ "name": "renamed", "tags": ["t1"] })
        );
    }

    #[test]
    fn test_add_and_delete_component() {
        let (mut client, mock) = mock::anonymous_client();
        let mut device = token_device();

        mock.push_json(
            201,
            &json!({ "cid": "generated", "name": "temp", "type": "temperature.v1.0" }),
        );
        let component = device
            .add_component(&mut client, "temp", "temperature.v1.0", None)
            .unwrap();
        assert_eq!(device.components, vec![component]);

        let sent = json_body(&mock.last_request());
        let cid = sent["cid"].as_str().unwrap();
        assert!(uuid::Uuid::parse_str(cid).is_ok());
        assert_eq!(sent["type"], "temperature.v1.0");
        assert_eq!(
            bearer(&mock.last_request()).as_deref(),
            Some("Bearer device-token")
        );

        mock.push_empty(204);
        device.delete_component(&mut client, "generated").unwrap();
        assert!(device.components.is_empty());
        assert!(mock.last_request().url.ends_with("/devices/dev-1/components/generated"));
    }

    #[test]
    fn test_update_refreshes_fields() {
        let (mut client, mock) = mock::logged_in_client();
        let mut device = account_device();
        mock.push_json(200, &json!({ "deviceId": "dev-1", "status": "active" }));
        device.update(&mut client).unwrap();
        assert_eq!(device.status.as_deref(), Some(Device::STATUS_ACTIVE));
        assert_eq!(device.name.as_deref(), Some("thermo"));
    }

    #[test]
    fn test_submit_without_token_sends_nothing() {
        let (mut client, mock) = mock::logged_in_client();
        let mut device = account_device();
        device.add_sample("c1", 10, Some(1_000), None);

        let err = device.submit_data(&mut client, None).unwrap_err();
        assert!(matches!(err, OispError::Authentication(_)));
        assert_eq!(mock.request_count(), 0);
        assert_eq!(device.unsent_data().len(), 1);
    }

    #[test]
    fn test_submit_json_clears_buffer() {
        let (mut client, mock) = mock::anonymous_client();
        let mut device = token_device();
        device.add_sample("c1", 10, Some(1_000), None);
        device.add_sample("c1", 11.5, Some(2_000), Some(vec![1.0, 2.0]));

        mock.push_empty(201);
        device.submit_data(&mut client, Some(3_000)).unwrap();

        let request = mock.last_request();
        assert_eq!(request.url, format!("{}/data/dev-1", mock::API_ROOT));
        assert_eq!(
            header(&request, CONTENT_TYPE).as_deref(),
            Some("application/json")
        );
        assert_eq!(
            json_body(&request),
            json!({
                "on": 3_000,
                "accountId": "acc-1",
                "data": [
                    { "componentId": "c1", "value": 10, "on": 1_000 },
                    { "componentId": "c1", "value": 11.5, "on": 2_000, "loc": [1.0, 2.0] }
                ]
            })
        );
        assert!(device.unsent_data().is_empty());
    }

    #[test]
    fn test_submit_binary_uses_cbor() {
        let (mut client, mock) = mock::anonymous_client();
        let mut device = token_device();
        device.add_sample("img", vec![0_u8, 1, 2, 255], Some(1_000), None);

        mock.push_empty(201);
        device.submit_data(&mut client, None).unwrap();

        let request = mock.last_request();
        assert_eq!(
            header(&request, CONTENT_TYPE).as_deref(),
            Some("application/cbor")
        );
        let body = cbor_body(&request);
        let data = cbor::map_get(&body, "data").unwrap();
        let first = &data.as_array().unwrap()[0];
        assert_eq!(
            cbor::map_get(first, "value"),
            Some(&ciborium::Value::Bytes(vec![0, 1, 2, 255]))
        );
    }

    #[test]
    fn test_failed_submit_keeps_buffer() {
        let (mut client, mock) = mock::anonymous_client();
        let mut device = token_device();
        device.add_sample("c1", "on", Some(1_000), None);

        mock.push_json(500, &json!({ "code": code::SUBMISSION_ERROR, "message": "Submission error" }));
        let err = device.submit_data(&mut client, None).unwrap_err();
        assert!(err.is_code(code::SUBMISSION_ERROR));
        assert_eq!(device.unsent_data().len(), 1);
    }
}
