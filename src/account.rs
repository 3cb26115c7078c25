//! Account management: activation codes, devices, component catalog, data search

use crate::client::{Authorization, Body, Client};
use crate::component::{ComponentType, ComponentTypeUpdate, NewComponentType};
use crate::data_query::{DataQuery, QueryResponse};
use crate::device::{Device, DeviceInfo, NewDevice};
use crate::error::{OispError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Role of the user within an account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full administrative access
    Admin,
    /// Regular member
    #[default]
    User,
    /// A role this client does not know about
    #[serde(other)]
    Unknown,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Admin => "admin",
            Self::User => "user",
            Self::Unknown => "unknown",
        })
    }
}

/// Organizational unit owning devices and component types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Display name
    pub name: String,
    /// Account id (the devices' domain id)
    pub id: String,
    /// Role of the current user in this account
    pub role: Role,
}

/// Filters for [`Account::get_devices`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceFilter {
    /// Sort by this attribute (e.g. `deviceId`, `name`)
    pub sort: Option<String>,
    /// `asc` or `desc`
    pub order: Option<String>,
    /// Maximum number of results
    pub limit: Option<u32>,
    /// Number of results to skip
    pub skip: Option<u32>,
    /// Filter by device id
    pub device_id: Option<String>,
    /// Filter by gateway id
    pub gateway_id: Option<String>,
    /// Filter by name
    pub name: Option<String>,
    /// Filter by status
    pub status: Option<String>,
}

impl DeviceFilter {
    fn query_string(&self) -> String {
        let params: [(&str, Option<String>); 8] = [
            ("sort", self.sort.clone()),
            ("order", self.order.clone()),
            ("limit", self.limit.map(|v| v.to_string())),
            ("skip", self.skip.map(|v| v.to_string())),
            ("deviceId", self.device_id.clone()),
            ("gatewayId", self.gateway_id.clone()),
            ("name", self.name.clone()),
            ("status", self.status.clone()),
        ];

        let pairs: Vec<String> = params
            .iter()
            .filter_map(|(key, value)| {
                value
                    .as_ref()
                    .map(|v| format!("{key}={}", urlencoding::encode(v)))
            })
            .collect();

        if pairs.is_empty() {
            String::new()
        } else {
            format!("?{}", pairs.join("&"))
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivationCode {
    #[serde(default)]
    activation_code: Option<String>,
}

impl Account {
    /// Create an account value; nothing is created on the service
    #[must_use]
    pub fn new(name: impl Into<String>, id: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            role,
        }
    }

    /// Endpoint of this account
    #[must_use]
    pub fn url(&self) -> String {
        format!("/accounts/{}", self.id)
    }

    /// Delete the account and drop it from the session's token
    ///
    /// # Errors
    ///
    /// Returns an API error if the service refuses the deletion.
    pub fn delete(&self, client: &mut Client) -> Result<()> {
        let _ = client.delete(&self.url(), Authorization::User, Some(204))?;
        client.forget_account(&self.id);
        Ok(())
    }

    /// Current activation code.
    ///
    /// When the service reports no valid code and `auto_refresh` is set, a
    /// new one is requested; otherwise `None` is returned.
    ///
    /// # Errors
    ///
    /// Returns an API error if either request fails.
    pub fn get_activation_code(
        &self,
        client: &mut Client,
        auto_refresh: bool,
    ) -> Result<Option<String>> {
        let endpoint = format!("{}/activationcode", self.url());
        let code: ActivationCode = client
            .get(&endpoint, Authorization::User, Some(200))?
            .parse()?;

        match code.activation_code.filter(|c| !c.is_empty()) {
            Some(code) => Ok(Some(code)),
            None if auto_refresh => self.refresh_activation_code(client).map(Some),
            None => Ok(None),
        }
    }

    /// Request a new activation code
    ///
    /// # Errors
    ///
    /// Returns an API error, or [`OispError::InvalidResponse`] if no code is returned.
    pub fn refresh_activation_code(&self, client: &mut Client) -> Result<String> {
        let endpoint = format!("{}/activationcode/refresh", self.url());
        let code: ActivationCode = client
            .put(&endpoint, Authorization::User, Some(200), Body::Empty)?
            .parse()?;
        code.activation_code.ok_or_else(|| {
            OispError::InvalidResponse("refresh returned no activation code".to_string())
        })
    }

    /// List the account's devices
    ///
    /// # Errors
    ///
    /// Returns an API error if the listing fails.
    pub fn get_devices(&self, client: &mut Client, filter: &DeviceFilter) -> Result<Vec<Device>> {
        let endpoint = format!("{}/devices{}", self.url(), filter.query_string());
        let devices: Vec<DeviceInfo> = client
            .get(&endpoint, Authorization::User, Some(200))?
            .parse()?;
        Ok(devices
            .into_iter()
            .map(|info| Device::from_info(info, Some(self.clone())))
            .collect())
    }

    /// Get a single device
    ///
    /// # Errors
    ///
    /// Returns an API error, e.g. code 1404 if the device does not exist.
    pub fn get_device(&self, client: &mut Client, device_id: &str) -> Result<Device> {
        let endpoint = format!("{}/devices/{device_id}", self.url());
        let info: DeviceInfo = client
            .get(&endpoint, Authorization::User, Some(200))?
            .parse()?;
        Ok(Device::from_info(info, Some(self.clone())))
    }

    /// Register a device; its id must be unique
    ///
    /// # Errors
    ///
    /// Returns an API error, e.g. code 1409 if the device already exists.
    pub fn create_device(&self, client: &mut Client, device: &NewDevice) -> Result<Device> {
        let endpoint = format!("{}/devices", self.url());
        let info: DeviceInfo = client
            .post(&endpoint, Authorization::User, Some(201), Body::json(device)?)?
            .parse()?;
        Ok(Device::from_info(info, Some(self.clone())))
    }

    /// All device tags used in the account
    ///
    /// # Errors
    ///
    /// Returns an API error if the request fails.
    pub fn get_device_tags(&self, client: &mut Client) -> Result<Vec<String>> {
        let endpoint = format!("{}/devices/tags", self.url());
        client.get(&endpoint, Authorization::User, Some(200))?.parse()
    }

    /// All device attributes, each with every value in use
    ///
    /// # Errors
    ///
    /// Returns an API error if the request fails.
    pub fn get_device_attributes(
        &self,
        client: &mut Client,
    ) -> Result<BTreeMap<String, Vec<String>>> {
        let endpoint = format!("{}/devices/attributes", self.url());
        client.get(&endpoint, Authorization::User, Some(200))?.parse()
    }

    /// Component types available to the account
    ///
    /// # Errors
    ///
    /// Returns an API error if the request fails.
    pub fn get_component_types_catalog(
        &self,
        client: &mut Client,
        full: bool,
    ) -> Result<Vec<ComponentType>> {
        let mut endpoint = format!("{}/cmpcatalog", self.url());
        if full {
            endpoint.push_str("?full=true");
        }
        client.get(&endpoint, Authorization::User, Some(200))?.parse()
    }

    /// Add a component type to the catalog
    ///
    /// # Errors
    ///
    /// Returns an API error, e.g. code 5409 if it already exists.
    pub fn create_component_type(
        &self,
        client: &mut Client,
        component_type: &NewComponentType,
    ) -> Result<()> {
        let endpoint = format!("{}/cmpcatalog", self.url());
        let _ = client.post(
            &endpoint,
            Authorization::User,
            Some(201),
            Body::json(component_type)?,
        )?;
        Ok(())
    }

    /// Update a component type; the service bumps its minor version
    ///
    /// # Errors
    ///
    /// Returns an API error if the update is rejected.
    pub fn update_component_type(
        &self,
        client: &mut Client,
        component_type_id: &str,
        update: &ComponentTypeUpdate,
    ) -> Result<ComponentType> {
        let endpoint = format!("{}/cmpcatalog/{component_type_id}", self.url());
        client
            .put(&endpoint, Authorization::User, Some(201), Body::json(update)?)?
            .parse()
    }

    /// A single component type
    ///
    /// # Errors
    ///
    /// Returns an API error, e.g. code 5404 if unknown.
    pub fn get_component_type(
        &self,
        client: &mut Client,
        component_type_id: &str,
    ) -> Result<ComponentType> {
        let endpoint = format!("{}/cmpcatalog/{component_type_id}", self.url());
        client.get(&endpoint, Authorization::User, Some(200))?.parse()
    }

    /// Search data accessible to the account
    ///
    /// # Errors
    ///
    /// Returns an API error, or [`OispError::InvalidResponse`] if the answer
    /// is not an advanced inquiry response for this account.
    pub fn search_data(&self, client: &mut Client, query: &DataQuery) -> Result<QueryResponse> {
        let endpoint = format!("{}/data/search/advanced", self.url());
        let typed = client.config().typed_samples;
        let response = client.post(&endpoint, Authorization::User, Some(200), Body::json(query)?)?;
        QueryResponse::from_response(self.clone(), response.parse()?, typed)
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Account | name: {}\tid:{}\trole:{}",
            self.name, self.id, self.role
        )
    }
}
