//! Platform users

use crate::account::{Account, Role};
use crate::client::{Authorization, Body, Client};
use crate::error::Result;
use serde::Deserialize;
use std::collections::BTreeMap;

/// User as returned by `/users/{id}`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    accounts: BTreeMap<String, UserAccount>,
    #[serde(default)]
    attributes: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    terms_and_conditions: Option<bool>,
    #[serde(default, alias = "is_verified")]
    verified: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
struct UserAccount {
    name: String,
    #[serde(default)]
    role: Role,
}

/// A platform user; creating the value does not create a user on the service
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// User id
    pub user_id: String,
    /// Email address
    pub email: Option<String>,
    /// Accounts the user belongs to
    pub accounts: Vec<Account>,
    /// Free-form attributes
    pub attributes: BTreeMap<String, serde_json::Value>,
    /// Whether the terms and conditions were accepted
    pub tc_accepted: Option<bool>,
    /// Whether the email address was verified
    pub is_verified: Option<bool>,
}

impl User {
    /// Build a user from the service's description
    #[must_use]
    pub fn from_info(info: UserInfo) -> Self {
        Self {
            user_id: info.id,
            email: info.email,
            accounts: info
                .accounts
                .into_iter()
                .map(|(id, account)| Account::new(account.name, id, account.role))
                .collect(),
            attributes: info.attributes,
            tc_accepted: info.terms_and_conditions,
            is_verified: info.verified,
        }
    }

    /// Endpoint of this user
    #[must_use]
    pub fn url(&self) -> String {
        format!("/users/{}", self.user_id)
    }

    /// Replace the attribute map; keys not included are dropped
    ///
    /// # Errors
    ///
    /// Returns an API error if the service rejects the update.
    pub fn update_attributes(
        &mut self,
        client: &mut Client,
        attributes: BTreeMap<String, serde_json::Value>,
    ) -> Result<()> {
        let payload = serde_json::json!({ "attributes": attributes });
        let _ = client.put(&self.url(), Authorization::User, Some(200), Body::json(&payload)?)?;
        self.attributes = attributes;
        Ok(())
    }

    /// Delete the user along with accounts that have no other administrator.
    /// Any status is accepted; inspect [`Client::last_response`] for the outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent.
    pub fn delete(&self, client: &mut Client) -> Result<()> {
        let _ = client.delete(&self.url(), Authorization::User, None)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::client::mock::{self, json_body};
    use serde_json::json;

    fn user_json() -> serde_json::Value {
        json!({
            "id": "user-1",
            "email": "u@example.com",
            "accounts": {
                "acc-1": { "name": "home", "role": "admin" },
                "acc-2": { "name": "lab", "role": "user" }
            },
            "attributes": { "phone": "123" },
            "termsAndConditions": true,
            "verified": false,
            "created": 1_500_000_000_000_i64
        })
    }

    #[test]
    fn test_from_info_maps_accounts() {
        let user = User::from_info(serde_json::from_value(user_json()).unwrap());
        assert_eq!(user.url(), "/users/user-1");
        assert_eq!(
            user.accounts,
            vec![
                Account::new("home", "acc-1", Role::Admin),
                Account::new("lab", "acc-2", Role::User),
            ]
        );
        assert_eq!(user.tc_accepted, Some(true));
        assert_eq!(user.is_verified, Some(false));
    }

    #[test]
    fn test_update_attributes_replaces_map() {
        let (mut client, mock) = mock::logged_in_client();
        let mut user = User::from_info(serde_json::from_value(user_json()).unwrap());
        let attributes: BTreeMap<String, serde_json::Value> =
            [("city".to_string(), json!("Munich"))].into_iter().collect();

        mock.push_json(200, &json!({}));
        user.update_attributes(&mut client, attributes.clone()).unwrap();

        assert_eq!(user.attributes, attributes);
        let request = mock.last_request();
        assert_eq!(request.method, reqwest::Method::PUT);
        assert_eq!(json_body(&request), json!({ "attributes": { "city": "Munich" } }));
    }

    #[test]
    fn test_delete_accepts_any_status() {
        let (mut client, mock) = mock::logged_in_client();
        let user = User::from_info(serde_json::from_value(user_json()).unwrap());
        mock.push_empty(202);
        user.delete(&mut client).unwrap();
        assert_eq!(client.last_response().unwrap().status, 202);
    }
}
