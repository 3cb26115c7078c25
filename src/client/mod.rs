//! HTTP client abstraction and request dispatcher
//!
//! [`Client`] is the session: it owns the transport, the current user token
//! and the last response. Every domain operation funnels through
//! [`Client::call`], which builds the URL, attaches the authorization header,
//! encodes the body, performs exactly one request and validates the status.

pub mod cbor;
pub mod request;
pub mod response;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;

use crate::account::{Account, Role};
use crate::auth;
use crate::config::ClientConfig;
use crate::device::{Device, DeviceInfo};
use crate::error::{OispError, Result};
use crate::token::{TokenInfo, UserToken};
use crate::user::User;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, trace, warn};

pub use request::{Authorization, Body};
pub use response::{Payload, Response};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};

/// Cloud version and health information from `/health`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    /// Response kind, `healthcheck`
    #[serde(default)]
    pub kind: Option<String>,
    /// Whether the service reports itself healthy
    #[serde(default)]
    pub is_healthy: Option<bool>,
    /// Deployment setting (e.g. `production`)
    #[serde(default)]
    pub current_setting: Option<String>,
    /// Service name
    #[serde(default)]
    pub name: Option<String>,
    /// Build identifier
    #[serde(default)]
    pub build: Option<String>,
    /// Build date
    #[serde(default)]
    pub date: Option<String>,
}

const ACCEPTED_CONTENT_TYPES: &str = "application/json, application/cbor";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct CreatedAccount {
    name: String,
    id: String,
}

/// OISP session: API root, transport settings and the current user token
#[derive(Debug)]
pub struct Client {
    config: ClientConfig,
    transport: Box<dyn Transport>,
    user_token: Option<UserToken>,
    user_id: Option<String>,
    last_response: Option<Response>,
}

impl Client {
    /// Create a client using the default `reqwest` transport.
    ///
    /// No request is made; see [`Client::connect`] for a checked connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the transport cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_transport(config, Box::new(transport)))
    }

    /// Create a client and test the connection with a `/health` request
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built or the service is unreachable.
    pub fn connect(config: ClientConfig) -> Result<Self> {
        let mut client = Self::new(config)?;
        let info = client.get_server_info()?;
        debug!(name = ?info.name, build = ?info.build, "connected");
        Ok(client)
    }

    /// Create a client on top of a custom transport
    #[must_use]
    pub fn with_transport(config: ClientConfig, transport: Box<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            user_token: None,
            user_id: None,
            last_response: None,
        }
    }

    /// Create a client from a previously obtained user token string
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be resolved through `/auth/tokenInfo`.
    pub fn with_token(config: ClientConfig, token: &str) -> Result<Self> {
        let mut client = Self::new(config)?;
        let user_token = client.get_user_token(Some(token))?;
        client.set_user_token(user_token);
        Ok(client)
    }

    /// Configuration the client was built with
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Current user token, if authenticated
    #[must_use]
    pub const fn user_token(&self) -> Option<&UserToken> {
        self.user_token.as_ref()
    }

    /// Id of the authenticated user
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Most recent response, whatever its status
    #[must_use]
    pub const fn last_response(&self) -> Option<&Response> {
        self.last_response.as_ref()
    }

    /// Install a user token as the session token
    pub fn set_user_token(&mut self, token: UserToken) {
        self.user_id = Some(token.user_id.clone());
        self.user_token = Some(token);
    }

    pub(crate) fn forget_account(&mut self, account_id: &str) {
        if let Some(token) = self.user_token.as_mut() {
            token.accounts.retain(|a| a.id != account_id);
        }
    }

    // ═══════════════════════════════════════════════════════════════
    // Dispatcher
    // ═══════════════════════════════════════════════════════════════

    /// Dispatch one request.
    ///
    /// `endpoint` is relative to the API root. When `expect` is given and the
    /// received status differs, an [`OispError::Api`] is returned; the
    /// response is still recorded as [`Client::last_response`].
    ///
    /// # Errors
    ///
    /// Returns [`OispError::Authentication`] without sending anything when the
    /// requested token is missing or expired, [`OispError::Http`] on transport
    /// failure and [`OispError::Api`] on a status mismatch.
    pub fn call(
        &mut self,
        method: Method,
        endpoint: &str,
        authorization: Authorization<'_>,
        expect: Option<u16>,
        body: Body,
    ) -> Result<&Response> {
        let headers = self.headers(authorization, &body)?;
        let url = format!("{}{}", self.config.api_url, endpoint);

        debug!(method = %method, url = %url, "dispatching request");
        match &body {
            Body::Json(_) => {
                if let Some(value) = body.redacted() {
                    trace!(payload = %value, "payload (JSON)");
                }
            }
            Body::Cbor(bytes) => trace!(size = bytes.len(), "payload (CBOR)"),
            Body::Empty => {}
        }

        let raw = self.transport.send(HttpRequest {
            method,
            url,
            headers,
            body: body.into_bytes()?,
        })?;

        let response = self.last_response.insert(Response::decode(raw));
        debug!(
            status = response.status,
            content_type = response.content_type(),
            "response received"
        );
        trace!(payload = ?response.payload, "response payload");

        if let Some(expected) = expect {
            if response.status != expected {
                warn!(status = response.status, expected, "unexpected status");
                return Err(response.to_error(expected));
            }
        }
        Ok(&*response)
    }

    /// GET request
    ///
    /// # Errors
    ///
    /// See [`Client::call`].
    pub fn get(
        &mut self,
        endpoint: &str,
        authorization: Authorization<'_>,
        expect: Option<u16>,
    ) -> Result<&Response> {
        self.call(Method::GET, endpoint, authorization, expect, Body::Empty)
    }

    /// POST request
    ///
    /// # Errors
    ///
    /// See [`Client::call`].
    pub fn post(
        &mut self,
        endpoint: &str,
        authorization: Authorization<'_>,
        expect: Option<u16>,
        body: Body,
    ) -> Result<&Response> {
        self.call(Method::POST, endpoint, authorization, expect, body)
    }

    /// PUT request
    ///
    /// # Errors
    ///
    /// See [`Client::call`].
    pub fn put(
        &mut self,
        endpoint: &str,
        authorization: Authorization<'_>,
        expect: Option<u16>,
        body: Body,
    ) -> Result<&Response> {
        self.call(Method::PUT, endpoint, authorization, expect, body)
    }

    /// DELETE request
    ///
    /// # Errors
    ///
    /// See [`Client::call`].
    pub fn delete(
        &mut self,
        endpoint: &str,
        authorization: Authorization<'_>,
        expect: Option<u16>,
    ) -> Result<&Response> {
        self.call(Method::DELETE, endpoint, authorization, expect, Body::Empty)
    }

    fn headers(&self, authorization: Authorization<'_>, body: &Body) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static(body.content_type()));
        let _ = headers.insert(ACCEPT, HeaderValue::from_static(ACCEPTED_CONTENT_TYPES));

        if let Some(token) = self.bearer_token(authorization)? {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                OispError::InvalidArgument("token contains invalid header characters".to_string())
            })?;
            let _ = headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    fn bearer_token<'a>(&'a self, authorization: Authorization<'a>) -> Result<Option<&'a str>> {
        match authorization {
            Authorization::Anonymous => Ok(None),
            Authorization::User => {
                let token = self.user_token.as_ref().ok_or_else(|| {
                    OispError::Authentication(
                        "You need to authenticate using the auth method first, or authorize as a device"
                            .to_string(),
                    )
                })?;
                if token.is_expired() {
                    return Err(OispError::Authentication(
                        "User token expired, you need to use the auth method again".to_string(),
                    ));
                }
                Ok(Some(&token.value))
            }
            Authorization::Device(device) => {
                let token = device.device_token().ok_or_else(|| {
                    OispError::Authentication(format!(
                        "Device {} has no device token, activate it first",
                        device.device_id
                    ))
                })?;
                if auth::is_jwt_expired(token) {
                    return Err(OispError::Authentication(format!(
                        "Device token of {} expired",
                        device.device_id
                    )));
                }
                Ok(Some(token))
            }
            Authorization::Bearer(token) if token.is_empty() => Err(OispError::InvalidArgument(
                "token string must not be empty".to_string(),
            )),
            Authorization::Bearer(token) => Ok(Some(token)),
        }
    }

    // ═══════════════════════════════════════════════════════════════
    // Authentication
    // ═══════════════════════════════════════════════════════════════

    /// Submit user credentials and store the resulting user token.
    ///
    /// On failure the session is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`OispError::Api`] with code 401 for invalid credentials.
    pub fn auth(&mut self, username: &str, password: &str) -> Result<()> {
        let payload = json!({ "username": username, "password": password });
        let token: TokenResponse = self
            .post("/auth/token", Authorization::Anonymous, Some(200), Body::json(&payload)?)?
            .parse()?;

        let user_token = self.get_user_token(Some(&token.token))?;
        debug!(user_id = %user_token.user_id, "authenticated");
        self.set_user_token(user_token);
        Ok(())
    }

    /// Resolve token metadata.
    ///
    /// Without a token string the cached session token is returned.
    ///
    /// # Errors
    ///
    /// Returns [`OispError::InvalidArgument`] when no token string is given
    /// and none is cached, or an API error if `/auth/tokenInfo` fails.
    pub fn get_user_token(&mut self, token: Option<&str>) -> Result<UserToken> {
        let Some(token) = token else {
            return self.user_token.clone().ok_or_else(|| {
                OispError::InvalidArgument(
                    "token_str must be specified for first token acquisition".to_string(),
                )
            });
        };

        let info: TokenInfo = self
            .get("/auth/tokenInfo", Authorization::Bearer(token), Some(200))?
            .parse()?;
        UserToken::from_token_info(token, info)
    }

    // ═══════════════════════════════════════════════════════════════
    // Users
    // ═══════════════════════════════════════════════════════════════

    /// Get a user; without an id the token holder is returned
    ///
    /// # Errors
    ///
    /// Returns [`OispError::Authentication`] when not logged in.
    pub fn get_user(&mut self, user_id: Option<&str>) -> Result<User> {
        let user_id = match user_id {
            Some(id) => id.to_string(),
            None => self.user_id.clone().ok_or_else(|| {
                OispError::Authentication("You need to authenticate first".to_string())
            })?,
        };
        let endpoint = format!("/users/{user_id}");
        let response = self.get(&endpoint, Authorization::User, Some(200))?;
        Ok(User::from_info(response.parse()?))
    }

    /// Send a password reset mail
    ///
    /// # Errors
    ///
    /// Returns an API error if the service rejects the request.
    pub fn reset_password_request_mail(&mut self, email: &str) -> Result<()> {
        let payload = json!({ "email": email });
        let _ = self.post(
            "/users/forgot_password",
            Authorization::Anonymous,
            Some(200),
            Body::json(&payload)?,
        )?;
        Ok(())
    }

    /// Reset a password with the token received by email
    ///
    /// # Errors
    ///
    /// Returns an API error if the service rejects the request.
    pub fn reset_password_submit_new(&mut self, token: &str, password: &str) -> Result<()> {
        let payload = json!({ "token": token, "password": password });
        let _ = self.put(
            "/users/forgot_password",
            Authorization::Anonymous,
            Some(200),
            Body::json(&payload)?,
        )?;
        Ok(())
    }

    /// Change the password of the user identified by `email`
    ///
    /// # Errors
    ///
    /// Returns an API error if the service rejects the request.
    pub fn change_user_password(
        &mut self,
        email: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let endpoint = format!("/users/{}/change_password", urlencoding::encode(email));
        let payload = json!({ "currentpwd": current_password, "password": new_password });
        let _ = self.put(
            &endpoint,
            Authorization::Anonymous,
            Some(200),
            Body::json(&payload)?,
        )?;
        Ok(())
    }

    /// Ask the service to send an activation mail
    ///
    /// # Errors
    ///
    /// Returns an API error if the service rejects the request.
    pub fn request_user_activation(&mut self, email: &str) -> Result<()> {
        let payload = json!({ "email": email });
        let _ = self.post(
            "/users/request_user_activation",
            Authorization::Anonymous,
            Some(200),
            Body::json(&payload)?,
        )?;
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════
    // Service, accounts and devices
    // ═══════════════════════════════════════════════════════════════

    /// Get cloud version and health information
    ///
    /// # Errors
    ///
    /// Returns an error if the service is unreachable or unhealthy.
    pub fn get_server_info(&mut self) -> Result<ServerInfo> {
        self.get("/health", Authorization::Anonymous, Some(200))?
            .parse()
    }

    /// Accounts attached to the current user token
    ///
    /// # Errors
    ///
    /// Returns [`OispError::Authentication`] when not logged in.
    pub fn get_accounts(&self) -> Result<&[Account]> {
        self.user_token
            .as_ref()
            .map(|t| t.accounts.as_slice())
            .ok_or_else(|| OispError::Authentication("You need to authenticate first".to_string()))
    }

    /// Attach to a device using its device token.
    ///
    /// With `fetch_info` the device details are read from `/devices/{id}`;
    /// otherwise only the id and `domain_id` are known locally.
    ///
    /// # Errors
    ///
    /// Returns an API error if the device cannot be fetched.
    pub fn get_device(
        &mut self,
        device_token: &str,
        device_id: &str,
        domain_id: Option<&str>,
        fetch_info: bool,
    ) -> Result<Device> {
        let mut device = if fetch_info {
            let endpoint = format!("/devices/{device_id}");
            let info: DeviceInfo = self
                .get(&endpoint, Authorization::Bearer(device_token), Some(200))?
                .parse()?;
            Device::from_info(info, None)
        } else {
            let mut device = Device::new(device_id);
            device.domain_id = domain_id.map(ToString::to_string);
            device
        };
        device.set_device_token(device_token);
        Ok(device)
    }

    /// Create an account; the creator becomes its admin.
    ///
    /// A new token must be acquired through [`Client::auth`] to see the
    /// account in [`Client::get_accounts`].
    ///
    /// # Errors
    ///
    /// Returns an API error, e.g. code 3409 if the account already exists.
    pub fn create_account(&mut self, name: &str) -> Result<Account> {
        let payload = json!({ "name": name });
        let created: CreatedAccount = self
            .post("/accounts", Authorization::User, Some(201), Body::json(&payload)?)?
            .parse()?;
        Ok(Account::new(created.name, created.id, Role::Admin))
    }
}
