//! Recording transport for tests

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::transport::{HttpRequest, HttpResponse, Transport};
use crate::config::ClientConfig;
use crate::error::{OispError, Result};
use crate::token::UserToken;
use crate::{Account, Client};
use chrono::{Duration, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct MockState {
    responses: VecDeque<HttpResponse>,
    requests: Vec<HttpRequest>,
}

/// Transport that replays queued responses and records every request.
/// Clones share state, so a test keeps one handle and gives one to the client.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: HttpResponse) {
        self.state.lock().unwrap().responses.push_back(response);
    }

    pub fn push_json<T: Serialize>(&self, status: u16, body: &T) {
        self.push(reply(status, "application/json", serde_json::to_vec(body).unwrap()));
    }

    pub fn push_cbor<T: Serialize>(&self, status: u16, body: &T) {
        let mut encoded = Vec::new();
        ciborium::into_writer(body, &mut encoded).unwrap();
        self.push(reply(status, "application/cbor", encoded));
    }

    pub fn push_empty(&self, status: u16) {
        self.push(reply(status, "text/plain", Vec::new()));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    pub fn last_request(&self) -> HttpRequest {
        self.state
            .lock()
            .unwrap()
            .requests
            .last()
            .cloned()
            .expect("no request was sent")
    }
}

impl Transport for MockTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(request);
        state
            .responses
            .pop_front()
            .ok_or_else(|| OispError::Http("no mock response queued".to_string()))
    }
}

pub fn reply(status: u16, content_type: &str, body: Vec<u8>) -> HttpResponse {
    let mut headers = HeaderMap::new();
    let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
    HttpResponse {
        status,
        headers,
        body,
    }
}

pub const API_ROOT: &str = "http://oisp.test/v1/api";
pub const ACCOUNT_ID: &str = "acc-1";

pub fn config() -> ClientConfig {
    ClientConfig {
        api_url: API_ROOT.to_string(),
        ..ClientConfig::default()
    }
}

pub fn account() -> Account {
    Account::new("test_account", ACCOUNT_ID, crate::account::Role::Admin)
}

pub fn user_token(valid_for: Duration) -> UserToken {
    UserToken {
        value: "user-token".to_string(),
        typ: "JWT".to_string(),
        alg: "RS256".to_string(),
        jti: "jti-1".to_string(),
        issued_by: "http://enableiot.com".to_string(),
        user_id: "user-1".to_string(),
        expires_at: Utc::now() + valid_for,
        accounts: vec![account()],
    }
}

/// A client with no token and the mock handle driving it
pub fn anonymous_client() -> (Client, MockTransport) {
    let mock = MockTransport::new();
    let client = Client::with_transport(config(), Box::new(mock.clone()));
    (client, mock)
}

/// A client logged in with a token valid for one hour
pub fn logged_in_client() -> (Client, MockTransport) {
    let (mut client, mock) = anonymous_client();
    client.set_user_token(user_token(Duration::hours(1)));
    (client, mock)
}

pub fn header(request: &HttpRequest, name: reqwest::header::HeaderName) -> Option<String> {
    request
        .headers
        .get(name)
        .map(|v| v.to_str().unwrap().to_string())
}

pub fn bearer(request: &HttpRequest) -> Option<String> {
    header(request, AUTHORIZATION)
}

pub fn json_body(request: &HttpRequest) -> serde_json::Value {
    serde_json::from_slice(request.body.as_deref().expect("request has no body")).unwrap()
}

pub fn cbor_body(request: &HttpRequest) -> ciborium::Value {
    ciborium::from_reader(request.body.as_deref().expect("request has no body")).unwrap()
}
