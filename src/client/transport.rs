//! Transport adapter: performs exactly one HTTP exchange
//!
//! The dispatcher never talks to `reqwest` directly; it hands a fully built
//! [`HttpRequest`] to a [`Transport`] and gets the raw status, headers and
//! body back. Timeouts, proxies and TLS verification are the transport's
//! concern.

use crate::config::{ClientConfig, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_TCP_KEEPALIVE_SECS};
use crate::error::Result;
use reqwest::header::HeaderMap;
use reqwest::{Method, Proxy};
use std::fmt::Debug;
use std::time::Duration;

/// A fully built request, ready to be sent
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP verb
    pub method: Method,
    /// Absolute URL (API root + endpoint)
    pub url: String,
    /// Request headers, including `Content-Type` and `Authorization`
    pub headers: HeaderMap,
    /// Encoded body, if any
    pub body: Option<Vec<u8>>,
}

/// Raw response as returned by the wire
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Numeric status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Undecoded body
    pub body: Vec<u8>,
}

/// Performs a single blocking HTTP call
pub trait Transport: Debug + Send {
    /// Send the request and wait for the full response body.
    ///
    /// # Errors
    ///
    /// Returns [`crate::OispError::Http`] when no response could be obtained.
    fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Default transport backed by `reqwest`'s blocking client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    /// Build a transport honoring the proxy, TLS and timeout settings.
    ///
    /// Proxy keys are `http`, `https` or `all`; with no proxies configured
    /// the system proxy settings apply.
    ///
    /// # Errors
    ///
    /// Returns an error if a proxy URL is invalid or the client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut builder = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .tcp_keepalive(Duration::from_secs(DEFAULT_TCP_KEEPALIVE_SECS))
            .danger_accept_invalid_certs(!config.verify_certs);

        for (scheme, url) in &config.proxies {
            let proxy = match scheme.as_str() {
                "http" => Proxy::http(url)?,
                "https" => Proxy::https(url)?,
                _ => Proxy::all(url)?,
            };
            builder = builder.proxy(proxy);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes()?.to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
