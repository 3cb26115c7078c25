//! Default configuration values

/// Default API root
pub fn default_api_url() -> String {
    "https://streammyiot.com/v1/api".to_string()
}

/// Default request timeout in seconds
pub const fn default_timeout() -> u64 {
    30
}

/// TLS certificates are verified unless disabled
pub const fn default_verify_certs() -> bool {
    true
}

/// Numeric query results are converted from the service's string form
pub const fn default_typed_samples() -> bool {
    true
}

/// Connect timeout used by the transport, in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// TCP keepalive interval used by the transport, in seconds
pub const DEFAULT_TCP_KEEPALIVE_SECS: u64 = 60;
