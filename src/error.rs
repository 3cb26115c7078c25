//! Error types and handling for the OISP client
//!
//! Every failure is surfaced as one [`OispError`]. Local precondition
//! failures (missing or expired tokens, bad arguments) never reach the
//! network; remote failures carry the platform's numeric error code.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for OISP client operations
pub type Result<T> = std::result::Result<T, OispError>;

/// Structured error type for all client operations
#[derive(Error, Debug)]
pub enum OispError {
    // ═══════════════════════════════════════════════════════════════
    // Authentication & Authorization
    // ═══════════════════════════════════════════════════════════════
    /// Raised before contacting the server: no token, or the token expired
    #[error("Authentication error: {0}")]
    Authentication(String),

    // ═══════════════════════════════════════════════════════════════
    // Remote API Errors
    // ═══════════════════════════════════════════════════════════════
    /// The server answered with a status other than the expected one
    #[error("Exception during API call\nHTTP code: {status}, {expected} was expected{message}")]
    Api {
        /// Status code received
        status: u16,
        /// Status code the caller expected
        expected: u16,
        /// Application-level error code from the error body, if any
        code: Option<i64>,
        /// Pretty-printed error body (prefixed with a newline) or empty
        message: String,
    },

    /// Transport failure (DNS, TLS, connection refused, timeout)
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Response did not have the expected shape
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    // ═══════════════════════════════════════════════════════════════
    // Validation & Input Errors
    // ═══════════════════════════════════════════════════════════════
    /// Invalid local argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ═══════════════════════════════════════════════════════════════
    // Serialization & Encoding Errors
    // ═══════════════════════════════════════════════════════════════
    /// Failed to serialize a request body
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Failed to deserialize a response body
    #[error("Deserialization failed: {0}")]
    Deserialization(String),

    // ═══════════════════════════════════════════════════════════════
    // Configuration & File Errors
    // ═══════════════════════════════════════════════════════════════
    /// Failed to read configuration file
    #[error("Failed to read config from {path}: {reason}")]
    ConfigRead { path: PathBuf, reason: String },

    /// Failed to write configuration file
    #[error("Failed to write config to {path}: {reason}")]
    ConfigWrite { path: PathBuf, reason: String },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file not found
    #[error("Configuration not found. Run 'oisp login' to set up credentials")]
    NoConfig,

    // ═══════════════════════════════════════════════════════════════
    // Other Errors
    // ═══════════════════════════════════════════════════════════════
    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OispError {
    /// Application error code carried by an [`OispError::Api`] error
    #[must_use]
    pub const fn code(&self) -> Option<i64> {
        match self {
            Self::Api { code, .. } => *code,
            _ => None,
        }
    }

    /// Whether this is an API error carrying the given application code
    #[must_use]
    pub fn is_code(&self, expected: i64) -> bool {
        self.code() == Some(expected)
    }

    /// HTTP status received, for API errors
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Get the exit code for this error
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::NoConfig => 1,
            Self::InvalidArgument(_) => 2,
            Self::Authentication(_) => 3,
            Self::Http(_) => 4,
            Self::Api { .. } | Self::InvalidResponse(_) => 5,
            _ => 1,
        }
    }
}

impl From<std::io::Error> for OispError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<reqwest::Error> for OispError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Http(format!("request timed out: {err}"))
        } else if err.is_builder() {
            Self::InvalidConfig(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for OispError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_syntax() {
            Self::Deserialization(format!("JSON syntax error: {err}"))
        } else {
            Self::Deserialization(err.to_string())
        }
    }
}

impl From<ciborium::de::Error<std::io::Error>> for OispError {
    fn from(err: ciborium::de::Error<std::io::Error>) -> Self {
        Self::Deserialization(format!("CBOR decode error: {err}"))
    }
}

impl From<ciborium::ser::Error<std::io::Error>> for OispError {
    fn from(err: ciborium::ser::Error<std::io::Error>) -> Self {
        Self::Serialization(format!("CBOR encode error: {err}"))
    }
}

/// Well-known application error codes returned by the platform.
///
/// The client treats codes as opaque integers; these constants exist so
/// callers can branch on them by name.
pub mod code {
    #![allow(missing_docs)]

    pub const INVALID_REQUEST: i64 = 400;
    pub const NOT_AUTHORIZED: i64 = 401;
    pub const NOT_FOUND: i64 = 404;
    pub const TOO_MANY_REQUESTS: i64 = 429;
    pub const INTERNAL_SERVER_ERROR: i64 = 500;
    pub const ANALYTICS_ERROR: i64 = 999;

    pub const DEVICE_INVALID_DATA: i64 = 1400;
    pub const DEVICE_NOT_FOUND: i64 = 1404;
    pub const DEVICE_ALREADY_EXISTS: i64 = 1409;
    pub const INVALID_ACTIVATION_CODE: i64 = 1410;
    pub const DEVICE_SAVING_ERROR: i64 = 1500;
    pub const DEVICE_ACTIVATION_ERROR: i64 = 1510;
    pub const DEVICE_DELETION_ERROR: i64 = 1512;
    pub const DEVICE_REGISTRATION_ERROR: i64 = 1513;

    pub const USER_INVALID_DATA: i64 = 2300;
    pub const WEAK_PASSWORD: i64 = 2401;
    pub const EMAIL_NOT_VERIFIED: i64 = 2402;
    pub const ACCOUNT_LOCKED: i64 = 2403;
    pub const TERMS_AND_CONDITIONS_ERROR: i64 = 2405;
    pub const INVALID_INTERACTION_TOKEN: i64 = 2406;
    pub const USER_ALREADY_EXISTS: i64 = 2409;
    pub const USER_ALREADY_INVITED: i64 = 2420;
    pub const SOCIAL_LOGIN_NOT_CONFIGURED: i64 = 2422;
    pub const USER_SAVING_ERROR: i64 = 2500;
    pub const CANNOT_SEND_ACTIVATION_EMAIL: i64 = 2501;
    /// Shared by user saving and user deletion failures in the analytics backend
    pub const USER_SAVING_ERROR_AA: i64 = 2502;
    pub const CANNOT_REDUCE_ADMIN_PRIVILEGES: i64 = 2503;

    pub const ACCOUNT_INVALID_DATA: i64 = 3400;
    pub const CANNOT_CHANGE_TRACK_SENSOR: i64 = 3401;
    pub const ACCOUNT_NOT_FOUND: i64 = 3404;
    pub const ACCOUNT_ALREADY_EXISTS: i64 = 3409;
    pub const ACCOUNT_SAVING_ERROR: i64 = 3500;
    pub const ACCOUNT_SAVING_ERROR_ADD_OR_UPDATE: i64 = 3510;
    pub const ACCOUNT_DELETION_ERROR: i64 = 3511;
    pub const ACCOUNT_DELETION_ERROR_AA: i64 = 3512;

    pub const COMPONENT_INVALID_DATA: i64 = 5400;
    pub const COMPONENT_NOT_FOUND: i64 = 5404;
    pub const COMPONENT_ALREADY_EXISTS: i64 = 5409;
    pub const SEARCH_PROCESSING_ERROR: i64 = 5410;
    pub const INVALID_PARAMETER_NAME: i64 = 5411;
    pub const INVALID_PARAMETER_VALUES: i64 = 5412;

    pub const DATA_INVALID_DATA: i64 = 6400;
    pub const FORMAT_ERROR: i64 = 6500;
    pub const OFFSET_AND_LIMIT_BOTH_OR_NONE_REQUIRED: i64 = 6504;
    pub const SUBMISSION_ERROR: i64 = 6505;
    pub const WRONG_RESPONSE_CODE_FROM_AA: i64 = 6506;

    pub const RULE_INVALID_DATA: i64 = 7400;
    pub const PROPERTY_MISSING: i64 = 7401;
    pub const INVALID_SYNCHRONIZATION_STATUS: i64 = 7402;
    pub const RULE_NOT_FOUND: i64 = 7404;
    pub const RULE_ALREADY_EXISTS: i64 = 7409;
    pub const RULE_NOT_FOUND_FROM_PROXY: i64 = 7444;
    pub const RULE_DELETION_ERROR: i64 = 7557;
    pub const ACTIVATED_RULE_DELETION_ERROR: i64 = 7558;
    pub const CANNOT_USE_API: i64 = 7600;

    pub const ALERT_RULE_NOT_FOUND: i64 = 8401;
    pub const ALERT_ACCOUNT_NOT_FOUND: i64 = 8402;
    pub const ALERT_DEVICE_NOT_FOUND: i64 = 8403;
    pub const ALERT_NOT_FOUND: i64 = 8404;
    pub const WRONG_ALERT_STATUS: i64 = 8405;
    pub const ALERT_ALREADY_EXISTS: i64 = 8409;
    pub const ALERT_SAVING_ERROR_AA: i64 = 8500;
    pub const ALERT_SAVING_ERROR: i64 = 8501;
    pub const ALERT_SAVING_ERROR_COMMENTS: i64 = 8502;

    pub const INVITATION_NOT_FOUND: i64 = 10404;
    pub const INVITATION_DELETION_ERROR: i64 = 10500;

    pub const ACTUATION_SEARCH_ERROR: i64 = 12500;
    pub const ACTUATION_SAVING_ERROR: i64 = 12501;
}
