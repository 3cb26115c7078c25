//! Configuration management
//!
//! [`ClientConfig`] carries the transport settings a [`crate::Client`] is
//! built with. The CLI persists it, together with saved credentials, in a
//! TOML file under the user's config directory.

use crate::error::{OispError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub mod auth;
pub mod defaults;

pub use auth::AuthConfig;
pub use defaults::*;

/// Settings for one OISP session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API root, e.g. `https://streammyiot.com/v1/api`
    #[serde(default = "defaults::default_api_url")]
    pub api_url: String,

    /// Proxy per scheme: `http`, `https` or `all`
    #[serde(default)]
    pub proxies: BTreeMap<String, String>,

    /// Verify TLS certificates
    #[serde(default = "defaults::default_verify_certs")]
    pub verify_certs: bool,

    /// Request timeout in seconds
    #[serde(default = "defaults::default_timeout")]
    pub timeout_secs: u64,

    /// Convert numeric query results from strings to numbers
    #[serde(default = "defaults::default_typed_samples")]
    pub typed_samples: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            proxies: BTreeMap::new(),
            verify_certs: default_verify_certs(),
            timeout_secs: default_timeout(),
            typed_samples: default_typed_samples(),
        }
    }
}

impl ClientConfig {
    /// Settings for the given API root, defaults otherwise
    #[must_use]
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..Self::default()
        }
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns [`OispError::InvalidConfig`] describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.api_url.is_empty() {
            return Err(OispError::InvalidConfig("api_url cannot be empty".to_string()));
        }
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(OispError::InvalidConfig(format!(
                "api_url must start with http:// or https://, got {}",
                self.api_url
            )));
        }
        if self.api_url.ends_with('/') {
            return Err(OispError::InvalidConfig(
                "api_url must not end with a slash".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(OispError::InvalidConfig(
                "timeout_secs must be greater than 0".to_string(),
            ));
        }
        if let Some(scheme) = self
            .proxies
            .keys()
            .find(|k| !matches!(k.as_str(), "http" | "https" | "all"))
        {
            return Err(OispError::InvalidConfig(format!(
                "unknown proxy scheme '{scheme}', expected http, https or all"
            )));
        }
        Ok(())
    }

    /// Merge another config into this one, with non-default values of `other` taking precedence
    pub fn merge(&mut self, other: &Self) {
        if other.api_url != default_api_url() {
            self.api_url.clone_from(&other.api_url);
        }
        for (scheme, url) in &other.proxies {
            let _ = self.proxies.insert(scheme.clone(), url.clone());
        }
        if other.verify_certs != default_verify_certs() {
            self.verify_certs = other.verify_certs;
        }
        if other.timeout_secs != default_timeout() {
            self.timeout_secs = other.timeout_secs;
        }
        if other.typed_samples != default_typed_samples() {
            self.typed_samples = other.typed_samples;
        }
    }
}

/// Contents of the CLI config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Session settings
    #[serde(default)]
    pub client: ClientConfig,

    /// Saved credentials
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Config {
    /// Load configuration from the default location
    ///
    /// Tries in order:
    /// 1. `XDG_CONFIG_HOME/oisp/config.toml`
    /// 2. `~/.config/oisp/config.toml`
    ///
    /// # Errors
    ///
    /// Returns [`OispError::NoConfig`] when the file does not exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Err(OispError::NoConfig);
        }
        Self::load_from(&path)
    }

    /// Load the default file, or defaults when there is none
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load_or_default() -> Result<Self> {
        match Self::load() {
            Err(OispError::NoConfig) => Ok(Self::default()),
            other => other,
        }
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| OispError::ConfigRead {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&contents).map_err(|e| OispError::InvalidConfig(e.to_string()))
    }

    /// Save configuration to the default location
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path; the file is made private as it holds a token
    ///
    /// # Errors
    ///
    /// Returns [`OispError::ConfigWrite`] if the directory, file or permissions cannot be set.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| OispError::ConfigWrite {
                path: parent.to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| OispError::Serialization(e.to_string()))?;

        fs::write(path, contents).map_err(|e| OispError::ConfigWrite {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        #[cfg(unix)]
        {
            use std::fs::Permissions;
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, Permissions::from_mode(0o600)).map_err(|e| {
                OispError::ConfigWrite {
                    path: path.to_path_buf(),
                    reason: format!("Failed to set permissions: {e}"),
                }
            })?;
        }

        Ok(())
    }

    /// Get the path to the config file
    ///
    /// # Errors
    ///
    /// Returns [`OispError::Internal`] if no config directory can be determined.
    pub fn config_path() -> Result<PathBuf> {
        let config_home = std::env::var("XDG_CONFIG_HOME")
            .ok()
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")));

        config_home
            .ok_or_else(|| {
                OispError::Internal(
                    "Could not determine config directory: XDG_CONFIG_HOME not set and no home directory found"
                        .to_string(),
                )
            })
            .map(|path| path.join("oisp").join("config.toml"))
    }
}
