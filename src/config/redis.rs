//! Redis configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Redis configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis host name or address
    pub host: String,

    /// Redis port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Redis password (empty for none)
    #[serde(default = "default_password")]
    pub password: SecretString,

    /// Numeric database index
    #[serde(default)]
    pub db: i64,

    /// Per-command timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// COUNT hint passed to SCAN
    #[serde(default = "default_scan_count")]
    pub scan_count: usize,

    /// Upper bound on scan-and-delete passes for pattern deletes
    #[serde(default = "default_max_delete_passes")]
    pub max_delete_passes: u32,
}

impl RedisConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// `host:port` address of the store
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Connection URL without credentials; the password is applied
    /// separately so it never appears in a formatted string.
    pub fn url(&self) -> String {
        format!("redis://{}/{}", self.address(), self.db)
    }

    /// Password, if one is configured
    pub fn password(&self) -> Option<String> {
        let password = self.password.expose_secret();
        if password.is_empty() {
            None
        } else {
            Some(password.clone())
        }
    }

    /// Validate Redis configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.host.is_empty() {
            return Err(ValidationError::MissingRequired("REDIS__HOST"));
        }
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        if self.db < 0 {
            return Err(ValidationError::InvalidDatabaseIndex);
        }
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        if self.scan_count == 0 || self.max_delete_passes == 0 {
            return Err(ValidationError::InvalidScanSettings);
        }
        Ok(())
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            password: default_password(),
            db: 0,
            timeout_secs: default_timeout(),
            scan_count: default_scan_count(),
            max_delete_passes: default_max_delete_passes(),
        }
    }
}

fn default_port() -> u16 {
    6379
}

fn default_password() -> SecretString {
    SecretString::new(String::new())
}

fn default_timeout() -> u64 {
    5
}

fn default_scan_count() -> usize {
    500
}

fn default_max_delete_passes() -> u32 {
    32
}
