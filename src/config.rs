//! Gateway configuration.
//!
//! Loaded once from a JSON file and shared read-only (behind an `Arc`) by the
//! resolver and every driver it builds. Vendor sections are keyed by the
//! lowercase gateway name:
//!
//! ```json
//! {
//!   "timezone": "Asia/Tehran",
//!   "callback_url": "https://shop.example/payments/callback",
//!   "gateways": {
//!     "novinpal": { "api_key": "..." },
//!     "zarinpal": { "api_key": "merchant-uuid", "sandbox": true }
//!   }
//! }
//! ```

use crate::domain::gateway::Gateway;
use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use url::Url;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "PAYGATE_CONFIG";

const DEFAULT_TIMEZONE: &str = "+00:00";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Zone used when rendering timestamps: an IANA name such as `Asia/Tehran`,
    /// or a fixed offset such as `+03:30`.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Vendor HTTP timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Callback URL used when neither the caller nor the vendor section sets one.
    #[serde(default)]
    pub callback_url: Option<Url>,
    #[serde(default)]
    pub gateways: HashMap<Gateway, VendorConfig>,
}

/// Credentials and endpoint overrides for one vendor.
///
/// Custom `Debug` implementation redacts `api_key`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorConfig {
    /// API key, merchant id or terminal key, depending on the vendor.
    pub api_key: String,
    #[serde(default)]
    pub callback_url: Option<Url>,
    /// Overrides the vendor API base URL. Must end with `/`.
    #[serde(default)]
    pub api_url: Option<Url>,
    /// Overrides the vendor payment page base URL. Must end with `/`.
    #[serde(default)]
    pub gate_url: Option<Url>,
    /// Use the vendor sandbox endpoints where one exists.
    #[serde(default)]
    pub sandbox: bool,
    /// Default description sent with payment requests.
    #[serde(default)]
    pub description: Option<String>,
}

impl std::fmt::Debug for VendorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VendorConfig")
            .field("api_key", &"[REDACTED]")
            .field("callback_url", &self.callback_url)
            .field("api_url", &self.api_url)
            .field("gate_url", &self.gate_url)
            .field("sandbox", &self.sandbox)
            .field("description", &self.description)
            .finish()
    }
}

impl VendorConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            callback_url: None,
            api_url: None,
            gate_url: None,
            sandbox: false,
            description: None,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            timeout_secs: default_timeout_secs(),
            callback_url: None,
            gateways: HashMap::new(),
        }
    }
}

impl GatewayConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Loads the file named by `PAYGATE_CONFIG`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_ENV).map_err(|_| ConfigError::MissingEnv(CONFIG_ENV))?;
        Self::from_file(path)
    }

    pub fn with_gateway(mut self, gateway: Gateway, vendor: VendorConfig) -> Self {
        self.gateways.insert(gateway, vendor);
        self
    }

    /// Returns the vendor section for `gateway`.
    pub fn get(&self, gateway: Gateway) -> Result<&VendorConfig, ConfigError> {
        self.gateways
            .get(&gateway)
            .ok_or(ConfigError::MissingGateway(gateway))
    }

    pub fn timezone(&self) -> Result<ReportTimezone, ConfigError> {
        self.timezone.parse()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timezone()?;
        for (gateway, vendor) in &self.gateways {
            if vendor.api_key.trim().is_empty() {
                return Err(ConfigError::MissingApiKey(*gateway));
            }
            for url in [&vendor.api_url, &vendor.gate_url].into_iter().flatten() {
                if !url.path().ends_with('/') {
                    return Err(ConfigError::InvalidBaseUrl(*gateway, url.to_string()));
                }
            }
        }
        Ok(())
    }
}

/// Zone report timestamps are rendered in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReportTimezone {
    Named(Tz),
    Fixed(FixedOffset),
}

impl ReportTimezone {
    /// RFC 3339 rendering of `date`. Named zones pick the offset in force at that instant.
    pub fn format(&self, date: DateTime<Utc>) -> String {
        match self {
            ReportTimezone::Named(tz) => date.with_timezone(tz).to_rfc3339(),
            ReportTimezone::Fixed(offset) => date.with_timezone(offset).to_rfc3339(),
        }
    }
}

impl FromStr for ReportTimezone {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(tz) = s.parse::<Tz>() {
            return Ok(ReportTimezone::Named(tz));
        }
        s.parse::<FixedOffset>()
            .map(ReportTimezone::Fixed)
            .map_err(|_| ConfigError::InvalidTimezone(s.to_string()))
    }
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{0} environment variable is required")]
    MissingEnv(&'static str),
    #[error("gateway {0} is not configured")]
    MissingGateway(Gateway),
    #[error("gateway {0} has an empty api_key")]
    MissingApiKey(Gateway),
    #[error("base URL for {0} must end with '/': {1}")]
    InvalidBaseUrl(Gateway, String),
    #[error("invalid timezone '{0}', expected an IANA name like Asia/Tehran or an offset like +03:30")]
    InvalidTimezone(String),
}
