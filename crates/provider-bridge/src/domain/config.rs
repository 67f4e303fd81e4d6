//! Bridge configuration with validation.

use crate::telemetry::LogConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main bridge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Client identity reported by `web3_clientVersion`
    pub client: ClientConfig,
    /// Account approval prompt timing
    pub approval: ApprovalConfig,
    /// The wallet's own home page (privileged surface)
    pub home: HomeConfig,
    /// Port and stream names
    pub channels: ChannelConfig,
    /// Per-bridge limits
    pub limits: LimitsConfig,
    /// Tracing output
    pub logging: LogConfig,
}

impl BridgeConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client.name.is_empty() {
            return Err(ConfigError::Invalid("client name cannot be empty".into()));
        }

        if self.channels.provider == self.channels.public_config {
            return Err(ConfigError::DuplicateChannel(self.channels.provider.clone()));
        }

        if self.channels.port_target.is_empty()
            || self.channels.provider.is_empty()
            || self.channels.public_config.is_empty()
        {
            return Err(ConfigError::Invalid("channel names cannot be empty".into()));
        }

        if self.limits.max_message_size == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_message_size cannot be 0".into(),
            ));
        }

        if self.limits.max_filters == 0 || self.limits.max_subscriptions == 0 {
            return Err(ConfigError::InvalidLimit(
                "filter and subscription limits cannot be 0".into(),
            ));
        }

        self.logging.validate()?;

        if !self.home.path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "home path must be absolute: {}",
                self.home.path
            )));
        }

        Ok(())
    }

    /// `web3_clientVersion` value
    pub fn client_version(&self) -> String {
        crate::client_version(&self.client.name, &self.client.app_version)
    }
}

/// Client identity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Product name
    pub name: String,
    /// Application version
    pub app_version: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: "MetaMask".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Approval prompt timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalConfig {
    /// Delay before a new account approval prompt is shown
    #[serde(with = "humantime_serde")]
    pub debounce: Duration,
    /// Time given to the page to answer the window-information script
    #[serde(with = "humantime_serde")]
    pub page_meta_delay: Duration,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(1),
            page_meta_delay: Duration::from_millis(500),
        }
    }
}

/// Home page location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HomeConfig {
    /// Host of the home page
    pub host: String,
    /// Path of the home page
    pub path: String,
}

impl Default for HomeConfig {
    fn default() -> Self {
        Self {
            host: "home.metamask.io".to_string(),
            path: "/".to_string(),
        }
    }
}

impl HomeConfig {
    /// Whether `url` points at the home page
    pub fn is_home(&self, url: &url::Url) -> bool {
        url.host_str() == Some(self.host.as_str()) && url.path() == self.path
    }
}

/// Port and stream names
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Name stamped on outbound port envelopes
    pub port_target: String,
    /// JSON-RPC stream
    pub provider: String,
    /// Public config stream
    pub public_config: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            port_target: "metamask-inpage".to_string(),
            provider: "provider".to_string(),
            public_config: "publicConfig".to_string(),
        }
    }
}

/// Per-bridge limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Max inbound page message size in bytes (default: 1MB)
    pub max_message_size: usize,
    /// Max installed filters per bridge
    pub max_filters: usize,
    /// Max live subscriptions per bridge
    pub max_subscriptions: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_message_size: 1024 * 1024,
            max_filters: 100,
            max_subscriptions: 100,
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Two streams share a name
    #[error("duplicate channel name: {0}")]
    DuplicateChannel(String),
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Unknown log level
    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Humantime serde module for Duration serialization
pub(crate) mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(crate) fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        // "ms" must be checked before 's' and 'm'
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.trim()
                .parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(|_| "invalid minutes")
        } else {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid duration format")
        }
    }
}
