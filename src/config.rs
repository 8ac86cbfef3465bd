use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// TCP port the master listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 5008;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_MAX_LINE_LENGTH: usize = 16 * 1024 * 1024;

/// Connection settings for one master.
///
/// Durations are read as (fractional) seconds when deserialized, all fields
/// except `host` are optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MasterConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_timeout", deserialize_with = "secs")]
    pub connect_timeout: Duration,
    #[serde(default = "default_timeout", deserialize_with = "secs")]
    pub discovery_timeout: Duration,
    #[serde(default = "default_timeout", deserialize_with = "secs")]
    pub reconnect_delay: Duration,
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_max_line_length() -> usize {
    DEFAULT_MAX_LINE_LENGTH
}

fn secs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
}

impl MasterConfig {
    /// Create a new instance with required fields and default optional fields
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            connect_timeout: DEFAULT_TIMEOUT,
            discovery_timeout: DEFAULT_TIMEOUT,
            reconnect_delay: DEFAULT_TIMEOUT,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn max_line_length(mut self, max_line_length: usize) -> Self {
        if max_line_length < 1024 {
            log::warn!(
                "max line length of {} bytes is too small for a home model reply",
                max_line_length
            );
        }
        self.max_line_length = max_line_length;
        self
    }
}
