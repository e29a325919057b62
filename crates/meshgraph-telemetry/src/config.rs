//! Telemetry backend configuration.
//!
//! Read once from the environment at process start and handed to
//! [`crate::PrometheusClient::new`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TelemetryError;

pub const URL_VAR: &str = "MESHGRAPH_PROMETHEUS_URL";
pub const TIMEOUT_VAR: &str = "MESHGRAPH_QUERY_TIMEOUT_SECS";

pub const DEFAULT_URL: &str = "http://prometheus:9090";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub url: String,
    /// Per-request HTTP timeout.
    #[serde(with = "timeout_secs")]
    pub timeout: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        TelemetryConfig {
            url: DEFAULT_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl TelemetryConfig {
    pub fn from_env() -> Result<Self, TelemetryError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, TelemetryError> {
        let url = lookup(URL_VAR).unwrap_or_else(|| DEFAULT_URL.to_string());
        let timeout = match lookup(TIMEOUT_VAR) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| {
                    TelemetryError::Config(format!(
                        "{TIMEOUT_VAR} must be a whole number of seconds, got '{raw}'"
                    ))
                })?,
            None => DEFAULT_TIMEOUT,
        };
        if url.trim().is_empty() {
            return Err(TelemetryError::Config(format!("{URL_VAR} is empty")));
        }
        Ok(TelemetryConfig { url, timeout })
    }
}

mod timeout_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
