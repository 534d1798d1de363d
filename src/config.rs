use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::controller::Endpoint;
use crate::util::json::{deserialize_duration_from_ms, serialize_duration_to_ms};

/// Connection settings for one fleet controller.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FleetConfig {
    pub endpoint: Endpoint,

    #[serde(default)]
    pub request: RequestConfig,
}

impl FleetConfig {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            request: RequestConfig::default(),
        }
    }
}

/// Request timing configuration. All durations are encoded as milliseconds.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RequestConfig {
    /// Connect timeout for regular API calls.
    #[serde(
        deserialize_with = "deserialize_duration_from_ms",
        serialize_with = "serialize_duration_to_ms"
    )]
    pub connect_timeout: Duration,

    /// Overall deadline for regular API calls.
    #[serde(
        deserialize_with = "deserialize_duration_from_ms",
        serialize_with = "serialize_duration_to_ms"
    )]
    pub request_timeout: Duration,

    /// Connect and read timeout for per-robot status queries. Much shorter
    /// than the regular timeouts: a powered-off robot must not stall a
    /// fleet poll.
    #[serde(
        deserialize_with = "deserialize_duration_from_ms",
        serialize_with = "serialize_duration_to_ms"
    )]
    pub status_timeout: Duration,

    /// End-to-end deadline the aggregator puts around one status query.
    #[serde(
        deserialize_with = "deserialize_duration_from_ms",
        serialize_with = "serialize_duration_to_ms"
    )]
    pub status_deadline: Duration,

    /// Cadence of the background fleet poll.
    #[serde(
        deserialize_with = "deserialize_duration_from_ms",
        serialize_with = "serialize_duration_to_ms"
    )]
    pub poll_interval: Duration,

    /// Maximum random delay added to each scheduled poll. Zero by default;
    /// the controller is a single box on the local network.
    #[serde(
        default,
        deserialize_with = "deserialize_duration_from_ms",
        serialize_with = "serialize_duration_to_ms"
    )]
    pub poll_max_jitter: Duration,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(5_000),
            request_timeout: Duration::from_millis(10_000),
            status_timeout: Duration::from_millis(1_000),
            status_deadline: Duration::from_millis(2_000),
            poll_interval: Duration::from_millis(15_000),
            poll_max_jitter: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn request_config_round_trips_as_milliseconds() {
        let config = RequestConfig::default();
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["connect_timeout"], 5_000);
        assert_eq!(value["status_timeout"], 1_000);
        assert_eq!(value["poll_interval"], 15_000);

        let parsed: RequestConfig = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.status_deadline, config.status_deadline);
        assert_eq!(parsed.poll_max_jitter, Duration::ZERO);
    }

    #[test]
    fn fleet_config_parses_endpoint_string() {
        let config: FleetConfig = serde_json::from_str(
            r#"{"endpoint": "10.0.0.2:9050", "request": {
                "connect_timeout": 1000,
                "request_timeout": 2000,
                "status_timeout": 250,
                "status_deadline": 500,
                "poll_interval": 1000
            }}"#,
        )
        .unwrap();
        assert_eq!(config.endpoint.as_str(), "10.0.0.2:9050");
        assert_eq!(config.request.status_timeout, Duration::from_millis(250));
    }
}
