use std::fmt::Display;
use std::ops::Deref;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The `host:port` address of a fleet controller on the local network.
///
/// All API calls are made against `http://{endpoint}/api/`. The address is
/// validated on parse and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint(String);

#[derive(Debug, Error)]
#[error("invalid controller endpoint: {0}")]
pub struct InvalidEndpointError(String);

impl Endpoint {
    /// Full URL for an API path, e.g. `api_url("devices")`.
    pub fn api_url(&self, path: &str) -> String {
        format!("http://{}/api/{}", self.0, path)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Endpoint {
    type Err = InvalidEndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(InvalidEndpointError("address is empty".into()));
        }
        if s.contains("://") {
            return Err(InvalidEndpointError(format!(
                "expected host:port, got a URL: {s}"
            )));
        }
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| InvalidEndpointError(format!("missing port in {s:?}")))?;
        if host.is_empty() {
            return Err(InvalidEndpointError(format!("missing host in {s:?}")));
        }
        port.parse::<u16>()
            .map_err(|_| InvalidEndpointError(format!("invalid port in {s:?}")))?;
        Ok(Self(s.to_owned()))
    }
}

impl TryFrom<String> for Endpoint {
    type Error = InvalidEndpointError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Endpoint> for String {
    fn from(value: Endpoint) -> Self {
        value.0
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

macro_rules! opaque_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Deref for $name {
            type Target = str;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.to_owned()))
            }
        }
    };
}

opaque_id! {
    /// Registration handle of the controller's gateway device. Obtained once
    /// per session and never persisted.
    DeviceId
}

opaque_id! {
    /// A robot group under a device. The controller may expose several; the
    /// client always works with the first one returned.
    GroupId
}

opaque_id! {
    RobotId
}

/// A robot as listed by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Robot {
    pub id: RobotId,
    pub name: String,
    /// Rewritten by status aggregation; listed robots start out online.
    #[serde(default = "default_online")]
    pub is_online: bool,
}

fn default_online() -> bool {
    true
}

/// Operational status reported by the controller, plus the synthetic
/// `Offline` assigned to robots that fail or time out a status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotStatus {
    Free,
    Busy,
    Charging,
    Offline,
    Unknown,
}

impl From<&str> for RobotStatus {
    fn from(value: &str) -> Self {
        match value {
            "Free" => RobotStatus::Free,
            "Busy" => RobotStatus::Busy,
            "Charging" => RobotStatus::Charging,
            "Offline" => RobotStatus::Offline,
            _ => RobotStatus::Unknown,
        }
    }
}

impl Display for RobotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RobotStatus::Free => "Free",
            RobotStatus::Busy => "Busy",
            RobotStatus::Charging => "Charging",
            RobotStatus::Offline => "Offline",
            RobotStatus::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// One robot's queried state: operational status plus battery percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RobotState {
    pub status: RobotStatus,
    /// Battery charge in percent, clamped to 0..=100.
    pub battery: u8,
}

impl RobotState {
    /// Synthetic state for robots that did not answer a status query.
    pub fn offline() -> Self {
        Self {
            status: RobotStatus::Offline,
            battery: 0,
        }
    }
}

/// A named delivery target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: DestinationKind,
}

/// Destination category. Unrecognized controller values pass through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DestinationKind {
    Table,
    DiningOutlet,
    Transit,
    Dishwashing,
    Other(String),
}

impl DestinationKind {
    /// Wire value used by the controller.
    pub fn as_str(&self) -> &str {
        match self {
            DestinationKind::Table => "table",
            DestinationKind::DiningOutlet => "dining_outlet",
            DestinationKind::Transit => "transit",
            DestinationKind::Dishwashing => "dishwashing",
            DestinationKind::Other(s) => s,
        }
    }

    /// Human-readable label for display.
    pub fn label(&self) -> &str {
        match self {
            DestinationKind::Table => "Table",
            DestinationKind::DiningOutlet => "Serving station",
            DestinationKind::Transit => "Transit point",
            DestinationKind::Dishwashing => "Dishwashing station",
            DestinationKind::Other(s) => s,
        }
    }
}

impl Default for DestinationKind {
    fn default() -> Self {
        DestinationKind::Other(String::new())
    }
}

impl From<String> for DestinationKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "table" => DestinationKind::Table,
            "dining_outlet" => DestinationKind::DiningOutlet,
            "transit" => DestinationKind::Transit,
            "dishwashing" => DestinationKind::Dishwashing,
            _ => DestinationKind::Other(value),
        }
    }
}

impl From<DestinationKind> for String {
    fn from(value: DestinationKind) -> Self {
        value.as_str().to_owned()
    }
}

/// One element of a robot's facility map.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MapElement {
    #[serde(rename = "type")]
    pub kind: MapElementKind,
    #[serde(default)]
    pub vector: Vec<f64>,
    pub width: Option<f64>,
    #[serde(rename = "maxSpeed")]
    pub max_speed: Option<f64>,
    pub name: Option<String>,
    pub mode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum MapElementKind {
    Track,
    Source,
    Cycle,
    Other(String),
}

impl From<String> for MapElementKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "track" => MapElementKind::Track,
            "source" => MapElementKind::Source,
            "cycle" => MapElementKind::Cycle,
            _ => MapElementKind::Other(value),
        }
    }
}

/// Controller acknowledgment for task dispatch and robot actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskAck {
    pub success: bool,
}
