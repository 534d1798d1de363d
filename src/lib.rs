//! Client library for operating food-delivery service robots through a
//! local fleet controller's REST API.
//!
//! The [`controller`] module talks to the controller itself: device and
//! group discovery, robot listing, status queries, delivery dispatch,
//! robot calls/actions and map retrieval. The [`fleet`] module builds on
//! it with a status [`Aggregator`](fleet::Aggregator) and a background
//! [`FleetPoller`](fleet::FleetPoller) that publishes consolidated fleet
//! snapshots.

pub mod config;
pub mod controller;
pub mod fleet;
pub mod util;

pub use config::{FleetConfig, RequestConfig};
pub use controller::{
    ApiError, Destination, DestinationKind, DeviceId, Endpoint, FleetClient, GroupId, MapElement,
    MapElementKind, Robot, RobotId, RobotState, RobotStatus, TaskAck,
};
pub use fleet::{Aggregator, FleetPoller, FleetSnapshot, PollState, RefreshOpts};
