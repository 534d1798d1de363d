/*
This module is home to everything related to the vendor fleet controller
that manages the robots we operate.

It provides a typed client over the controller's REST API: gateway device
discovery, robot group and robot listing, per-robot status queries,
delivery task dispatch, robot calls and actions, and facility map
retrieval.
*/

mod client;
mod error;
mod model;

pub use client::FleetClient;
pub use error::ApiError;
pub use model::{
    Destination, DestinationKind, DeviceId, Endpoint, GroupId, InvalidEndpointError, MapElement,
    MapElementKind, Robot, RobotId, RobotState, RobotStatus, TaskAck,
};
