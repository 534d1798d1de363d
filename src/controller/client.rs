use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::config::RequestConfig;
use crate::util::http::Client;

use super::error::ApiError;
use super::model::{
    Destination, DeviceId, Endpoint, GroupId, MapElement, Robot, RobotId, RobotState, TaskAck,
};

/// Typed client for the fleet-controller REST API.
///
/// All operations translate one endpoint into a typed result, keeping JSON
/// envelopes and HTTP mechanics out of callers. Robot status queries go
/// through a second client with much shorter timeouts, since individual
/// robots may be powered off and must not stall a whole fleet poll.
pub struct FleetClient {
    endpoint: Endpoint,
    http: Client,
    status_http: Client,
}

impl FleetClient {
    pub fn new(endpoint: Endpoint, config: &RequestConfig) -> Result<Self, ApiError> {
        let http = Client::new(config.connect_timeout, Some(config.request_timeout))?;
        let status_http = Client::new(config.status_timeout, Some(config.status_timeout))?;
        Ok(Self {
            endpoint,
            http,
            status_http,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        self.endpoint.api_url(path)
    }

    /// Fetches the controller's registered gateway device id.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_device_id(&self) -> Result<DeviceId, ApiError> {
        let reply: Envelope<DevicesData> = self.http.get(&self.url("devices"), &[]).await?;
        reply
            .data
            .and_then(|data| data.devices)
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(|device| DeviceId::from(device.device_id))
            .ok_or(ApiError::EmptyResult("no devices found"))
    }

    /// Fetches the id of the device's robot group.
    ///
    /// The controller may report several groups; the first one returned is
    /// used, with no disambiguation.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_group_id(&self, device: &DeviceId) -> Result<GroupId, ApiError> {
        let reply: Envelope<GroupsData> = self
            .http
            .get(&self.url("robot/groups"), &[("device", device.as_str())])
            .await?;
        reply
            .data
            .and_then(|data| data.robot_groups)
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(|group| GroupId::from(group.id))
            .ok_or(ApiError::EmptyResult("no robot groups found"))
    }

    /// Lists the robots in a group. An empty fleet is a valid result; a
    /// reply without a robot list is not.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_robots(
        &self,
        device: &DeviceId,
        group: &GroupId,
    ) -> Result<Vec<Robot>, ApiError> {
        let reply: Envelope<RobotsData> = self
            .http
            .get(
                &self.url("robots"),
                &[("device", device.as_str()), ("group_id", group.as_str())],
            )
            .await?;
        reply
            .data
            .and_then(|data| data.robots)
            .ok_or(ApiError::EmptyResult("no robots found"))
    }

    /// Queries one robot's operational status and battery level.
    ///
    /// Uses the short-timeout client; callers polling a fleet should wrap
    /// this in their own deadline as well.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_robot_status(
        &self,
        device: &DeviceId,
        robot: &RobotId,
    ) -> Result<RobotState, ApiError> {
        let reply: Envelope<StatusData> = self
            .status_http
            .get(
                &self.url("robot/status"),
                &[("device_id", device.as_str()), ("robot_id", robot.as_str())],
            )
            .await?;
        let data = reply.data.ok_or_else(|| ApiError::missing("data"))?;
        let status = data
            .robot_state
            .ok_or_else(|| ApiError::missing("robotState"))?;
        let battery = data
            .robot_power
            .ok_or_else(|| ApiError::missing("robotPower"))?;
        Ok(RobotState {
            status: status.as_str().into(),
            battery: battery.clamp(0, 100) as u8,
        })
    }

    /// Lists the delivery destinations known to a robot.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_destinations(
        &self,
        device: &DeviceId,
        robot: &RobotId,
    ) -> Result<Vec<Destination>, ApiError> {
        let reply: Envelope<DestinationsData> = self
            .http
            .get(
                &self.url("destinations"),
                &[("device", device.as_str()), ("robot_id", robot.as_str())],
            )
            .await?;
        reply
            .data
            .and_then(|data| data.destinations)
            .ok_or(ApiError::EmptyResult("no destinations found"))
    }

    /// Dispatches a delivery task with a single stop.
    pub async fn send_delivery_task(
        &self,
        device: &DeviceId,
        robot: &RobotId,
        destination: &str,
    ) -> Result<TaskAck, ApiError> {
        self.send_task(device, robot, &[destination]).await
    }

    /// Dispatches a delivery task visiting several destinations. The
    /// controller sorts the stops itself (`deliverySort: "auto"`).
    pub async fn send_multi_delivery_task(
        &self,
        device: &DeviceId,
        robot: &RobotId,
        destinations: &[Destination],
    ) -> Result<TaskAck, ApiError> {
        let names: Vec<&str> = destinations.iter().map(|d| d.name.as_str()).collect();
        self.send_task(device, robot, &names).await
    }

    #[instrument(level = "debug", skip(self, destinations), fields(stops = destinations.len()))]
    async fn send_task(
        &self,
        device: &DeviceId,
        robot: &RobotId,
        destinations: &[&str],
    ) -> Result<TaskAck, ApiError> {
        let request = TaskRequest {
            device_id: device,
            robot_id: robot,
            kind: "new",
            delivery_sort: "auto",
            execute_task: true,
            trays: vec![Tray {
                destinations: destinations
                    .iter()
                    .map(|name| TrayDestination {
                        destination: name,
                        // The controller only requires the token to be unique
                        // within the request; it has no other meaning.
                        id: uuid::Uuid::new_v4().simple().to_string(),
                    })
                    .collect(),
            }],
        };
        let reply: Envelope<AckData> = self
            .http
            .post(&self.url("robot/delivery/task"), &request)
            .await?;
        parse_ack(reply)
    }

    /// Sends the robot on a one-way call to a destination.
    #[instrument(level = "debug", skip(self, destination), fields(destination = %destination.name))]
    pub async fn send_robot_call(
        &self,
        device: &DeviceId,
        robot: &RobotId,
        destination: &Destination,
    ) -> Result<TaskAck, ApiError> {
        let request = CallRequest {
            device_id: device,
            robot_id: robot,
            destination,
        };
        let reply: Envelope<AckData> = self.http.post(&self.url("robot/call"), &request).await?;
        parse_ack(reply)
    }

    /// Cancels every delivery currently assigned to the robot.
    pub async fn cancel_all_deliveries(
        &self,
        device: &DeviceId,
        robot: &RobotId,
    ) -> Result<bool, ApiError> {
        self.robot_action(device, robot, "CancelAllDelivery").await
    }

    /// Marks the robot's current delivery as completed.
    pub async fn force_complete_delivery(
        &self,
        device: &DeviceId,
        robot: &RobotId,
    ) -> Result<bool, ApiError> {
        self.robot_action(device, robot, "Complete").await
    }

    #[instrument(level = "debug", skip(self))]
    async fn robot_action(
        &self,
        device: &DeviceId,
        robot: &RobotId,
        action: &'static str,
    ) -> Result<bool, ApiError> {
        let request = ActionRequest {
            device_id: device,
            robot_id: robot,
            action,
        };
        let reply: Envelope<AckData> = self.http.post(&self.url("robot/action"), &request).await?;
        parse_ack(reply).map(|ack| ack.success)
    }

    /// Fetches the robot's facility map elements.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_robot_map(
        &self,
        device: &DeviceId,
        robot: &RobotId,
    ) -> Result<Vec<MapElement>, ApiError> {
        let reply: Envelope<MapData> = self
            .http
            .get(
                &self.url("robot/map"),
                &[("device_id", device.as_str()), ("robot_id", robot.as_str())],
            )
            .await?;
        reply
            .data
            .and_then(|data| data.map)
            .and_then(|map| map.elements)
            .ok_or(ApiError::EmptyResult("no map elements found"))
    }
}

/// The controller wraps every reply in `{code, msg, data}`. Task and
/// action acknowledgments are only trusted when `code == 0`.
fn parse_ack(reply: Envelope<AckData>) -> Result<TaskAck, ApiError> {
    match reply.code {
        Some(0) => {
            let data = reply.data.ok_or_else(|| ApiError::missing("data"))?;
            Ok(TaskAck {
                success: data.success.unwrap_or(false),
            })
        }
        _ => Err(ApiError::Controller(
            reply.msg.unwrap_or_else(|| "unknown error".into()),
        )),
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: Option<i64>,
    msg: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct DevicesData {
    devices: Option<Vec<DeviceEntry>>,
}

#[derive(Debug, Deserialize)]
struct DeviceEntry {
    #[serde(rename = "deviceId")]
    device_id: String,
}

#[derive(Debug, Deserialize)]
struct GroupsData {
    #[serde(rename = "robotGroups")]
    robot_groups: Option<Vec<GroupEntry>>,
}

#[derive(Debug, Deserialize)]
struct GroupEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RobotsData {
    robots: Option<Vec<Robot>>,
}

#[derive(Debug, Deserialize)]
struct StatusData {
    #[serde(rename = "robotState")]
    robot_state: Option<String>,
    #[serde(rename = "robotPower")]
    robot_power: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct DestinationsData {
    destinations: Option<Vec<Destination>>,
}

#[derive(Debug, Deserialize)]
struct AckData {
    success: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct MapData {
    map: Option<MapPayload>,
}

#[derive(Debug, Deserialize)]
struct MapPayload {
    elements: Option<Vec<MapElement>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskRequest<'a> {
    device_id: &'a DeviceId,
    robot_id: &'a RobotId,
    #[serde(rename = "type")]
    kind: &'static str,
    delivery_sort: &'static str,
    execute_task: bool,
    trays: Vec<Tray<'a>>,
}

#[derive(Debug, Serialize)]
struct Tray<'a> {
    destinations: Vec<TrayDestination<'a>>,
}

#[derive(Debug, Serialize)]
struct TrayDestination<'a> {
    destination: &'a str,
    id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CallRequest<'a> {
    device_id: &'a DeviceId,
    robot_id: &'a RobotId,
    destination: &'a Destination,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ActionRequest<'a> {
    device_id: &'a DeviceId,
    robot_id: &'a RobotId,
    action: &'static str,
}
