use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, instrument};

use crate::controller::{ApiError, DeviceId, FleetClient, GroupId, RobotState};

use super::snapshot::FleetSnapshot;

/// Produces one consistent [`FleetSnapshot`] per invocation.
///
/// Discovery (device -> group -> robot list) fails the whole aggregation:
/// if those steps fail the controller itself is unreachable and there is
/// no point continuing. Per-robot status queries degrade instead: a robot
/// that errors or exceeds the deadline is recorded as offline with an
/// empty battery, and the cycle carries on with the remaining robots.
///
/// Device and group ids are cached for the lifetime of the aggregator
/// after the first successful resolution; [`Aggregator::reset`] drops the
/// cache to force a full re-discovery (an explicit "reconnect").
pub struct Aggregator {
    client: FleetClient,
    status_deadline: Duration,
    device_id: Option<DeviceId>,
    group_id: Option<GroupId>,
}

impl Aggregator {
    pub fn new(client: FleetClient, status_deadline: Duration) -> Self {
        Self {
            client,
            status_deadline,
            device_id: None,
            group_id: None,
        }
    }

    /// Seeds the session with an already-resolved device id.
    pub fn with_device_id(mut self, device_id: DeviceId) -> Self {
        self.device_id = Some(device_id);
        self
    }

    /// The session's device id, once discovery has resolved it.
    pub fn device_id(&self) -> Option<&DeviceId> {
        self.device_id.as_ref()
    }

    pub fn client(&self) -> &FleetClient {
        &self.client
    }

    /// Drops the cached device and group ids so the next cycle performs a
    /// full re-discovery.
    pub fn reset(&mut self) {
        self.device_id = None;
        self.group_id = None;
    }

    /// Runs one aggregation cycle.
    #[instrument(level = "debug", skip_all, fields(endpoint = %self.client.endpoint()))]
    pub async fn snapshot(&mut self) -> Result<FleetSnapshot, ApiError> {
        let device_id = match &self.device_id {
            Some(id) => id.clone(),
            None => {
                let id = self.client.fetch_device_id().await?;
                self.device_id = Some(id.clone());
                id
            }
        };

        let group_id = match &self.group_id {
            Some(id) => id.clone(),
            None => {
                let id = self.client.fetch_group_id(&device_id).await?;
                self.group_id = Some(id.clone());
                id
            }
        };

        let robots = self.client.fetch_robots(&device_id, &group_id).await?;

        // Sequential and in list order so the result is deterministic.
        let mut entries = Vec::with_capacity(robots.len());
        for mut robot in robots {
            let state = match timeout(
                self.status_deadline,
                self.client.fetch_robot_status(&device_id, &robot.id),
            )
            .await
            {
                Ok(Ok(state)) => {
                    robot.is_online = true;
                    state
                }
                Ok(Err(err)) => {
                    debug!(robot = %robot.id, error = %err, "status query failed, marking offline");
                    robot.is_online = false;
                    RobotState::offline()
                }
                Err(_) => {
                    debug!(robot = %robot.id, "status query timed out, marking offline");
                    robot.is_online = false;
                    RobotState::offline()
                }
            };
            entries.push((robot, state));
        }

        Ok(FleetSnapshot::from_entries(entries))
    }
}
