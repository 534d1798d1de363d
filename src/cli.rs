use clap::{Parser, Subcommand};
use std::num::ParseIntError;
use std::time::Duration;

use fleetlink::controller::{Endpoint, RobotId};

fn parse_duration(s: &str) -> Result<Duration, ParseIntError> {
    let millis: u64 = s.parse()?;
    Ok(Duration::from_millis(millis))
}

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)] // read from Cargo.toml
pub struct Cli {
    /// Fleet controller address
    #[arg(env = "FLEETLINK_ENDPOINT", value_name = "host:port")]
    pub endpoint: Endpoint,

    /// Connect timeout for regular API calls in milliseconds
    #[arg(
        env = "FLEETLINK_CONNECT_TIMEOUT_MS",
        long = "connect-timeout-ms",
        value_name = "ms",
        value_parser = parse_duration
    )]
    pub connect_timeout: Option<Duration>,

    /// Per-robot status query timeout in milliseconds
    #[arg(
        env = "FLEETLINK_STATUS_TIMEOUT_MS",
        long = "status-timeout-ms",
        value_name = "ms",
        value_parser = parse_duration
    )]
    pub status_timeout: Option<Duration>,

    /// Fleet poll interval in milliseconds
    #[arg(
        env = "FLEETLINK_POLL_INTERVAL_MS",
        long = "poll-interval-ms",
        value_name = "ms",
        value_parser = parse_duration
    )]
    pub poll_interval: Option<Duration>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Run one aggregation cycle and print the fleet
    Status,

    /// Poll the fleet on an interval and print every update
    Watch,

    /// List the delivery destinations known to a robot
    Destinations {
        #[arg(value_name = "robot-id")]
        robot_id: RobotId,
    },

    /// Send a single-stop delivery task
    Deliver {
        #[arg(value_name = "robot-id")]
        robot_id: RobotId,
        /// Destination name as listed by `destinations`
        destination: String,
    },

    /// Send a multi-stop delivery task (table destinations only)
    DeliverMulti {
        #[arg(value_name = "robot-id")]
        robot_id: RobotId,
        /// Destination names in the order they should be loaded
        #[arg(required = true, value_name = "destination")]
        destinations: Vec<String>,
    },

    /// Call the robot to a destination, one way
    Call {
        #[arg(value_name = "robot-id")]
        robot_id: RobotId,
        destination: String,
    },

    /// Cancel every delivery assigned to a robot
    Cancel {
        #[arg(value_name = "robot-id")]
        robot_id: RobotId,
    },

    /// Force-complete a robot's current delivery
    Complete {
        #[arg(value_name = "robot-id")]
        robot_id: RobotId,
    },

    /// Fetch and summarize the robot's facility map
    Map {
        #[arg(value_name = "robot-id")]
        robot_id: RobotId,
    },
}

pub fn parse() -> Cli {
    Parser::parse()
}
